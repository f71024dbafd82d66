//! Signing key sources.
//!
//! [`SharedSecretKeys`] verifies HMAC tokens with a configured secret.
//! [`RemoteJwks`] fetches the issuer's published key set from
//! `<issuer>/.well-known/jwks.json`, caches it per issuer, and selects the
//! key by the token's `kid`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::AuthError;

/// Resolves the key and algorithm that must have signed a token.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Key for a token from `issuer` with the given header.
    async fn key_for(
        &self,
        issuer: &str,
        header: &Header,
    ) -> Result<(DecodingKey, Algorithm), AuthError>;
}

/// HMAC-SHA256 with a single shared secret.
pub struct SharedSecretKeys {
    key: DecodingKey,
}

impl SharedSecretKeys {
    /// Build from the raw secret bytes.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
        }
    }
}

#[async_trait]
impl KeyProvider for SharedSecretKeys {
    async fn key_for(
        &self,
        _issuer: &str,
        _header: &Header,
    ) -> Result<(DecodingKey, Algorithm), AuthError> {
        Ok((self.key.clone(), Algorithm::HS256))
    }
}

struct CachedSet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Key sets fetched over HTTP and cached per issuer.
pub struct RemoteJwks {
    http: reqwest::Client,
    allowed: Vec<Algorithm>,
    max_age: Duration,
    cache: RwLock<HashMap<String, CachedSet>>,
}

impl RemoteJwks {
    /// Default time a fetched key set is trusted before refetching.
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

    /// Provider accepting only the listed algorithms.
    pub fn new(allowed: Vec<Algorithm>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            allowed,
            max_age: Self::DEFAULT_MAX_AGE,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Override the cache lifetime.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    fn cached(&self, issuer: &str) -> Option<Arc<JwkSet>> {
        let cache = self.cache.read();
        cache
            .get(issuer)
            .filter(|c| c.fetched_at.elapsed() < self.max_age)
            .map(|c| c.keys.clone())
    }

    async fn fetch(&self, issuer: &str) -> Result<Arc<JwkSet>, AuthError> {
        let url = format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'));
        debug!(%url, "fetching key set");
        let resp = self.http.get(&url).send().await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AuthError::KeyFetch { status, message });
        }

        let keys = Arc::new(resp.json::<JwkSet>().await?);
        let _ = self.cache.write().insert(
            issuer.to_string(),
            CachedSet {
                keys: keys.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(keys)
    }
}

#[async_trait]
impl KeyProvider for RemoteJwks {
    async fn key_for(
        &self,
        issuer: &str,
        header: &Header,
    ) -> Result<(DecodingKey, Algorithm), AuthError> {
        if !self.allowed.contains(&header.alg) {
            return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }
        let kid = header.kid.as_deref().ok_or(AuthError::MissingKeyId)?;

        let keys = match self.cached(issuer) {
            Some(keys) => keys,
            None => self.fetch(issuer).await?,
        };
        let jwk = keys
            .find(kid)
            .ok_or_else(|| AuthError::UnknownKey(kid.to_string()))?;
        Ok((DecodingKey::from_jwk(jwk)?, header.alg))
    }
}

/// Parse configured algorithm names.
pub fn parse_algorithms(names: &[String]) -> Result<Vec<Algorithm>, AuthError> {
    names
        .iter()
        .map(|n| {
            n.parse::<Algorithm>()
                .map_err(|_| AuthError::UnsupportedAlgorithm(n.clone()))
        })
        .collect()
}
