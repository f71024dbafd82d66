//! Token verification.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Validation, decode, decode_header};
use serde::{Deserialize, Serialize};

use crate::errors::AuthError;
use crate::gate::Principal;
use crate::keys::KeyProvider;

/// Verifies a bearer token against an expected issuer and client.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify `token`. `issuer_id` names the issuer within the configured
    /// issuer base; `client_id` is the expected audience.
    async fn verify(
        &self,
        token: &str,
        issuer_id: &str,
        client_id: &str,
    ) -> Result<Principal, AuthError>;
}

/// `aud` may be a single string or a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience.
    One(String),
    /// Several audiences.
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::One(a) => a == client_id,
            Self::Many(list) => list.iter().any(|a| a == client_id),
        }
    }
}

/// Claims read from a verified token.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Subject.
    #[serde(default)]
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Expiry (Unix seconds).
    pub exp: i64,
    /// Client the token was issued to (access tokens).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Audience (id tokens).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// `access` or `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,
    /// Username, when the issuer includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Verifies signed JWTs issued by `<issuer_base_url>/<issuer_id>`.
///
/// Checks signature, `exp` (no leeway), `iss`, the `token_use` claim when
/// configured, and that either `client_id` or `aud` names the expected
/// client.
pub struct JwtVerifier {
    issuer_base_url: String,
    token_use: Option<String>,
    keys: Arc<dyn KeyProvider>,
}

impl JwtVerifier {
    /// Create a verifier.
    pub fn new(issuer_base_url: impl Into<String>, keys: Arc<dyn KeyProvider>) -> Self {
        Self {
            issuer_base_url: issuer_base_url.into(),
            token_use: None,
            keys,
        }
    }

    /// Require the `token_use` claim to equal `token_use`.
    #[must_use]
    pub fn with_token_use(mut self, token_use: impl Into<String>) -> Self {
        let token_use = token_use.into();
        self.token_use = (!token_use.is_empty()).then_some(token_use);
        self
    }

    /// Issuer URL for an issuer id.
    pub fn issuer_for(&self, issuer_id: &str) -> String {
        format!("{}/{}", self.issuer_base_url.trim_end_matches('/'), issuer_id)
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(
        &self,
        token: &str,
        issuer_id: &str,
        client_id: &str,
    ) -> Result<Principal, AuthError> {
        let header = decode_header(token)?;
        let issuer = self.issuer_for(issuer_id);
        let (key, alg) = self.keys.key_for(&issuer, &header).await?;

        let mut validation = Validation::new(alg);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let claims = decode::<Claims>(token, &key, &validation)?.claims;

        if let Some(expected) = &self.token_use {
            let actual = claims.token_use.clone().unwrap_or_default();
            if &actual != expected {
                return Err(AuthError::WrongTokenUse {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let audience_ok = claims.client_id.as_deref() == Some(client_id)
            || claims.aud.as_ref().is_some_and(|a| a.contains(client_id));
        if !audience_ok {
            return Err(AuthError::AudienceMismatch(client_id.to_string()));
        }

        Ok(Principal {
            subject: claims.sub,
            username: claims.username,
            issuer: claims.iss,
            client_id: client_id.to_string(),
            expires_at: claims.exp,
        })
    }
}
