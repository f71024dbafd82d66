//! The Authorization Gate.
//!
//! Stateless: every call verifies from scratch and never retries. A denied
//! token is terminal for that connection attempt; the client must obtain a
//! new token.

use std::fmt;
use std::sync::Arc;

use relay_settings::AuthSettings;
use tracing::{debug, instrument, warn};

use crate::errors::AuthError;
use crate::keys::{KeyProvider, RemoteJwks, SharedSecretKeys, parse_algorithms};
use crate::verifier::{JwtVerifier, TokenVerifier};

/// Per-attempt verification input, discarded after the verdict.
#[derive(Clone)]
pub struct AuthContext {
    /// Bearer token, optionally prefixed with `Bearer `.
    pub token: String,
    /// Issuer id the token must come from.
    pub expected_issuer_id: String,
    /// Client id the token must be issued to.
    pub expected_client_id: String,
}

impl AuthContext {
    /// Build a context.
    pub fn new(
        token: impl Into<String>,
        expected_issuer_id: impl Into<String>,
        expected_client_id: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            expected_issuer_id: expected_issuer_id.into(),
            expected_client_id: expected_client_id.into(),
        }
    }

    /// Token with any `Bearer ` prefix and surrounding whitespace removed.
    pub fn bearer(&self) -> &str {
        let token = self.token.trim_start();
        token
            .strip_prefix("Bearer ")
            .or_else(|| token.strip_prefix("bearer "))
            .unwrap_or(token)
            .trim()
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("token", &"[redacted]")
            .field("expected_issuer_id", &self.expected_issuer_id)
            .field("expected_client_id", &self.expected_client_id)
            .finish()
    }
}

/// Identity established by a verified token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    /// Token subject.
    pub subject: String,
    /// Username claim, if present.
    pub username: Option<String>,
    /// Verified issuer URL.
    pub issuer: String,
    /// Verified client id.
    pub client_id: String,
    /// Token expiry (Unix seconds).
    pub expires_at: i64,
}

/// Outcome of [`AuthorizationGate::authorize`].
#[derive(Debug)]
pub enum Verdict {
    /// Proceed with the upgrade.
    Allow(Principal),
    /// Reject with an unauthorized response.
    Deny(AuthError),
}

impl Verdict {
    /// Whether the attempt may proceed.
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// Decides whether a connection attempt may upgrade.
pub struct AuthorizationGate {
    verifier: Arc<dyn TokenVerifier>,
    allowed_issuer_ids: Vec<String>,
    allowed_client_ids: Vec<String>,
}

impl AuthorizationGate {
    /// Gate over `verifier` with no allowlists.
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            verifier,
            allowed_issuer_ids: Vec::new(),
            allowed_client_ids: Vec::new(),
        }
    }

    /// Restrict the issuer ids clients may name. Empty allows any.
    #[must_use]
    pub fn with_allowed_issuers(mut self, ids: Vec<String>) -> Self {
        self.allowed_issuer_ids = ids;
        self
    }

    /// Restrict the client ids clients may name. Empty allows any.
    #[must_use]
    pub fn with_allowed_clients(mut self, ids: Vec<String>) -> Self {
        self.allowed_client_ids = ids;
        self
    }

    /// Build the gate described by settings: a shared secret selects local
    /// HMAC verification, otherwise keys come from the issuer's key set.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        let keys: Arc<dyn KeyProvider> = match &settings.shared_secret {
            Some(secret) => Arc::new(SharedSecretKeys::new(secret.as_bytes())),
            None => Arc::new(RemoteJwks::new(parse_algorithms(
                &settings.allowed_algorithms,
            )?)?),
        };
        let verifier = JwtVerifier::new(settings.issuer_base_url.clone(), keys)
            .with_token_use(settings.token_use.clone());
        let gate = Self::new(Arc::new(verifier))
            .with_allowed_issuers(settings.allowed_issuer_ids.clone())
            .with_allowed_clients(settings.allowed_client_ids.clone());
        if gate.accepts_any_issuer() {
            warn!(
                issuer_base_url = %settings.issuer_base_url,
                "no allowedIssuerIds configured: any issuer under the base URL is trusted"
            );
        }
        Ok(gate)
    }

    /// Whether a client may name any issuer id under the base URL.
    pub fn accepts_any_issuer(&self) -> bool {
        self.allowed_issuer_ids.is_empty()
    }

    /// Verify the context. Never retries.
    #[instrument(skip_all, fields(issuer_id = %ctx.expected_issuer_id, client_id = %ctx.expected_client_id))]
    pub async fn authorize(&self, ctx: &AuthContext) -> Verdict {
        match self.check(ctx).await {
            Ok(principal) => {
                debug!(subject = %principal.subject, "token accepted");
                Verdict::Allow(principal)
            }
            Err(err) => {
                debug!(reason = %err, "token rejected");
                Verdict::Deny(err)
            }
        }
    }

    async fn check(&self, ctx: &AuthContext) -> Result<Principal, AuthError> {
        let token = ctx.bearer();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        if ctx.expected_issuer_id.is_empty() || ctx.expected_client_id.is_empty() {
            return Err(AuthError::MissingContext);
        }
        if !allowed(&self.allowed_issuer_ids, &ctx.expected_issuer_id) {
            return Err(AuthError::IssuerNotAllowed(ctx.expected_issuer_id.clone()));
        }
        if !allowed(&self.allowed_client_ids, &ctx.expected_client_id) {
            return Err(AuthError::ClientNotAllowed(ctx.expected_client_id.clone()));
        }
        self.verifier
            .verify(token, &ctx.expected_issuer_id, &ctx.expected_client_id)
            .await
    }
}

fn allowed(list: &[String], value: &str) -> bool {
    list.is_empty() || list.iter().any(|v| v == value)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::verifier::tests::{BASE, SECRET, access_claims, sign, verifier};

    /// Counts calls and always rejects.
    #[derive(Default)]
    struct CountingVerifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenVerifier for CountingVerifier {
        async fn verify(&self, _: &str, _: &str, _: &str) -> Result<Principal, AuthError> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::AudienceMismatch("x".into()))
        }
    }

    fn gate() -> AuthorizationGate {
        AuthorizationGate::new(Arc::new(verifier()))
    }

    #[tokio::test]
    async fn allows_valid_token() {
        let token = sign(&access_claims("pool-1", "client-1"));
        let verdict = gate()
            .authorize(&AuthContext::new(token, "pool-1", "client-1"))
            .await;
        assert_matches!(verdict, Verdict::Allow(p) if p.subject == "user-1");
    }

    #[tokio::test]
    async fn strips_bearer_prefix() {
        let token = format!("Bearer {}", sign(&access_claims("pool-1", "client-1")));
        let verdict = gate()
            .authorize(&AuthContext::new(token, "pool-1", "client-1"))
            .await;
        assert!(verdict.is_allow());
    }

    #[tokio::test]
    async fn missing_token_denied() {
        let verdict = gate()
            .authorize(&AuthContext::new("", "pool-1", "client-1"))
            .await;
        assert_matches!(verdict, Verdict::Deny(AuthError::MissingToken));

        let verdict = gate()
            .authorize(&AuthContext::new("Bearer ", "pool-1", "client-1"))
            .await;
        assert_matches!(verdict, Verdict::Deny(AuthError::MissingToken));
    }

    #[tokio::test]
    async fn missing_context_denied() {
        let token = sign(&access_claims("pool-1", "client-1"));
        let verdict = gate().authorize(&AuthContext::new(token, "", "client-1")).await;
        assert_matches!(verdict, Verdict::Deny(AuthError::MissingContext));
    }

    #[tokio::test]
    async fn allowlists_checked_before_verification() {
        let counting = Arc::new(CountingVerifier::default());
        let gate = AuthorizationGate::new(counting.clone())
            .with_allowed_issuers(vec!["pool-1".into()])
            .with_allowed_clients(vec!["client-1".into()]);

        let verdict = gate.authorize(&AuthContext::new("t", "pool-9", "client-1")).await;
        assert_matches!(verdict, Verdict::Deny(AuthError::IssuerNotAllowed(_)));
        let verdict = gate.authorize(&AuthContext::new("t", "pool-1", "client-9")).await;
        assert_matches!(verdict, Verdict::Deny(AuthError::ClientNotAllowed(_)));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn denial_is_not_retried() {
        let counting = Arc::new(CountingVerifier::default());
        let gate = AuthorizationGate::new(counting.clone());
        let verdict = gate.authorize(&AuthContext::new("t", "pool-1", "client-1")).await;
        assert!(!verdict.is_allow());
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn from_settings_with_shared_secret() {
        let settings = AuthSettings {
            issuer_base_url: BASE.into(),
            shared_secret: Some(String::from_utf8(SECRET.to_vec()).unwrap()),
            ..AuthSettings::default()
        };
        let gate = AuthorizationGate::from_settings(&settings).unwrap();
        let token = sign(&access_claims("pool-1", "client-1"));
        assert!(
            gate.authorize(&AuthContext::new(token, "pool-1", "client-1"))
                .await
                .is_allow()
        );
    }

    #[test]
    fn open_issuer_allowlist_is_reported() {
        let open = AuthSettings {
            shared_secret: Some("s".into()),
            ..AuthSettings::default()
        };
        assert!(AuthorizationGate::from_settings(&open).unwrap().accepts_any_issuer());

        let pinned = AuthSettings {
            allowed_issuer_ids: vec!["pool-1".into()],
            ..open
        };
        assert!(!AuthorizationGate::from_settings(&pinned).unwrap().accepts_any_issuer());
    }

    #[test]
    fn debug_redacts_token() {
        let ctx = AuthContext::new("secret-token", "p", "c");
        let out = format!("{ctx:?}");
        assert!(!out.contains("secret-token"));
        assert!(out.contains("[redacted]"));
    }
}
