//! Auth error types.

use relay_core::ErrorKind;

/// Reasons a connection attempt is denied, plus gate construction failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer token was presented.
    #[error("missing bearer token")]
    MissingToken,

    /// Issuer or client id was not supplied.
    #[error("missing verification context")]
    MissingContext,

    /// Issuer id is outside the configured allowlist.
    #[error("issuer not allowed: {0}")]
    IssuerNotAllowed(String),

    /// Client id is outside the configured allowlist.
    #[error("client not allowed: {0}")]
    ClientNotAllowed(String),

    /// Malformed, expired, wrong issuer, or bad signature.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    /// `token_use` claim did not match.
    #[error("token_use mismatch: expected {expected}, got {actual}")]
    WrongTokenUse {
        /// Configured value.
        expected: String,
        /// Value found in the token (empty when absent).
        actual: String,
    },

    /// Neither `client_id` nor `aud` matched the expected client.
    #[error("audience mismatch for client {0}")]
    AudienceMismatch(String),

    /// Token header carried no `kid`.
    #[error("token header has no key id")]
    MissingKeyId,

    /// The issuer's key set has no key with this `kid`.
    #[error("unknown signing key: {0}")]
    UnknownKey(String),

    /// Signature algorithm not accepted.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key set endpoint answered with a non-success status.
    #[error("key fetch failed ({status}): {message}")]
    KeyFetch {
        /// HTTP status code.
        status: u16,
        /// Response body or error description.
        message: String,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AuthError {
    /// Taxonomy classification. Every auth failure denies the attempt.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::AuthorizationDenied
    }
}
