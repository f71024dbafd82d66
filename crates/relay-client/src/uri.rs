//! Connect URI with the verification context in the query string.

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use relay_core::constants::{QUERY_AUTHORIZATION, QUERY_CLIENT_ID, QUERY_USER_POOL_ID};

/// Everything except RFC 3986 unreserved characters.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Builder for `<base>?Authorization=..&clientId=..&userPoolId=..`.
#[derive(Clone, Default)]
pub struct ConnectUri {
    base: String,
    token: String,
    client_id: String,
    user_pool_id: String,
}

impl ConnectUri {
    /// Start from the relay endpoint, e.g. `ws://127.0.0.1:8080/ws`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            ..Self::default()
        }
    }

    /// Bearer token.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Client id the token was issued to.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Issuer id the token comes from.
    #[must_use]
    pub fn user_pool_id(mut self, user_pool_id: impl Into<String>) -> Self {
        self.user_pool_id = user_pool_id.into();
        self
    }

    /// Render the URI.
    pub fn build(&self) -> String {
        let sep = if self.base.contains('?') { '&' } else { '?' };
        format!(
            "{}{sep}{QUERY_AUTHORIZATION}={}&{QUERY_CLIENT_ID}={}&{QUERY_USER_POOL_ID}={}",
            self.base,
            utf8_percent_encode(&self.token, QUERY_VALUE),
            utf8_percent_encode(&self.client_id, QUERY_VALUE),
            utf8_percent_encode(&self.user_pool_id, QUERY_VALUE),
        )
    }
}

impl fmt::Debug for ConnectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectUri")
            .field("base", &self.base)
            .field("token", &"[redacted]")
            .field("client_id", &self.client_id)
            .field("user_pool_id", &self.user_pool_id)
            .finish()
    }
}
