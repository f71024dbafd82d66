//! Package-level constants.

use std::time::Duration;

/// Current version of the relay (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "relay";

/// Lifetime of a registry record, counted from `Register`.
pub const CONNECTION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Query parameter carrying the bearer token on the connect request.
pub const QUERY_AUTHORIZATION: &str = "Authorization";

/// Query parameter carrying the expected client (audience) id.
pub const QUERY_CLIENT_ID: &str = "clientId";

/// Query parameter carrying the expected user pool (issuer) id.
pub const QUERY_USER_POOL_ID: &str = "userPoolId";

/// Body of the generic server error sent to a sender whose broadcast failed.
pub const BROADCAST_FAILED_MESSAGE: &str = "Error sending message.";
