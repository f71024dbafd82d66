//! Settings types with compiled defaults.
//!
//! Every struct deserializes with `#[serde(default)]`, so a settings file
//! only needs the keys it overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Gateway settings.
    pub server: ServerSettings,
    /// Connection registry settings.
    pub registry: RegistrySettings,
    /// Authorization gate settings.
    pub auth: AuthSettings,
    /// Client session settings.
    pub client: ClientSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Gateway listener and per-connection limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// Outbound frames buffered per connection before sends fail.
    pub send_queue_capacity: usize,
    /// Close a connection after this long without client activity.
    pub idle_timeout_secs: u64,
    /// Close a connection once it is this old.
    pub max_connection_secs: u64,
    /// How often idle and age limits are checked.
    pub idle_check_interval_secs: u64,
    /// Unicasts run concurrently per broadcast.
    pub fanout_concurrency: usize,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            send_queue_capacity: 1024,
            idle_timeout_secs: 600,
            max_connection_secs: 7200,
            idle_check_interval_secs: 30,
            fanout_concurrency: 32,
            max_message_size: 128 * 1024,
        }
    }
}

impl ServerSettings {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Idle timeout as a [`Duration`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Maximum connection age as a [`Duration`].
    pub fn max_connection_age(&self) -> Duration {
        Duration::from_secs(self.max_connection_secs)
    }

    /// Idle check interval as a [`Duration`].
    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.idle_check_interval_secs)
    }
}

/// Which store backs the connection registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    /// Process-local map. Records vanish on restart.
    #[default]
    Memory,
    /// SQLite file.
    Sqlite,
}

impl RegistryBackend {
    /// Parse a backend name (case-insensitive).
    pub fn parse(val: &str) -> Option<Self> {
        match val.to_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

/// Connection registry settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrySettings {
    /// Store implementation.
    pub backend: RegistryBackend,
    /// SQLite database path. Relative paths resolve under `~/.relay`.
    pub db_path: String,
    /// Record lifetime in seconds.
    pub ttl_secs: u64,
    /// How often expired records are purged.
    pub sweep_interval_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            backend: RegistryBackend::Memory,
            db_path: "connections.db".to_string(),
            ttl_secs: relay_core::constants::CONNECTION_TTL.as_secs(),
            sweep_interval_secs: 300,
        }
    }
}

impl RegistrySettings {
    /// Absolute database path, resolving relative paths against `base`.
    pub fn resolved_db_path(&self, base: &Path) -> PathBuf {
        let path = Path::new(&self.db_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    }

    /// Record lifetime as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Sweep interval as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Authorization gate settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Issuer prefix; the expected issuer is `<issuerBaseUrl>/<userPoolId>`.
    pub issuer_base_url: String,
    /// Required `token_use` claim. Empty disables the check.
    pub token_use: String,
    /// Signature algorithms accepted from remote key sets.
    pub allowed_algorithms: Vec<String>,
    /// Issuer ids a client may ask to be verified against. Empty allows any.
    pub allowed_issuer_ids: Vec<String>,
    /// Client ids a client may ask to be verified against. Empty allows any.
    pub allowed_client_ids: Vec<String>,
    /// HMAC secret. When set, tokens are verified locally instead of
    /// against the issuer's published key set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_secret: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            issuer_base_url: "https://cognito-idp.us-east-1.amazonaws.com".to_string(),
            token_use: "access".to_string(),
            allowed_algorithms: vec!["RS256".to_string()],
            allowed_issuer_ids: Vec::new(),
            allowed_client_ids: Vec::new(),
            shared_secret: None,
        }
    }
}

/// Client session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Relay endpoint.
    pub url: String,
    /// Heartbeat period in seconds. `0` disables heartbeats.
    pub heartbeat_period_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            heartbeat_period_secs: 0,
        }
    }
}

impl ClientSettings {
    /// Heartbeat period, or `None` when disabled.
    pub fn heartbeat_period(&self) -> Option<Duration> {
        (self.heartbeat_period_secs > 0).then(|| Duration::from_secs(self.heartbeat_period_secs))
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
