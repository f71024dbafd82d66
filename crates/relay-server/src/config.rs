//! Server configuration.

use std::time::Duration;

use relay_settings::ServerSettings;

/// Runtime configuration for [`RelayServer`](crate::RelayServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
    /// Close connections idle for this long.
    pub idle_timeout: Duration,
    /// Close connections older than this.
    pub max_connection_age: Duration,
    /// How often idle and age limits are checked.
    pub idle_check_interval: Duration,
    /// Concurrent unicasts per broadcast.
    pub fanout_concurrency: usize,
    /// Max inbound message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            send_queue_capacity: 1024,
            idle_timeout: Duration::from_secs(600),
            max_connection_age: Duration::from_secs(7200),
            idle_check_interval: Duration::from_secs(30),
            fanout_concurrency: 32,
            max_message_size: 128 * 1024,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            send_queue_capacity: s.send_queue_capacity,
            idle_timeout: s.idle_timeout(),
            max_connection_age: s.max_connection_age(),
            idle_check_interval: s.idle_check_interval(),
            fanout_concurrency: s.fanout_concurrency,
            max_message_size: s.max_message_size,
        }
    }
}
