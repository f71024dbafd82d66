//! Stored connection record.

use relay_core::ConnectionId;
use serde::{Deserialize, Serialize};

/// One live connection: `{ "connectionId": ..., "expiryTime": <unix secs> }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    /// Connection id, unique across the registry.
    pub connection_id: ConnectionId,
    /// Absolute expiry in Unix seconds.
    pub expiry_time: i64,
}

impl ConnectionRecord {
    /// Build a record.
    pub fn new(connection_id: ConnectionId, expiry_time: i64) -> Self {
        Self {
            connection_id,
            expiry_time,
        }
    }

    /// Whether the record has expired at `now` (Unix seconds).
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry_time <= now
    }
}
