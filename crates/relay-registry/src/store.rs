//! Backing store abstraction.

use async_trait::async_trait;
use relay_core::ConnectionId;

use crate::errors::Result;
use crate::record::ConnectionRecord;

/// Key-value store with per-key atomicity and absolute-time expiry.
///
/// Implementations must tolerate concurrent calls for different keys. No
/// cross-key transactions are required, and `scan` need not be
/// linearizable with concurrent `put`/`delete`.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Insert or overwrite the record keyed by its connection id.
    async fn put(&self, record: ConnectionRecord) -> Result<()>;

    /// Snapshot of records that have not expired at `as_of` (Unix seconds).
    async fn scan(&self, as_of: i64) -> Result<Vec<ConnectionRecord>>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, connection_id: &ConnectionId) -> Result<bool>;

    /// Remove every record expired at `now`. Returns how many were removed.
    async fn purge_expired(&self, now: i64) -> Result<usize>;
}
