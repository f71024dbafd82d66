//! Connection registry: the authoritative set of live connection ids.

use std::sync::Arc;
use std::time::Duration;

use relay_core::constants::CONNECTION_TTL;
use relay_core::{Clock, ConnectionId, SystemClock};
use tracing::{debug, instrument};

use crate::errors::{RegistryError, Result};
use crate::record::ConnectionRecord;
use crate::store::ConnectionStore;

/// Records and removes connection ids with a fixed time-to-live.
///
/// The expiry is set once at registration and never refreshed by traffic.
/// It is a courtesy cleanup for crashed clients; explicit `unregister` on
/// close and eviction on stale delivery are the primary removal paths.
/// No operation retries against the store.
#[derive(Clone)]
pub struct ConnectionRegistry {
    store: Arc<dyn ConnectionStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ConnectionRegistry {
    /// Registry over `store` with the system clock and a 24h TTL.
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ttl: CONNECTION_TTL,
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the record lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Record lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or refresh the record for `connection_id` with
    /// `expiryTime = now + ttl`.
    #[instrument(skip(self), fields(conn_id = %connection_id))]
    pub async fn register(&self, connection_id: &ConnectionId) -> Result<ConnectionRecord> {
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let expiry_time = self.clock.now_secs().saturating_add(ttl_secs);
        let record = ConnectionRecord::new(connection_id.clone(), expiry_time);
        self.store
            .put(record.clone())
            .await
            .map_err(|e| normalize(e, RegistryError::Write))?;
        debug!(expiry_time, "connection registered");
        Ok(record)
    }

    /// Remove the record for `connection_id`. Removing an absent id is a
    /// no-op; only store failures are reported.
    #[instrument(skip(self), fields(conn_id = %connection_id))]
    pub async fn unregister(&self, connection_id: &ConnectionId) -> Result<()> {
        let existed = self
            .store
            .delete(connection_id)
            .await
            .map_err(|e| normalize(e, RegistryError::Delete))?;
        debug!(existed, "connection unregistered");
        Ok(())
    }

    /// Snapshot of connection ids that have not expired.
    ///
    /// Not linearizable with concurrent `register`/`unregister`: ids added
    /// after the scan starts may be missing, ids removed may still appear.
    pub async fn list_active(&self) -> Result<Vec<ConnectionId>> {
        let now = self.clock.now_secs();
        let records = self
            .store
            .scan(now)
            .await
            .map_err(|e| normalize(e, RegistryError::Scan))?;
        Ok(records.into_iter().map(|r| r.connection_id).collect())
    }

    /// Delete every record whose expiry has passed. Returns the count removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now_secs();
        self.store
            .purge_expired(now)
            .await
            .map_err(|e| normalize(e, RegistryError::Delete))
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Fold backend errors into the variant naming the failed operation.
fn normalize(err: RegistryError, wrap: fn(String) -> RegistryError) -> RegistryError {
    match err {
        RegistryError::Write(_) | RegistryError::Scan(_) | RegistryError::Delete(_) => err,
        other => wrap(other.to_string()),
    }
}
