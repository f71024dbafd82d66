//! Process-local store.

use async_trait::async_trait;
use dashmap::DashMap;
use relay_core::ConnectionId;

use crate::errors::Result;
use crate::record::ConnectionRecord;
use crate::store::ConnectionStore;

/// In-memory store backed by a sharded concurrent map.
///
/// Records do not survive a restart, which matches the lifetime of the
/// transports they describe when the relay runs as a single process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<ConnectionId, i64>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn put(&self, record: ConnectionRecord) -> Result<()> {
        let _ = self
            .records
            .insert(record.connection_id, record.expiry_time);
        Ok(())
    }

    async fn scan(&self, as_of: i64) -> Result<Vec<ConnectionRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| *entry.value() > as_of)
            .map(|entry| ConnectionRecord::new(entry.key().clone(), *entry.value()))
            .collect())
    }

    async fn delete(&self, connection_id: &ConnectionId) -> Result<bool> {
        Ok(self.records.remove(connection_id).is_some())
    }

    async fn purge_expired(&self, now: i64) -> Result<usize> {
        let mut removed = 0;
        self.records.retain(|_, expiry| {
            let keep = *expiry > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
