//! Broadcast fan-out with stale-recipient eviction.
//!
//! Each broadcast snapshots the registry, drops the sender from the
//! recipient set, and unicasts the payload to everyone else. A recipient
//! whose transport is gone is unregistered and counted as pruned. Any other
//! delivery failure is recorded and the fan-out continues. Delivery is
//! at-most-once: nothing is queued, persisted, or retried.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use futures::stream;
use metrics::{counter, histogram};
use relay_core::ConnectionId;
use relay_registry::{ConnectionRegistry, RegistryError};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::hub::Unicast;
use crate::errors::DeliveryError;
use crate::metrics::{
    BROADCAST_DURATION_SECONDS, BROADCASTS_TOTAL, DELIVERIES_TOTAL, DELIVERY_ERRORS_TOTAL,
    PRUNED_TOTAL, REGISTRY_ERRORS_TOTAL,
};

/// A recipient that failed for a reason other than staleness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    /// Recipient.
    pub connection_id: ConnectionId,
    /// Failure detail.
    pub reason: String,
}

/// Aggregate result of one broadcast.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    /// Recipients the payload was handed to.
    pub delivered: usize,
    /// Stale recipients evicted from the registry.
    pub pruned: usize,
    /// Recipients that failed for any other reason.
    pub errored: usize,
    /// One entry per errored recipient.
    pub failures: Vec<DeliveryFailure>,
}

impl BroadcastOutcome {
    /// Recipients attempted.
    pub fn attempted(&self) -> usize {
        self.delivered + self.pruned + self.errored
    }
}

/// Fans a payload out to every registered connection except the sender.
pub struct BroadcastDispatcher {
    registry: Arc<ConnectionRegistry>,
    unicast: Arc<dyn Unicast>,
    concurrency: usize,
}

impl BroadcastDispatcher {
    /// Create a dispatcher running up to `concurrency` unicasts at once.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        unicast: Arc<dyn Unicast>,
        concurrency: usize,
    ) -> Self {
        Self {
            registry,
            unicast,
            concurrency: concurrency.max(1),
        }
    }

    /// Deliver `payload` to every active connection except `sender`.
    ///
    /// Only a registry scan failure is returned as an error. Eviction
    /// failures are logged and the recipient still counts as pruned.
    #[instrument(skip_all, fields(sender = %sender))]
    pub async fn broadcast(
        &self,
        sender: &ConnectionId,
        payload: &str,
    ) -> Result<BroadcastOutcome, RegistryError> {
        let started = Instant::now();
        let snapshot = self.registry.list_active().await.inspect_err(|e| {
            counter!(REGISTRY_ERRORS_TOTAL, "kind" => e.kind().as_str()).increment(1);
        })?;

        let recipients: Vec<ConnectionId> =
            snapshot.into_iter().filter(|id| id != sender).collect();
        let payload: Arc<str> = Arc::from(payload);
        debug!(recipients = recipients.len(), "fanning out");

        let mut deliveries = stream::iter(recipients)
            .map(|id| {
                let payload = payload.clone();
                async move {
                    let result = self.unicast.post(&id, payload).await;
                    (id, result)
                }
            })
            .buffer_unordered(self.concurrency);

        let mut outcome = BroadcastOutcome::default();
        while let Some((id, result)) = deliveries.next().await {
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(DeliveryError::Gone) => {
                    self.evict(&id).await;
                    outcome.pruned += 1;
                }
                Err(DeliveryError::Failed(reason)) => {
                    warn!(conn_id = %id, %reason, "delivery failed");
                    outcome.errored += 1;
                    outcome.failures.push(DeliveryFailure {
                        connection_id: id,
                        reason,
                    });
                }
            }
        }

        counter!(BROADCASTS_TOTAL).increment(1);
        counter!(DELIVERIES_TOTAL).increment(outcome.delivered as u64);
        counter!(PRUNED_TOTAL).increment(outcome.pruned as u64);
        counter!(DELIVERY_ERRORS_TOTAL).increment(outcome.errored as u64);
        histogram!(BROADCAST_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        info!(
            delivered = outcome.delivered,
            pruned = outcome.pruned,
            errored = outcome.errored,
            "broadcast complete"
        );
        Ok(outcome)
    }

    async fn evict(&self, id: &ConnectionId) {
        match self.registry.unregister(id).await {
            Ok(()) => debug!(conn_id = %id, "evicted stale connection"),
            Err(e) => {
                counter!(REGISTRY_ERRORS_TOTAL, "kind" => e.kind().as_str()).increment(1);
                warn!(conn_id = %id, error = %e, "failed to evict stale connection");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use relay_registry::{ConnectionRecord, ConnectionStore, MemoryStore};

    use super::*;

    /// Records every post; answers per-recipient scripted results.
    #[derive(Default)]
    struct ScriptedUnicast {
        script: HashMap<String, DeliveryError>,
        posted: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedUnicast {
        fn failing(mut self, id: &str, err: DeliveryError) -> Self {
            let _ = self.script.insert(id.to_string(), err);
            self
        }

        fn recipients(&self) -> HashSet<String> {
            self.posted.lock().iter().map(|(id, _)| id.clone()).collect()
        }
    }

    #[async_trait]
    impl Unicast for ScriptedUnicast {
        async fn post(&self, id: &ConnectionId, payload: Arc<str>) -> Result<(), DeliveryError> {
            self.posted
                .lock()
                .push((id.to_string(), payload.to_string()));
            match self.script.get(id.as_str()) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    struct ScanFails;

    #[async_trait]
    impl ConnectionStore for ScanFails {
        async fn put(&self, _: ConnectionRecord) -> relay_registry::Result<()> {
            Ok(())
        }
        async fn scan(&self, _: i64) -> relay_registry::Result<Vec<ConnectionRecord>> {
            Err(RegistryError::Unavailable("throttled".into()))
        }
        async fn delete(&self, _: &ConnectionId) -> relay_registry::Result<bool> {
            Ok(false)
        }
        async fn purge_expired(&self, _: i64) -> relay_registry::Result<usize> {
            Ok(0)
        }
    }

    /// Scans normally but refuses deletes.
    struct DeleteFails(MemoryStore);

    #[async_trait]
    impl ConnectionStore for DeleteFails {
        async fn put(&self, r: ConnectionRecord) -> relay_registry::Result<()> {
            self.0.put(r).await
        }
        async fn scan(&self, as_of: i64) -> relay_registry::Result<Vec<ConnectionRecord>> {
            self.0.scan(as_of).await
        }
        async fn delete(&self, _: &ConnectionId) -> relay_registry::Result<bool> {
            Err(RegistryError::Unavailable("delete refused".into()))
        }
        async fn purge_expired(&self, now: i64) -> relay_registry::Result<usize> {
            self.0.purge_expired(now).await
        }
    }

    fn id(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    async fn registry_with(ids: &[&str]) -> Arc<ConnectionRegistry> {
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(MemoryStore::new())));
        for i in ids {
            let _ = registry.register(&id(i)).await.unwrap();
        }
        registry
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn sender_is_excluded() {
        // X, Y, Z registered; X broadcasts.
        let registry = registry_with(&["x", "y", "z"]).await;
        let unicast = Arc::new(ScriptedUnicast::default());
        let dispatcher = BroadcastDispatcher::new(registry, unicast.clone(), 4);

        let outcome = dispatcher
            .broadcast(&id("x"), r#"{"message":"hi"}"#)
            .await
            .unwrap();

        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.attempted(), 2);
        assert_eq!(unicast.recipients(), set(&["y", "z"]));
        for (_, payload) in unicast.posted.lock().iter() {
            assert_eq!(payload, r#"{"message":"hi"}"#);
        }
    }

    #[tokio::test]
    async fn recipient_set_is_registered_minus_sender() {
        let ids: Vec<String> = (0..20).map(|i| format!("c{i:02}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let registry = registry_with(&refs).await;
        let unicast = Arc::new(ScriptedUnicast::default());
        let dispatcher = BroadcastDispatcher::new(registry, unicast.clone(), 3);

        let outcome = dispatcher.broadcast(&id("c07"), "p").await.unwrap();

        let mut expected = set(&refs);
        let _ = expected.remove("c07");
        assert_eq!(unicast.recipients(), expected);
        assert_eq!(outcome.delivered, 19);
    }

    #[tokio::test]
    async fn unregistered_sender_reaches_everyone() {
        let registry = registry_with(&["y", "z"]).await;
        let unicast = Arc::new(ScriptedUnicast::default());
        let dispatcher = BroadcastDispatcher::new(registry, unicast.clone(), 4);
        let outcome = dispatcher.broadcast(&id("ghost"), "p").await.unwrap();
        assert_eq!(outcome.delivered, 2);
    }

    #[tokio::test]
    async fn stale_recipient_is_pruned() {
        // X, Y registered; Y is gone.
        let registry = registry_with(&["x", "y"]).await;
        let unicast = Arc::new(ScriptedUnicast::default().failing("y", DeliveryError::Gone));
        let dispatcher = BroadcastDispatcher::new(registry.clone(), unicast, 4);

        let outcome = dispatcher.broadcast(&id("x"), "p").await.unwrap();

        assert_eq!(
            outcome,
            BroadcastOutcome {
                delivered: 0,
                pruned: 1,
                errored: 0,
                failures: vec![],
            }
        );
        assert_eq!(registry.list_active().await.unwrap(), vec![id("x")]);
    }

    #[tokio::test]
    async fn stale_recipient_does_not_block_others() {
        let registry = registry_with(&["s", "a", "b", "c"]).await;
        let unicast = Arc::new(ScriptedUnicast::default().failing("b", DeliveryError::Gone));
        let dispatcher = BroadcastDispatcher::new(registry.clone(), unicast.clone(), 1);

        let outcome = dispatcher.broadcast(&id("s"), "p").await.unwrap();

        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.pruned, 1);
        assert_eq!(unicast.recipients(), set(&["a", "b", "c"]));
        let mut active = registry.list_active().await.unwrap();
        active.sort();
        assert_eq!(active, vec![id("a"), id("c"), id("s")]);
    }

    #[tokio::test]
    async fn other_failures_are_recorded_not_fatal() {
        let registry = registry_with(&["s", "a", "b"]).await;
        let unicast = Arc::new(
            ScriptedUnicast::default().failing("a", DeliveryError::Failed("send queue full".into())),
        );
        let dispatcher = BroadcastDispatcher::new(registry.clone(), unicast, 4);

        let outcome = dispatcher.broadcast(&id("s"), "p").await.unwrap();

        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.errored, 1);
        assert_eq!(
            outcome.failures,
            vec![DeliveryFailure {
                connection_id: id("a"),
                reason: "send queue full".into(),
            }]
        );
        // Not evicted.
        assert_eq!(registry.list_active().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn scan_failure_propagates() {
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(ScanFails)));
        let unicast = Arc::new(ScriptedUnicast::default());
        let dispatcher = BroadcastDispatcher::new(registry, unicast.clone(), 4);

        let result = dispatcher.broadcast(&id("s"), "p").await;
        assert_matches!(result, Err(RegistryError::Scan(_)));
        assert!(unicast.recipients().is_empty());
    }

    #[tokio::test]
    async fn eviction_failure_still_counts_as_pruned() {
        let store = DeleteFails(MemoryStore::new());
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(store)));
        let _ = registry.register(&id("s")).await.unwrap();
        let _ = registry.register(&id("y")).await.unwrap();
        let unicast = Arc::new(ScriptedUnicast::default().failing("y", DeliveryError::Gone));
        let dispatcher = BroadcastDispatcher::new(registry, unicast, 4);

        let outcome = dispatcher.broadcast(&id("s"), "p").await.unwrap();
        assert_eq!(outcome.pruned, 1);
        assert_eq!(outcome.errored, 0);
    }

    #[tokio::test]
    async fn empty_registry_is_a_noop() {
        let registry = registry_with(&[]).await;
        let dispatcher =
            BroadcastDispatcher::new(registry, Arc::new(ScriptedUnicast::default()), 4);
        let outcome = dispatcher.broadcast(&id("s"), "p").await.unwrap();
        assert_eq!(outcome, BroadcastOutcome::default());
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped() {
        let registry = registry_with(&["s", "a"]).await;
        let dispatcher =
            BroadcastDispatcher::new(registry, Arc::new(ScriptedUnicast::default()), 0);
        let outcome = dispatcher.broadcast(&id("s"), "p").await.unwrap();
        assert_eq!(outcome.delivered, 1);
    }
}
