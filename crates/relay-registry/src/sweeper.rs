//! Background purge of expired connection records.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::ConnectionRegistry;

/// Spawn a task that calls [`ConnectionRegistry::purge_expired`] every
/// `interval` until `cancel` fires.
///
/// Stores already hide expired records from scans; the sweeper only
/// reclaims their storage. Sweep failures are logged and the next tick
/// tries again.
pub fn spawn_expiry_sweeper(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("expiry sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match registry.purge_expired().await {
                        Ok(0) => {}
                        Ok(purged) => info!(purged, "purged expired connections"),
                        Err(e) => warn!(error = %e, "expiry sweep failed"),
                    }
                }
            }
        }
    })
}
