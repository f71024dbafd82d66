//! Heartbeat emitter: `{"action":"heartbeat","message":""}` on a fixed
//! period while the session is open.
//!
//! The first beat fires one full period after the session opens. Beats are
//! not acknowledged and never refresh the registry TTL; they only keep the
//! server from reclaiming the connection as idle.

use std::sync::Arc;
use std::time::Duration;

use relay_core::MessageEnvelope;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use crate::session::Shared;
use crate::state::SessionState;

/// Spawn the emitter. Stops when the session is cancelled or leaves `Open`.
pub(crate) fn spawn_heartbeat(period: Duration, shared: Arc<Shared>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let frame = match MessageEnvelope::heartbeat().to_json() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "could not encode heartbeat, emitter disabled");
                return;
            }
        };
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shared.cancelled() => break,
                _ = ticker.tick() => {
                    if shared.state() != SessionState::Open {
                        break;
                    }
                    if let Err(e) = shared.send(frame.clone()).await {
                        debug!(error = %e, "heartbeat not sent");
                        break;
                    }
                    debug!("heartbeat sent");
                }
            }
        }
    })
}
