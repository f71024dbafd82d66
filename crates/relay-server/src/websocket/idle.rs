//! Idle reclaim and maximum connection age.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::connection::ClientConnection;

/// Why the monitor returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleResult {
    /// No client activity within the idle timeout.
    Idle,
    /// The connection reached its maximum age.
    Expired,
    /// The monitor was cancelled externally.
    Cancelled,
}

impl IdleResult {
    /// Label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Expired => "max_age",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Limits enforced by [`run_idle_monitor`].
#[derive(Debug, Clone, Copy)]
pub struct IdleLimits {
    /// Close after this long without client activity.
    pub idle_timeout: Duration,
    /// Close once the connection is this old.
    pub max_age: Duration,
    /// How often the limits are checked.
    pub check_interval: Duration,
}

/// Check `conn` against `limits` every `check_interval` until a limit is
/// hit or `cancel` fires.
pub async fn run_idle_monitor(
    conn: Arc<ClientConnection>,
    limits: IdleLimits,
    cancel: CancellationToken,
) -> IdleResult {
    let period = limits.check_interval.max(Duration::from_millis(1));
    let mut ticker = time::interval(period);
    // Skip the immediate first tick
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if conn.age() >= limits.max_age {
                    info!(conn_id = %conn.id, age_secs = conn.age().as_secs(), "connection reached max age");
                    return IdleResult::Expired;
                }
                let idle = conn.idle_for();
                if idle >= limits.idle_timeout {
                    info!(conn_id = %conn.id, idle_secs = idle.as_secs(), "connection idle, reclaiming");
                    return IdleResult::Idle;
                }
            }
            () = cancel.cancelled() => {
                return IdleResult::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use relay_core::ConnectionId;
    use tokio::sync::mpsc;

    use super::*;

    fn make_connection() -> (Arc<ClientConnection>, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Arc::new(ClientConnection::new(ConnectionId::from("conn_idle"), tx)),
            rx,
        )
    }

    fn limits(idle: u64, max_age: u64, check: u64) -> IdleLimits {
        IdleLimits {
            idle_timeout: Duration::from_secs(idle),
            max_age: Duration::from_secs(max_age),
            check_interval: Duration::from_secs(check),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_connection_is_reclaimed() {
        let (conn, _rx) = make_connection();
        let result = run_idle_monitor(conn, limits(10, 3600, 1), CancellationToken::new()).await;
        assert_eq!(result, IdleResult::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_keeps_connection_open() {
        let (conn, _rx) = make_connection();
        let cancel = CancellationToken::new();
        let monitor = tokio::spawn(run_idle_monitor(
            conn.clone(),
            limits(10, 3600, 1),
            cancel.clone(),
        ));

        for _ in 0..5 {
            time::sleep(Duration::from_secs(6)).await;
            conn.touch();
        }
        assert!(!monitor.is_finished());

        cancel.cancel();
        assert_eq!(monitor.await.unwrap(), IdleResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn max_age_wins_over_activity() {
        let (conn, _rx) = make_connection();
        let monitor = tokio::spawn(run_idle_monitor(
            conn.clone(),
            limits(10, 20, 1),
            CancellationToken::new(),
        ));
        for _ in 0..10 {
            time::sleep(Duration::from_secs(3)).await;
            conn.touch();
        }
        assert_eq!(monitor.await.unwrap(), IdleResult::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_wait() {
        let (conn, _rx) = make_connection();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_idle_monitor(conn, limits(10, 20, 5), cancel).await;
        assert_eq!(result, IdleResult::Cancelled);
    }
}
