//! Process-wide shutdown signal for the listener, sessions, and sweeper.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tracing::{info, warn};

/// How long [`ShutdownCoordinator::drain`] waits when no timeout is given.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the root cancellation token. Sessions hold child tokens so that
/// closing one never cancels its siblings, and a tracker token so that
/// [`drain`](ShutdownCoordinator::drain) outlives their cleanup.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not fired yet.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            sessions: TaskTracker::new(),
        }
    }

    /// Mark one session as live until the returned token is dropped.
    pub fn track_session(&self) -> TaskTrackerToken {
        self.sessions.token()
    }

    /// Spawn a task that [`drain`](Self::drain) waits for.
    pub fn spawn_tracked<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.sessions.spawn(task)
    }

    /// Sessions and tracked tasks still running.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Clone of the root token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Token cancelled with the root but cancellable on its own.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Fire the signal. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the signal, then wait for `handles` and every tracked session
    /// to finish.
    ///
    /// Handles still running after `timeout` are aborted.
    pub async fn drain(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.shutdown();
        self.sessions.close();
        info!(
            task_count = handles.len(),
            sessions = self.sessions.len(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "draining background tasks"
        );

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let all = futures::future::join(futures::future::join_all(handles), self.sessions.wait());
        if tokio::time::timeout(timeout, all).await.is_err() {
            warn!(
                ?timeout,
                sessions = self.sessions.len(),
                "drain timed out, aborting remaining tasks"
            );
            for handle in aborts {
                handle.abort();
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
