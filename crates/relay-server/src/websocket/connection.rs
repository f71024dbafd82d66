//! Per-connection state shared between a session and the hub.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use relay_core::ConnectionId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

use crate::errors::DeliveryError;

/// One accepted `WebSocket` connection.
pub struct ClientConnection {
    /// Connection id assigned at upgrade.
    pub id: ConnectionId,
    /// Send channel to the connection's write task.
    tx: mpsc::Sender<Arc<str>>,
    /// When the connection was accepted.
    pub connected_at: Instant,
    /// Last inbound client frame (pongs excluded).
    last_activity: Mutex<Instant>,
    /// Frames refused because the queue was full.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection around its outbound queue.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<str>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            last_activity: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Enqueue a text frame without waiting.
    ///
    /// A closed queue means the session has ended and maps to
    /// [`DeliveryError::Gone`]; a full queue is [`DeliveryError::Failed`].
    pub fn send(&self, text: Arc<str>) -> Result<(), DeliveryError> {
        match self.tx.try_send(text) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Gone),
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(DeliveryError::Failed("send queue full".into()))
            }
        }
    }

    /// Whether the write side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Total frames refused because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record client activity.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last client activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn make_connection(cap: usize) -> (ClientConnection, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(cap);
        (ClientConnection::new(ConnectionId::from("conn_1"), tx), rx)
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection(8);
        conn.send(Arc::from("hello")).unwrap();
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn send_to_closed_channel_is_gone() {
        let (conn, rx) = make_connection(8);
        drop(rx);
        assert!(conn.is_closed());
        assert_matches!(conn.send(Arc::from("x")), Err(DeliveryError::Gone));
    }

    #[tokio::test]
    async fn send_to_full_channel_fails_and_counts() {
        let (conn, _rx) = make_connection(1);
        conn.send(Arc::from("a")).unwrap();
        assert_matches!(conn.send(Arc::from("b")), Err(DeliveryError::Failed(_)));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn touch_resets_idle() {
        let (conn, _rx) = make_connection(1);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(conn.idle_for(), Duration::from_secs(10));
        conn.touch();
        assert_eq!(conn.idle_for(), Duration::ZERO);
        assert_eq!(conn.age(), Duration::from_secs(10));
    }
}
