//! Client session state machine.
//!
//! A [`ClientSession`] owns exactly one outbound connection. Every state
//! change goes through one `watch` channel, so the receive loop, the
//! heartbeat emitter, and callers never race on [`SessionState`]. Writes to
//! the transport are serialized by a single async mutex around the sink.

use std::sync::Arc;
use std::time::Duration;

use relay_core::MessageEnvelope;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::assembler::FrameAssembler;
use crate::errors::ClientError;
use crate::heartbeat::spawn_heartbeat;
use crate::state::SessionState;
use crate::transport::{Connector, Fragment, FrameSink, FrameStream};

/// How long a close frame may take to write before the session gives up
/// and reports the transport as failed.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Signals delivered to application code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The upgrade succeeded.
    Opened,
    /// One complete inbound message.
    Message(String),
    /// The connection closed cleanly.
    Closed,
    /// The session failed.
    Error(ClientError),
}

/// State shared between the session handle and its background tasks.
pub(crate) struct Shared {
    state: watch::Sender<SessionState>,
    sink: Mutex<Option<Box<dyn FrameSink>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
}

impl Shared {
    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Apply `to` if legal from the current state. Returns the old state.
    fn transition(&self, to: SessionState) -> Result<SessionState, ClientError> {
        let mut from = to;
        let applied = self.state.send_if_modified(|current| {
            from = *current;
            if current.can_transition_to(to) {
                *current = to;
                true
            } else {
                false
            }
        });
        if applied {
            debug!(%from, %to, "session state changed");
            Ok(from)
        } else {
            Err(ClientError::InvalidTransition { from, to })
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Write one frame. Only valid while `Open`.
    ///
    /// Waiting for the sink and the write itself both give way to
    /// cancellation, so a close never queues behind a stalled write.
    pub(crate) async fn send(&self, text: String) -> Result<(), ClientError> {
        let current = self.state();
        if current != SessionState::Open {
            return Err(ClientError::SendWhileNotOpen(current));
        }
        let result = tokio::select! {
            () = self.cancel.cancelled() => None,
            result = self.write(text) => Some(result),
        };
        match result {
            None => {
                debug!("pending write abandoned");
                Err(ClientError::SendWhileNotOpen(self.state()))
            }
            Some(Err(e)) => {
                self.fail(e.clone()).await;
                Err(e)
            }
            Some(Ok(())) => Ok(()),
        }
    }

    async fn write(&self, text: String) -> Result<(), ClientError> {
        let mut guard = self.sink.lock().await;
        match guard.as_mut() {
            Some(sink) => sink.send_text(text).await,
            None => Err(ClientError::SendWhileNotOpen(self.state())),
        }
    }

    /// Send a close frame on whatever sink is left, bounded by
    /// [`CLOSE_TIMEOUT`].
    async fn close_sink(&self) -> Result<(), ClientError> {
        let Some(mut sink) = self.sink.lock().await.take() else {
            return Ok(());
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::TransportFrame("close frame timed out".into())),
        }
    }

    /// Drive the session to `Errored` and report `err`.
    async fn fail(&self, err: ClientError) {
        if self.transition(SessionState::Errored).is_ok() {
            error!(error = %err, kind = %err.kind(), "session failed");
            self.cancel.cancel();
            drop(self.sink.lock().await.take());
            self.emit(SessionEvent::Error(err));
        }
    }

    /// Acknowledge a server close frame.
    async fn close_from_server(&self) {
        if self.transition(SessionState::Closing).is_err() {
            return;
        }
        self.cancel.cancel();
        if let Err(e) = self.close_sink().await {
            debug!(error = %e, "close acknowledgement not sent");
        }
        if self.transition(SessionState::Closed).is_ok() {
            info!("session closed by server");
            self.emit(SessionEvent::Closed);
        }
    }
}

/// One client connection to the relay.
///
/// Dropping the session cancels its receive loop and heartbeat.
pub struct ClientSession {
    connector: Arc<dyn Connector>,
    heartbeat: Option<Duration>,
    shared: Arc<Shared>,
}

impl ClientSession {
    /// Create a disconnected session. Events arrive on the returned channel.
    ///
    /// `heartbeat` of `None` disables the emitter.
    pub fn new(
        connector: Arc<dyn Connector>,
        heartbeat: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionState::Disconnected);
        let session = Self {
            connector,
            heartbeat: heartbeat.filter(|p| !p.is_zero()),
            shared: Arc::new(Shared {
                state,
                sink: Mutex::new(None),
                events,
                cancel: CancellationToken::new(),
            }),
        };
        (session, rx)
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Connect to `uri`. Suspends until the upgrade completes or fails.
    ///
    /// Valid only from `Disconnected`. A failed upgrade leaves the session
    /// `Errored`; nothing is retried. A [`close`](Self::close) while the
    /// upgrade is pending abandons it and also ends in `Errored`.
    #[instrument(skip_all)]
    pub async fn connect(&self, uri: &str) -> Result<(), ClientError> {
        let _ = self.shared.transition(SessionState::Connecting)?;
        info!("connecting");

        let connected = tokio::select! {
            () = self.shared.cancelled() => Err(connect_cancelled()),
            connected = self.connector.connect(uri) => connected,
        };
        let (sink, stream) = match connected {
            Ok(transport) => transport,
            Err(e) => {
                self.shared.fail(e.clone()).await;
                return Err(e);
            }
        };

        // Publish the sink and the state together so a concurrent close
        // sees either neither or both.
        let mut guard = self.shared.sink.lock().await;
        let _ = self.shared.transition(SessionState::Open)?;
        *guard = Some(sink);
        drop(guard);
        info!("session open");
        self.shared.emit(SessionEvent::Opened);

        drop(tokio::spawn(receive_loop(self.shared.clone(), stream)));
        if let Some(period) = self.heartbeat {
            drop(spawn_heartbeat(period, self.shared.clone()));
        }
        Ok(())
    }

    /// Send `payload` as `{"action":"message","message":payload}`.
    pub async fn send_message(&self, payload: impl Into<String>) -> Result<(), ClientError> {
        let frame = MessageEnvelope::message(payload)
            .to_json()
            .map_err(|e| ClientError::Encode(e.to_string()))?;
        self.shared.send(frame).await
    }

    /// Send an already-encoded frame.
    pub async fn send_raw(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.shared.send(text.into()).await
    }

    /// Close the connection.
    ///
    /// From `Open` this sends a close frame and ends in `Closed`; a pending
    /// send is abandoned first. From `Connecting` it abandons the upgrade and
    /// ends in `Errored`. Any other state is an invalid transition.
    pub async fn close(&self) -> Result<(), ClientError> {
        if self.shared.state() == SessionState::Connecting {
            self.shared.cancel.cancel();
            self.shared.fail(connect_cancelled()).await;
            return Ok(());
        }
        let _ = self.shared.transition(SessionState::Closing)?;
        self.shared.cancel.cancel();
        match self.shared.close_sink().await {
            Ok(()) => {
                let _ = self.shared.transition(SessionState::Closed)?;
                info!("session closed");
                self.shared.emit(SessionEvent::Closed);
                Ok(())
            }
            Err(e) => {
                self.shared.fail(e.clone()).await;
                Err(e)
            }
        }
    }
}

fn connect_cancelled() -> ClientError {
    ClientError::TransportUpgrade("connect cancelled".into())
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

async fn receive_loop(shared: Arc<Shared>, mut stream: Box<dyn FrameStream>) {
    let mut assembler = FrameAssembler::new();
    loop {
        let next = tokio::select! {
            () = shared.cancelled() => break,
            next = stream.next_fragment() => next,
        };
        match next {
            Some(Ok(Fragment::Data { payload, fin })) => match assembler.push(&payload, fin) {
                Ok(Some(text)) => shared.emit(SessionEvent::Message(text)),
                Ok(None) => {}
                Err(e) => {
                    shared.fail(e).await;
                    break;
                }
            },
            Some(Ok(Fragment::Ping | Fragment::Pong)) => {}
            Some(Ok(Fragment::Close)) => {
                shared.close_from_server().await;
                break;
            }
            Some(Err(e)) => {
                shared.fail(e).await;
                break;
            }
            None => {
                warn!("transport ended without a close frame");
                shared
                    .fail(ClientError::TransportFrame("connection reset".into()))
                    .await;
                break;
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
