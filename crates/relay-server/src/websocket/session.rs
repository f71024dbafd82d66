//! `WebSocket` session lifecycle: one accepted connection from upgrade
//! through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use relay_core::ErrorFrame;
use relay_core::constants::BROADCAST_FAILED_MESSAGE;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use super::connection::ClientConnection;
use super::handler::{Route, route_frame};
use super::idle::{IdleLimits, IdleResult, run_idle_monitor};
use crate::metrics::{
    FRAMES_DROPPED_TOTAL, REGISTRY_ERRORS_TOTAL, WS_CONNECTION_DURATION_SECONDS,
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::server::AppState;

/// How long the writer gets to flush a close frame after the session ends.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    TransportError,
    Idle,
    MaxAge,
    Shutdown,
}

impl CloseReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
            Self::Idle => "idle",
            Self::MaxAge => "max_age",
            Self::Shutdown => "shutdown",
        }
    }
}

impl From<IdleResult> for CloseReason {
    fn from(r: IdleResult) -> Self {
        match r {
            IdleResult::Idle => Self::Idle,
            IdleResult::Expired => Self::MaxAge,
            IdleResult::Cancelled => Self::Shutdown,
        }
    }
}

/// Run a relayed session for an accepted, registered connection.
///
/// 1. Forwards queued outbound payloads to the socket
/// 2. Routes inbound frames: `message` to the dispatcher, `heartbeat` to
///    liveness only, everything else dropped
/// 3. Closes on client close, transport error, idle timeout, max age, or
///    shutdown
/// 4. Detaches from the hub and unregisters on the way out
#[instrument(skip_all, fields(conn_id = %connection.id))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection: Arc<ClientConnection>,
    mut send_rx: mpsc::Receiver<Arc<str>>,
    state: AppState,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let session_cancel = state.shutdown.child_token();

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Outbound forwarder. Sends a close frame once the session is cancelled.
    let outbound_cancel = session_cancel.clone();
    let mut outbound = tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_ref().into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_cancel.cancelled() => {
                    let frame = CloseFrame {
                        code: close_code::AWAY,
                        reason: "".into(),
                    };
                    let _ = ws_tx.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    });

    let limits = IdleLimits {
        idle_timeout: state.config.idle_timeout,
        max_age: state.config.max_connection_age,
        check_interval: state.config.idle_check_interval,
    };
    let idle = run_idle_monitor(connection.clone(), limits, session_cancel.clone());
    tokio::pin!(idle);

    let reason = loop {
        tokio::select! {
            result = &mut idle => break CloseReason::from(result),
            frame = ws_rx.next() => match frame {
                Some(Ok(msg)) => {
                    if handle_frame(msg, &connection, &state).await.is_break() {
                        break CloseReason::ClientClosed;
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "transport error");
                    break CloseReason::TransportError;
                }
                None => break CloseReason::ClientClosed,
            },
        }
    };

    // Clean up
    session_cancel.cancel();
    if tokio::time::timeout(CLOSE_GRACE, &mut outbound).await.is_err() {
        outbound.abort();
    }
    state.hub.detach(&connection.id).await;
    if let Err(e) = state.registry.unregister(&connection.id).await {
        counter!(REGISTRY_ERRORS_TOTAL, "kind" => e.kind().as_str()).increment(1);
        error!(error = %e, "failed to unregister connection on disconnect");
    }

    info!(reason = reason.as_str(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}

/// Handle one inbound frame. Breaks when the client closed.
async fn handle_frame(
    msg: Message,
    connection: &Arc<ClientConnection>,
    state: &AppState,
) -> std::ops::ControlFlow<()> {
    use std::ops::ControlFlow;

    let text = match msg {
        Message::Text(t) => t.as_str().to_owned(),
        Message::Binary(data) => match String::from_utf8(data.to_vec()) {
            Ok(s) => s,
            Err(_) => {
                connection.touch();
                debug!(len = data.len(), "dropping non-UTF8 binary frame");
                counter!(FRAMES_DROPPED_TOTAL).increment(1);
                return ControlFlow::Continue(());
            }
        },
        Message::Close(_) => {
            info!("client sent close frame");
            return ControlFlow::Break(());
        }
        Message::Ping(_) => {
            connection.touch();
            return ControlFlow::Continue(());
        }
        Message::Pong(_) => return ControlFlow::Continue(()),
    };

    connection.touch();
    match route_frame(&text) {
        Route::Broadcast(payload) => broadcast(connection, state, &payload).await,
        Route::Heartbeat => debug!("heartbeat"),
        Route::Drop(why) => {
            debug!(reason = why, "dropping frame");
            counter!(FRAMES_DROPPED_TOTAL).increment(1);
        }
    }
    ControlFlow::Continue(())
}

async fn broadcast(connection: &Arc<ClientConnection>, state: &AppState, payload: &str) {
    match state.dispatcher.broadcast(&connection.id, payload).await {
        Ok(outcome) => {
            for failure in &outcome.failures {
                debug!(recipient = %failure.connection_id, reason = %failure.reason, "recipient missed broadcast");
            }
        }
        Err(e) => {
            error!(error = %e, "broadcast failed");
            match serde_json::to_string(&ErrorFrame::new(BROADCAST_FAILED_MESSAGE)) {
                Ok(json) => {
                    if connection.send(Arc::from(json)).is_err() {
                        warn!("failed to enqueue error frame");
                    }
                }
                Err(e) => warn!(error = %e, "failed to encode error frame"),
            }
        }
    }
}
