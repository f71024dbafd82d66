//! `GET /ws`: the connect handshake.
//!
//! Authorization runs before the upgrade is considered at all, so a bad or
//! missing token always answers 401, even for plain HTTP requests. On Allow
//! the connection is attached locally and registered before the socket is
//! upgraded.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use relay_auth::{AuthContext, Verdict};
use relay_core::ConnectionId;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::connection::ClientConnection;
use super::session::run_ws_session;
use crate::metrics::{AUTH_DENIED_TOTAL, REGISTRY_ERRORS_TOTAL};
use crate::server::AppState;

/// Body of the 401 answer.
pub const UNAUTHORIZED_BODY: &str = "Unauthorized.";
/// Body of the 500 answer when registration fails.
pub const REGISTER_FAILED_BODY: &str = "Error storing connectionId";

/// Connect query parameters. Missing values are treated as empty.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Bearer token.
    #[serde(rename = "Authorization", default)]
    pub authorization: Option<String>,
    /// Client id the token must be issued to.
    #[serde(rename = "clientId", default)]
    pub client_id: Option<String>,
    /// Issuer id the token must come from.
    #[serde(rename = "userPoolId", default)]
    pub user_pool_id: Option<String>,
}

impl ConnectParams {
    fn into_context(self) -> AuthContext {
        AuthContext::new(
            self.authorization.unwrap_or_default(),
            self.user_pool_id.unwrap_or_default(),
            self.client_id.unwrap_or_default(),
        )
    }
}

/// Axum handler for `GET /ws`.
pub async fn ws_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    let ctx = params.into_context();
    let principal = match state.gate.authorize(&ctx).await {
        Verdict::Allow(principal) => principal,
        Verdict::Deny(reason) => {
            counter!(AUTH_DENIED_TOTAL).increment(1);
            info!(reason = %reason, "connect denied");
            return (StatusCode::UNAUTHORIZED, UNAUTHORIZED_BODY).into_response();
        }
    };

    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let connection_id = ConnectionId::generate();
    let (tx, rx) = mpsc::channel::<Arc<str>>(state.config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), tx));
    state.hub.attach(connection.clone()).await;

    if let Err(e) = state.registry.register(&connection_id).await {
        counter!(REGISTRY_ERRORS_TOTAL, "kind" => e.kind().as_str()).increment(1);
        error!(conn_id = %connection_id, error = %e, "failed to register connection");
        state.hub.detach(&connection_id).await;
        return (StatusCode::INTERNAL_SERVER_ERROR, REGISTER_FAILED_BODY).into_response();
    }
    info!(conn_id = %connection_id, subject = %principal.subject, "connection registered");

    // Held until the session ends so a drain outlasts its unregister.
    let tracked = state.shutdown.track_session();
    let failed_state = state.clone();
    let failed_id = connection_id.clone();
    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(move |e| {
            warn!(conn_id = %failed_id, error = %e, "upgrade failed after registration");
            let shutdown = failed_state.shutdown.clone();
            drop(shutdown.spawn_tracked(async move {
                failed_state.hub.detach(&failed_id).await;
                if let Err(e) = failed_state.registry.unregister(&failed_id).await {
                    error!(conn_id = %failed_id, error = %e, "failed to unregister after upgrade failure");
                }
            }));
        })
        .on_upgrade(move |socket| async move {
            run_ws_session(socket, connection, rx, state).await;
            drop(tracked);
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_params_build_empty_context() {
        let ctx = ConnectParams::default().into_context();
        assert_eq!(ctx.bearer(), "");
        assert_eq!(ctx.expected_issuer_id, "");
        assert_eq!(ctx.expected_client_id, "");
    }

    #[test]
    fn params_map_to_issuer_and_client() {
        let params: ConnectParams = serde_json::from_str(
            r#"{"Authorization":"Bearer abc","clientId":"c1","userPoolId":"pool-1"}"#,
        )
        .unwrap();
        let ctx = params.into_context();
        assert_eq!(ctx.bearer(), "abc");
        assert_eq!(ctx.expected_issuer_id, "pool-1");
        assert_eq!(ctx.expected_client_id, "c1");
    }
}
