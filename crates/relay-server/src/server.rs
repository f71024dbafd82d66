//! `RelayServer`: Axum HTTP + `WebSocket` gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_auth::AuthorizationGate;
use relay_registry::ConnectionRegistry;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::dispatcher::BroadcastDispatcher;
use crate::websocket::hub::ConnectionHub;
use crate::websocket::upgrade::ws_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Connect-time authorization.
    pub gate: Arc<AuthorizationGate>,
    /// Durable connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Connections attached to this process.
    pub hub: Arc<ConnectionHub>,
    /// Fan-out for `message` frames.
    pub dispatcher: Arc<BroadcastDispatcher>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, if a recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The relay server.
pub struct RelayServer {
    state: AppState,
}

impl RelayServer {
    /// Create a server delivering through a local [`ConnectionHub`].
    pub fn new(
        config: ServerConfig,
        gate: Arc<AuthorizationGate>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        let hub = Arc::new(ConnectionHub::new());
        let dispatcher = Arc::new(BroadcastDispatcher::new(
            registry.clone(),
            hub.clone(),
            config.fanout_concurrency,
        ));
        Self {
            state: AppState {
                config: Arc::new(config),
                gate,
                registry,
                hub,
                dispatcher,
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                metrics: None,
            },
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind and serve until the shutdown token fires.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.state.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let token = self.state.shutdown.token();
        let app = self.router();

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server terminated");
            }
        });
        info!(%addr, "relay listening");
        Ok((addr, handle))
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the connection hub.
    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.state.hub
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.state.registry
    }

    /// Get the broadcast dispatcher.
    pub fn dispatcher(&self) -> &Arc<BroadcastDispatcher> {
        &self.state.dispatcher
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.hub.connection_count().await;
    let registered = match state.registry.list_active().await {
        Ok(ids) => Some(ids.len()),
        Err(e) => {
            warn!(error = %e, "health check could not scan registry");
            None
        }
    };
    Json(health::health_check(state.start_time, connections, registered))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
