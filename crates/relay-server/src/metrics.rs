//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup
/// before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Connections upgraded (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "relay_ws_connections_total";
/// Connections closed (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "relay_ws_disconnections_total";
/// Connections currently attached (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "relay_ws_connections_active";
/// Connection lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "relay_ws_connection_duration_seconds";
/// Connect attempts denied by the gate (counter).
pub const AUTH_DENIED_TOTAL: &str = "relay_auth_denied_total";
/// Registry failures (counter, labels: kind).
pub const REGISTRY_ERRORS_TOTAL: &str = "relay_registry_errors_total";
/// Broadcasts dispatched (counter).
pub const BROADCASTS_TOTAL: &str = "relay_broadcasts_total";
/// Unicasts delivered (counter).
pub const DELIVERIES_TOTAL: &str = "relay_deliveries_total";
/// Stale recipients evicted (counter).
pub const PRUNED_TOTAL: &str = "relay_pruned_total";
/// Unicasts failed for reasons other than staleness (counter).
pub const DELIVERY_ERRORS_TOTAL: &str = "relay_delivery_errors_total";
/// Broadcast fan-out duration (histogram).
pub const BROADCAST_DURATION_SECONDS: &str = "relay_broadcast_duration_seconds";
/// Inbound frames dropped as malformed or unroutable (counter).
pub const FRAMES_DROPPED_TOTAL: &str = "relay_frames_dropped_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_names_are_prefixed_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            AUTH_DENIED_TOTAL,
            REGISTRY_ERRORS_TOTAL,
            BROADCASTS_TOTAL,
            DELIVERIES_TOTAL,
            PRUNED_TOTAL,
            DELIVERY_ERRORS_TOTAL,
            BROADCAST_DURATION_SECONDS,
            FRAMES_DROPPED_TOTAL,
        ];
        for name in names {
            assert!(name.starts_with("relay_"), "{name}");
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{name}"
            );
        }
    }
}
