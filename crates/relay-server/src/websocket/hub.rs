//! Connections attached to this process and the unicast primitive.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::ConnectionId;
use tokio::sync::RwLock;
use tracing::debug;

use super::connection::ClientConnection;
use crate::errors::DeliveryError;

/// Per-connection send primitive used by the dispatcher.
///
/// Given a connection id and a payload, attempt delivery and report
/// whether the target is gone.
#[async_trait]
pub trait Unicast: Send + Sync {
    /// Deliver `payload` to `connection_id`.
    async fn post(&self, connection_id: &ConnectionId, payload: Arc<str>)
    -> Result<(), DeliveryError>;
}

/// Local index of live connections by id.
pub struct ConnectionHub {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Attach a connection, replacing any previous one with the same id.
    pub async fn attach(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Detach a connection. Detaching an unknown id is a no-op.
    pub async fn detach(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
    }

    /// Look up an attached connection.
    pub async fn get(&self, connection_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().await.get(connection_id).cloned()
    }

    /// Number of attached connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Unicast for ConnectionHub {
    async fn post(
        &self,
        connection_id: &ConnectionId,
        payload: Arc<str>,
    ) -> Result<(), DeliveryError> {
        let Some(conn) = self.get(connection_id).await else {
            debug!(conn_id = %connection_id, "unicast target not attached");
            return Err(DeliveryError::Gone);
        };
        conn.send(payload)
    }
}
