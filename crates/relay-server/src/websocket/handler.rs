//! Inbound frame routing.

use relay_core::{Action, MessageEnvelope};

/// Where an inbound text frame goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Fan the payload out to every other connection.
    Broadcast(String),
    /// Liveness only.
    Heartbeat,
    /// Dropped without reaching the dispatcher.
    Drop(&'static str),
}

/// Route one text frame by its `action`.
///
/// The payload is extracted untouched: string payloads verbatim, other JSON
/// values as compact JSON text.
pub fn route_frame(text: &str) -> Route {
    match MessageEnvelope::parse(text) {
        Ok(envelope) => match envelope.action {
            Action::Message => Route::Broadcast(envelope.payload()),
            Action::Heartbeat => Route::Heartbeat,
            Action::Connect | Action::Unknown => Route::Drop("unknown action"),
        },
        Err(_) => Route::Drop("malformed frame"),
    }
}
