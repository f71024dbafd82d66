//! Wire envelopes exchanged over the relay socket.
//!
//! Clients send [`MessageEnvelope`] frames (`{"action": ..., "message": ...}`).
//! The relay only looks at `action`; the `message` payload is forwarded to
//! recipients untouched. [`ApplicationMessage`] is the `{Type, Content}`
//! framing applications put inside that payload; the relay never parses it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors decoding or encoding an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The frame was not a valid envelope.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Route selector carried in every client frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Implicit on a successful upgrade; never valid inside a frame.
    #[serde(rename = "$connect")]
    Connect,
    /// Broadcast the payload to every other connection.
    Message,
    /// Liveness only; not broadcast.
    Heartbeat,
    /// Any route the relay does not know.
    #[serde(other)]
    Unknown,
}

impl Action {
    /// Route key as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "$connect",
            Self::Message => "message",
            Self::Heartbeat => "heartbeat",
            Self::Unknown => "unknown",
        }
    }
}

/// A client frame: `{ "action": "message" | "heartbeat", "message": <payload> }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Route selector.
    pub action: Action,
    /// Opaque payload. Strings are the common case; any JSON value is accepted.
    #[serde(default)]
    pub message: Option<Value>,
}

impl MessageEnvelope {
    /// Envelope carrying an application payload for broadcast.
    pub fn message(payload: impl Into<String>) -> Self {
        Self {
            action: Action::Message,
            message: Some(Value::String(payload.into())),
        }
    }

    /// Heartbeat envelope with an empty payload.
    pub fn heartbeat() -> Self {
        Self {
            action: Action::Heartbeat,
            message: Some(Value::String(String::new())),
        }
    }

    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The payload as it is delivered to recipients.
    ///
    /// String payloads are returned byte-for-byte; other JSON values are
    /// rendered as compact JSON text; a missing or null payload is empty.
    pub fn payload(&self) -> String {
        match &self.message {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Application-level framing inside a payload: `{ "Type": ..., "Content": ... }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMessage {
    /// Application-defined message type.
    #[serde(rename = "Type")]
    pub kind: String,
    /// Opaque content.
    #[serde(rename = "Content")]
    pub content: String,
}

impl ApplicationMessage {
    /// Create a new application message.
    pub fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
        }
    }
}

/// Generic server error sent back to the originator of a failed operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    /// Human-readable error.
    pub error: String,
}

impl ErrorFrame {
    /// Create an error frame.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
