//! Transport seam between a session and the wire.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::ClientError;

/// One read from the transport. Data may arrive in several partial reads;
/// `fin` marks the last one of a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    /// Part (or all) of a data message.
    Data {
        /// Bytes of this part.
        payload: Bytes,
        /// Last part of the message.
        fin: bool,
    },
    /// Ping from the server.
    Ping,
    /// Pong from the server.
    Pong,
    /// Server close frame.
    Close,
}

impl Fragment {
    /// A whole message in one read.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Data {
            payload: Bytes::from(text.into()),
            fin: true,
        }
    }
}

/// Write half of a connection. One writer at a time.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), ClientError>;

    /// Start or acknowledge the close handshake.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Read half of a connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Next read, or `None` once the transport is gone.
    async fn next_fragment(&mut self) -> Option<Result<Fragment, ClientError>>;
}

/// Both halves of an upgraded connection.
pub type Transport = (Box<dyn FrameSink>, Box<dyn FrameStream>);

/// Performs the transport upgrade.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `uri`.
    async fn connect(&self, uri: &str) -> Result<Transport, ClientError>;
}
