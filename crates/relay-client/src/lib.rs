//! # relay-client
//!
//! Client side of the presence relay.
//!
//! - [`ClientSession`]: one outbound connection, driven through
//!   [`SessionState`] by a single owner, with events delivered on a channel
//! - Heartbeat emitter: fixed-period liveness frames while the session is open
//! - [`Connector`] / [`FrameSink`] / [`FrameStream`]: the transport seam,
//!   with [`WsConnector`] over `tokio-tungstenite`
//! - [`FrameAssembler`]: reassembles partial reads into whole messages
//! - [`ConnectUri`]: connect URI with the verification query parameters

#![deny(unsafe_code)]

pub mod assembler;
pub mod errors;
mod heartbeat;
pub mod session;
pub mod state;
pub mod transport;
pub mod uri;
pub mod ws;

pub use assembler::FrameAssembler;
pub use errors::ClientError;
pub use session::{ClientSession, SessionEvent};
pub use state::SessionState;
pub use transport::{Connector, Fragment, FrameSink, FrameStream, Transport};
pub use uri::ConnectUri;
pub use ws::WsConnector;
