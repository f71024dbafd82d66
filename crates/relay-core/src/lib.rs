//! # relay-core
//!
//! Foundation types shared by every relay crate:
//!
//! - **Connection ids**: [`ConnectionId`], assigned when a transport upgrade is accepted
//! - **Wire envelopes**: [`MessageEnvelope`] (`{action, message}`), [`ApplicationMessage`]
//!   (`{Type, Content}`), and the [`Action`] routing key
//! - **Errors**: [`ErrorKind`], the shared failure taxonomy every crate error maps onto
//! - **Clock**: [`Clock`] with a system and a manual implementation
//! - **Logging**: [`logging::init_subscriber`]

#![deny(unsafe_code)]

pub mod clock;
pub mod constants;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;

pub use clock::{Clock, ManualClock, SystemClock};
pub use envelope::{Action, ApplicationMessage, EnvelopeError, ErrorFrame, MessageEnvelope};
pub use errors::ErrorKind;
pub use ids::ConnectionId;
