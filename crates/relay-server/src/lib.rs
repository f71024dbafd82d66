//! # relay-server
//!
//! Axum HTTP + `WebSocket` gateway for the presence relay.
//!
//! - `GET /ws`: authorization gate, registration, then a relayed session
//! - [`websocket::hub::ConnectionHub`]: connections attached to this
//!   process, exposed to the dispatcher through the
//!   [`websocket::hub::Unicast`] trait
//! - [`websocket::dispatcher::BroadcastDispatcher`]: fan-out to every
//!   registered connection except the sender, evicting stale recipients
//! - Idle reclaim and maximum connection age per session
//! - `GET /health`, `GET /metrics`, graceful shutdown

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::DeliveryError;
pub use server::{AppState, RelayServer};
pub use websocket::dispatcher::{BroadcastDispatcher, BroadcastOutcome, DeliveryFailure};
pub use websocket::hub::{ConnectionHub, Unicast};
