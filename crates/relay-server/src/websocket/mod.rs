//! `WebSocket` connection management, idle reclaim, routing, and broadcasting.

pub mod connection;
pub mod dispatcher;
pub mod handler;
pub mod hub;
pub mod idle;
pub mod session;
pub mod upgrade;
