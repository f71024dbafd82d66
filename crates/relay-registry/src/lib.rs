//! # relay-registry
//!
//! The set of live connection ids, each stored as a [`ConnectionRecord`]
//! with an absolute expiry.
//!
//! - [`ConnectionRegistry`]: `register`, `unregister`, `list_active`
//! - [`ConnectionStore`]: the key-value-with-TTL collaborator, implemented by
//!   [`MemoryStore`] and [`SqliteStore`]
//! - [`sweeper::spawn_expiry_sweeper`]: background purge of expired records

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod record;
pub mod registry;
pub mod sqlite;
pub mod store;
pub mod sweeper;

pub use errors::{RegistryError, Result};
pub use memory::MemoryStore;
pub use record::ConnectionRecord;
pub use registry::ConnectionRegistry;
pub use sqlite::SqliteStore;
pub use store::ConnectionStore;
pub use sweeper::spawn_expiry_sweeper;
