//! Registry error types.

use relay_core::ErrorKind;
use thiserror::Error;

/// Errors surfaced by the registry and its stores.
///
/// Stores return the raw backend variants (`Pool`, `Sqlite`, `Join`,
/// `Unavailable`); [`ConnectionRegistry`](crate::ConnectionRegistry)
/// normalizes them into `Write`, `Scan` or `Delete` depending on which
/// operation failed.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Insert failed.
    #[error("registry write failed: {0}")]
    Write(String),
    /// Scan failed.
    #[error("registry scan failed: {0}")]
    Scan(String),
    /// Delete failed.
    #[error("registry delete failed: {0}")]
    Delete(String),
    /// Could not check out a database connection.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    /// `SQLite` returned an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// The store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl RegistryError {
    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Scan(_) => ErrorKind::RegistryScanFailure,
            _ => ErrorKind::RegistryWriteFailure,
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
