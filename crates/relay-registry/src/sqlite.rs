//! `SQLite`-backed store.
//!
//! Uses an `r2d2` pool with the `r2d2_sqlite` backend. A pragma customizer
//! enables WAL mode and a busy timeout on every new connection. Queries run
//! on the blocking thread pool.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use relay_core::ConnectionId;
use rusqlite::{Connection, params};

use crate::errors::Result;
use crate::record::ConnectionRecord;
use crate::store::ConnectionStore;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS connections (
    connection_id TEXT PRIMARY KEY NOT NULL,
    expiry_time   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_connections_expiry ON connections (expiry_time);";

/// Configuration for the connection pool.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum pool size (default: 8).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 5000).
    pub busy_timeout_ms: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))
    }
}

/// Connection store persisted in a `connections` table.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl SqliteStore {
    /// Open (creating if needed) a database file.
    pub fn open(path: &Path, config: &PoolConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| crate::RegistryError::Unavailable(e.to_string()))?;
            }
        }
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_secs(5))
            .connection_customizer(Box::new(PragmaCustomizer {
                busy_timeout_ms: config.busy_timeout_ms,
            }))
            .build(SqliteConnectionManager::file(path))?;
        Self::from_pool(pool)
    }

    /// In-memory database, for tests.
    ///
    /// Every `SQLite` memory connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub fn in_memory() -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(Duration::from_secs(5))
            .build(SqliteConnectionManager::memory())?;
        Self::from_pool(pool)
    }

    /// Wrap an existing pool, creating the schema if it is missing.
    pub fn from_pool(pool: ConnectionPool) -> Result<Self> {
        let conn = pool.get()?;
        conn.execute_batch(SCHEMA)?;
        drop(conn);
        Ok(Self { pool })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl ConnectionStore for SqliteStore {
    async fn put(&self, record: ConnectionRecord) -> Result<()> {
        self.with_conn(move |conn| {
            let _ = conn.execute(
                "INSERT OR REPLACE INTO connections (connection_id, expiry_time) VALUES (?1, ?2)",
                params![record.connection_id.as_str(), record.expiry_time],
            )?;
            Ok(())
        })
        .await
    }

    async fn scan(&self, as_of: i64) -> Result<Vec<ConnectionRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT connection_id, expiry_time FROM connections \
                 WHERE expiry_time > ?1 ORDER BY connection_id",
            )?;
            let rows = stmt.query_map(params![as_of], |row| {
                Ok(ConnectionRecord::new(
                    ConnectionId::from(row.get::<_, String>(0)?),
                    row.get(1)?,
                ))
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn delete(&self, connection_id: &ConnectionId) -> Result<bool> {
        let id = connection_id.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "DELETE FROM connections WHERE connection_id = ?1",
                params![id.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn purge_expired(&self, now: i64) -> Result<usize> {
        self.with_conn(move |conn| {
            Ok(conn.execute(
                "DELETE FROM connections WHERE expiry_time <= ?1",
                params![now],
            )?)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
