//! # Database Handle
//!
//! Opens the SQLite file that backs the remote cart and hands out
//! repositories over its pool.
//!
//! ## Who Talks To The Pool
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Remote Cart Database                               │
//! │                                                                         │
//! │  StorefrontConfig::db_config() ──► DbConfig { path, acquire_timeout }  │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                     Database::new ── open, pragmas, migrate             │
//! │                                          │                              │
//! │              ┌───────────────────────────┼────────────────────┐        │
//! │              ▼                           ▼                    ▼        │
//! │   SqlCartStore (engine)        other sessions of the     seed binary   │
//! │   one request at a time        same account               (products)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine has at most one request in flight. A request waiting for a
//! connection gives up after `acquire_timeout`, which
//! `StorefrontConfig::db_config` sets to the remote call timeout.
//!
//! WAL journaling lets one session read its cart while another writes.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::cart::CartRepository;
use crate::repository::product::ProductRepository;

/// Pool size for a file database. Covers the engine plus the seed binary
/// or a second session sharing the file.
const FILE_POOL_SIZE: u32 = 4;

// =============================================================================
// Configuration
// =============================================================================

/// Where the remote cart lives and how long to wait for a connection.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,

    /// Longest wait for a pooled connection. Default: 10 seconds.
    pub acquire_timeout: Duration,

    max_connections: u32,
}

impl DbConfig {
    /// A file database. The file is created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            acquire_timeout: Duration::from_secs(10),
            max_connections: FILE_POOL_SIZE,
        }
    }

    /// A private in-memory database.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool
    /// is pinned to one connection.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            acquire_timeout: Duration::from_secs(5),
            max_connections: 1,
        }
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the remote cart database. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the database and applies pending migrations.
    ///
    /// Foreign keys are switched on, so a cart row can only point at a
    /// product that exists.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening cart database");

        let options = if config.is_in_memory() {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        }
        .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout);
        if config.is_in_memory() {
            // Recycling the only connection would drop the database with it.
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };
        db.run_migrations().await?;

        info!(max_connections = config.max_connections, "Cart database ready");
        Ok(db)
    }

    /// Applies pending migrations. Already-applied ones are skipped.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Rows of `user_cart`, keyed by `(user_id, product_id)`.
    pub fn carts(&self) -> CartRepository {
        CartRepository::new(self.pool.clone())
    }

    /// Closes the pool. Later queries fail with a transient
    /// `DbError::ConnectionFailed`, which the remote store reports as
    /// unavailable.
    pub async fn close(&self) {
        info!("Closing cart database");
        self.pool.close().await;
    }

    /// Whether a trivial query still succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
