//! SQLite connection and schema management.
//!
//! File databases run in WAL mode with a busy timeout so the query command
//! can read while a load is writing. The schema lives in `migrations/` and
//! is embedded at compile time.
//!
//! # Example
//!
//! ```no_run
//! use pokedex_core::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("data/pokedex.db")).await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, instrument};

/// Loads are a single writer, so a small pool is enough.
const MAX_CONNECTIONS: u32 = 4;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DbError {
    #[error("failed to open database: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("failed to apply schema: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Pooled SQLite connection with the creature schema applied.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `db_path` and migrates it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be opened or the schema
    /// cannot be applied.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        Self::migrated(pool).await
    }

    /// Private in-memory database on a single connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the schema cannot be applied.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // every connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, DbError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("schema up to date");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
