//! Storage layer for the Tabetti reputation core.
//!
//! This module provides database operations for:
//! - Accounts (role tag plus role-specific attachment)
//! - Stores
//! - Reviews and review likes
//! - Follow edges
//!
//! Every mutation that affects a customer's counters runs trust maintenance on
//! the same transaction before committing.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub mod accounts;
pub mod follows;
pub mod reviews;
pub mod stores;
pub mod types;

pub use types::*;
pub(crate) use types::{DbCustomer, DbReview};

/// How long a connection waits on another writer's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database storage for the reputation core.
///
/// Provides async access to SQLite database with connection pooling.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance with the given database URL.
    ///
    /// This will create the database file if it doesn't exist. Call
    /// [`Storage::run_migrations`] before use.
    ///
    /// # Arguments
    /// * `database_url` - SQLite database URL (e.g., "sqlite://tabetti.db")
    /// * `max_connections` - Pool ceiling (default 5)
    /// * `min_connections` - Pool floor (default 1)
    ///
    /// # Example
    /// ```no_run
    /// # use tabetti_reputation::storage::Storage;
    /// # async fn example() -> anyhow::Result<()> {
    /// let storage = Storage::new("sqlite://tabetti.db", None, None).await?;
    /// storage.run_migrations().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(
        database_url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.unwrap_or(5))
            .min_connections(min_connections.unwrap_or(1))
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Create a new storage instance with a specific file path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub async fn new_with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let database_url = format!("sqlite://{}", path.display());
        Self::new(&database_url, None, None).await
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Migrations completed successfully");

        Ok(())
    }

    /// Begin a write transaction.
    ///
    /// Uses `BEGIN IMMEDIATE` so the write lock is taken up front. A deferred
    /// transaction that reads before writing cannot upgrade its lock while
    /// another connection writes and fails with `SQLITE_BUSY` without waiting
    /// on the busy timeout.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .context("Failed to begin write transaction")
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection");
        self.pool.close().await;
    }

    /// Get database statistics.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        Ok(DatabaseStats {
            account_count: self.count_rows("accounts").await?,
            customer_count: self.count_rows("customers").await?,
            store_count: self.count_rows("stores").await?,
            review_count: self.count_rows("reviews").await?,
            follow_count: self.count_rows("follows").await?,
        })
    }

    async fn count_rows(&self, table: &'static str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", table))?;

        Ok(count as u64)
    }

    /// Check database health.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;

        Ok(())
    }
}

/// Database statistics.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DatabaseStats {
    /// Total number of accounts
    pub account_count: u64,

    /// Accounts holding the customer role
    pub customer_count: u64,

    /// Total number of stores
    pub store_count: u64,

    /// Total number of reviews
    pub review_count: u64,

    /// Total number of follow edges
    pub follow_count: u64,
}

/// Current unix time in seconds.
pub(crate) fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Storage;
    use tempfile::NamedTempFile;

    /// Fresh migrated database; keep the file handle alive for the test.
    pub(crate) async fn temp_storage() -> (NamedTempFile, Storage) {
        let temp_db = NamedTempFile::new().unwrap();
        let storage = Storage::new_with_path(temp_db.path()).await.unwrap();
        storage.run_migrations().await.unwrap();
        (temp_db, storage)
    }
}
