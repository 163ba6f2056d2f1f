//! Database Module
//!
//! SQLite connection pool, embedded migrations and the repository functions.
//! Repositories are free async fns over any sqlx executor so the same query
//! runs against the pool or inside a caller's transaction.

pub mod catalog;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod reservations;
pub mod users;
pub mod webhook_events;

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Database service owning the SQLite connection pool
#[derive(Clone)]
pub struct DbService {
    pub pool: SqlitePool,
}

impl DbService {
    /// Open (creating if missing) and migrate the database at `url`.
    ///
    /// `sqlite::memory:` gets a single pinned connection, otherwise every
    /// pooled connection would see its own empty database.
    pub async fn connect(url: &str) -> RepoResult<Self> {
        let in_memory = url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .optimize_on_close(true, None);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        tracing::info!(in_memory, "Database connection established");

        MIGRATOR.run(&pool).await?;
        tracing::info!("Database migrations applied");

        Ok(Self { pool })
    }
}

/// Liveness check
pub async fn ping(pool: &SqlitePool) -> RepoResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Fresh migrated in-memory pool for tests
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    DbService::connect("sqlite::memory:").await.unwrap().pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_database_is_created_and_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("orders.db").display());

        let db = DbService::connect(&url).await.unwrap();
        ping(&db.pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'notifications'",
        )
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let pool = test_pool().await;
        let result = sqlx::query(
            "INSERT INTO orders (id, user_id, delivery_location, created_at, updated_at) VALUES (1, 999, 'x', 0, 0)",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
