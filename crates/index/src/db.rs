//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations, run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// The index is written by exactly one process at a time (§5), so there's
/// no benefit to a large pool; a handful of connections is enough to let
/// reads (`ls`, `restore`) overlap without serializing on a single handle.
const MAX_CONNECTIONS: u32 = 5;

/// SQLite-backed append-only index of file events and archived-blob records.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Creates a new index database at `path`. Fails if a file already
    /// exists there; callers (the CLI's `init` command) are expected to
    /// check this first so they can report a friendlier message, but this
    /// is also enforced here since it's cheap and prevents clobbering.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::new(options, None).await
    }

    /// Opens an existing index database at `path`. Fails with
    /// [`ErrorKind::DatabaseMissing`] if no file exists there (§4.3).
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.or_raise(|| ErrorKind::Database)? {
            exn::bail!(ErrorKind::DatabaseMissing);
        }
        let options = Self::base_options().filename(path).create_if_missing(false);
        Self::new(options, None).await
    }

    /// Opens an in-memory database. Useful for tests; not gated behind
    /// `#[cfg(test)]` so other crates in the workspace can use it too.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // A shared in-memory database needs either `.shared_cache(true)` or a
        // single connection, otherwise each pooled connection sees its own
        // private database.
        Self::new(options, Some(1)).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query("PRAGMA temp_store = MEMORY; PRAGMA cache_size = -8192;").execute(conn).await?;
        Ok(())
    }

    #[instrument("performing index migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Returns a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the connection pool, waiting for in-flight connections to
    /// return first.
    pub async fn disconnect(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_in_memory_runs_migrations() {
        let db = Database::connect_in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM archived").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 0);
        db.disconnect().await;
    }

    #[tokio::test]
    async fn connect_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Database::connect(dir.path().join("missing.sqlite")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::DatabaseMissing));
    }

    #[tokio::test]
    async fn create_then_connect_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.sqlite");
        let db = Database::create(&path).await.unwrap();
        db.disconnect().await;
        let db = Database::connect(&path).await.unwrap();
        db.disconnect().await;
    }
}
