//! Append-only repository over the `archived` and `file` tables (§3, §4.3).
//!
//! Every write here is a bare `INSERT`; the one exception is
//! [`Repository::mark_archived_poisoned`], which blanks `hash` on a row
//! that is already known to be a failed upload (§3 "poison tombstone").
//! Nothing is ever deleted.

use crate::error::{ErrorKind, Result};
use crate::models::{ArchivedRow, FileRow};
use crate::Database;
use exn::ResultExt;
use sqlx::SqlitePool;

#[derive(Debug, sqlx::FromRow)]
struct InsertedFileRow {
    id: i64,
    path: String,
    archived_id: i64,
    action: i64,
    last_modified: i64,
    owner: i64,
    group_id: i64,
    permissions: i64,
}

/// Data-access layer over the index database.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a new `archived` row. The row is persisted before the
    /// corresponding upload begins (§4.4 step 2), so its `id` is available
    /// to use as the storage backend's object key immediately.
    pub async fn insert_archived(&self, hash: &str, size: u64) -> Result<ArchivedRow> {
        let size = i64::try_from(size).or_raise(|| ErrorKind::InvalidData("archived size"))?;
        sqlx::query_as(include_str!("../queries/insert_archived.sql"))
            .bind(hash)
            .bind(size)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Blanks the `hash` on an `archived` row to mark it as a poison
    /// tombstone (§3, §4.4 step 5). The row's `id` is never reused.
    pub async fn mark_archived_poisoned(&self, id: u64) -> Result<()> {
        let id = i64::try_from(id).or_raise(|| ErrorKind::InvalidData("archived id"))?;
        sqlx::query(include_str!("../queries/mark_archived_poisoned.sql"))
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Looks up an `archived` row by id.
    pub async fn archived_by_id(&self, id: u64) -> Result<Option<ArchivedRow>> {
        let id = i64::try_from(id).or_raise(|| ErrorKind::InvalidData("archived id"))?;
        sqlx::query_as(include_str!("../queries/archived_by_id.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Looks up a non-poisoned `archived` row by content hash, used during
    /// diff/commit to detect whether this content is already known
    /// (§4.6/§4.7).
    pub async fn archived_by_hash(&self, hash: &str) -> Result<Option<ArchivedRow>> {
        sqlx::query_as(include_str!("../queries/archived_by_hash.sql"))
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Appends a new `file` row (§3 "never updated or deleted"). `archived`
    /// is the row this event references; its hash/size are folded into the
    /// returned [`FileRow`] without a second query.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_file(
        &self,
        path: &str,
        archived: &ArchivedRow,
        action: i64,
        last_modified: i64,
        owner: u32,
        group: u32,
        permissions: u32,
    ) -> Result<FileRow> {
        let owner = i64::from(owner);
        let group = i64::from(group);
        let permissions = i64::from(permissions);
        let inserted: InsertedFileRow = sqlx::query_as(include_str!("../queries/insert_file.sql"))
            .bind(path)
            .bind(archived.id)
            .bind(action)
            .bind(last_modified)
            .bind(owner)
            .bind(group)
            .bind(permissions)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(FileRow {
            id: inserted.id,
            path: inserted.path,
            archived_id: inserted.archived_id,
            archived_hash: archived.hash.clone(),
            archived_size: archived.size,
            action: inserted.action,
            last_modified: inserted.last_modified,
            owner: inserted.owner,
            group_id: inserted.group_id,
            permissions: inserted.permissions,
        })
    }

    /// Reconstructs the live set of files at `timestamp` (§4.5): per path,
    /// the latest row with `last_modified <= timestamp`, excluding any
    /// path whose latest row is a `DELETE`.
    pub async fn state_at(&self, timestamp: i64) -> Result<Vec<FileRow>> {
        sqlx::query_as(include_str!("../queries/state_at.sql"))
            .bind(timestamp)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }
}
