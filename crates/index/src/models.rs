//! Row types returned by [`crate::Repository`].
//!
//! These are plain data-access rows, not domain objects — `serac-core`
//! owns the domain entities (`Archived`, `File`) and converts to/from these
//! via `TryFrom`, keeping row shape and domain shape free to diverge.

/// A row from the `archived` table (§3 `Archived`).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArchivedRow {
    pub id: i64,
    pub hash: String,
    pub size: i64,
}

/// A row from the `file` table (§3 `File`), joined with its `archived` row
/// so a caller never has to issue a second query to look up the
/// content hash/size.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileRow {
    pub id: i64,
    pub path: String,
    pub archived_id: i64,
    pub archived_hash: String,
    pub archived_size: i64,
    pub action: i64,
    pub last_modified: i64,
    pub owner: i64,
    pub group_id: i64,
    pub permissions: i64,
}
