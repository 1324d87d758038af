//! The two domain entities: [`Archived`] (an uploaded, content-addressed
//! blob) and [`File`] (one row in the append-only event log) (§3, §4).
//!
//! `serac-index` owns the SQL row shapes ([`serac_index::ArchivedRow`],
//! [`serac_index::FileRow`]); this module owns the domain types and the
//! `TryFrom` conversions between the two, keeping row shape and domain
//! shape free to diverge.

use crate::error::{Error, ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use serac_index::{ArchivedRow, FileRow};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Block size used when streaming a file through the hasher (§4.4).
const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// An uploaded, content-addressed blob (§3). `hash` is empty for a poison
/// tombstone: an `archived` row whose upload failed and will never be
/// retried under this id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archived {
    pub id: u64,
    pub hash: String,
    pub size: u64,
}

impl Archived {
    /// `true` if this row is a poison tombstone (§3).
    pub fn is_poisoned(&self) -> bool {
        self.hash.is_empty()
    }
}

impl From<ArchivedRow> for Archived {
    fn from(row: ArchivedRow) -> Self {
        Self { id: row.id as u64, hash: row.hash, size: row.size as u64 }
    }
}

/// The action recorded by one `file` row (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The path did not exist in the prior state.
    Add,
    /// The path existed, and its content hash changed.
    Content,
    /// The path existed, content is unchanged, but owner/group/permissions
    /// or `last_modified` changed.
    Metadata,
    /// The path existed in the prior state and no longer does.
    Delete,
}

impl Action {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Add => 1,
            Self::Content => 2,
            Self::Metadata => 3,
            Self::Delete => 4,
        }
    }

    pub fn from_i64(value: i64) -> Result<Self> {
        match value {
            1 => Ok(Self::Add),
            2 => Ok(Self::Content),
            3 => Ok(Self::Metadata),
            4 => Ok(Self::Delete),
            other => Err(Error::from(ErrorKind::InvalidAction(other))),
        }
    }
}

/// One row in the append-only `file` event log (§3, §4.4).
///
/// Equality is metadata-only (§4.4): two `File`s compare equal iff their
/// `path`, `last_modified`, `owner`, `group` and `permissions` match. `id`,
/// `action` and `archived` (and therefore content) are deliberately excluded
/// — this is exactly the comparison the scanner uses to decide "nothing
/// changed" before it ever has to hash anything.
#[derive(Debug, Clone)]
pub struct File {
    pub id: Option<u64>,
    pub path: PathBuf,
    pub archived: Option<Archived>,
    pub action: Action,
    pub last_modified: i64,
    pub owner: u32,
    pub group: u32,
    pub permissions: u32,
    cached_hash: Option<String>,
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.last_modified == other.last_modified
            && self.owner == other.owner
            && self.group == other.group
            && self.permissions == other.permissions
    }
}
impl Eq for File {}

impl File {
    /// A transient `File` for `path`, not yet backed by any database row or
    /// disk metadata. Callers must call [`File::refresh_metadata_from_disk`]
    /// before relying on `last_modified`/`owner`/`group`/`permissions`.
    pub fn new(path: PathBuf) -> Self {
        Self {
            id: None,
            path,
            archived: None,
            action: Action::Add,
            last_modified: 0,
            owner: 0,
            group: 0,
            permissions: 0,
            cached_hash: None,
        }
    }

    /// Re-reads `owner`/`group`/`permissions`/`last_modified` from disk
    /// (§4.4, §4.6). Symlinks are followed (the platform default of `stat`).
    ///
    /// Fails with [`ErrorKind::NotFound`] if the path does not exist, or
    /// [`ErrorKind::NotAFile`] if it exists but isn't a regular file.
    pub fn refresh_metadata_from_disk(&mut self) -> Result<()> {
        use std::os::unix::fs::MetadataExt;

        let metadata = std::fs::metadata(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::from(ErrorKind::NotFound)
            } else {
                Error::from(ErrorKind::Io)
            }
        })?;
        if !metadata.is_file() {
            return Err(Error::from(ErrorKind::NotAFile));
        }

        self.last_modified = metadata.mtime();
        self.owner = metadata.uid();
        self.group = metadata.gid();
        self.permissions = metadata.mode();
        Ok(())
    }

    /// Streams the file through SHA-256, in `HASH_BLOCK_SIZE` chunks,
    /// memoizing the result (§4.4: "computed lazily, at most once per scan").
    pub fn calculate_hash(&mut self) -> Result<String> {
        if let Some(hash) = &self.cached_hash {
            return Ok(hash.clone());
        }
        let mut file = std::fs::File::open(&self.path).or_raise(|| ErrorKind::Io)?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_BLOCK_SIZE];
        loop {
            let n = file.read(&mut buf).or_raise(|| ErrorKind::Io)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let hash = format!("{:x}", hasher.finalize());
        self.cached_hash = Some(hash.clone());
        Ok(hash)
    }

    /// Uploads this file's content and appends the resulting `file` row
    /// (§4.4 steps 2-5, ADD/CONTENT only; METADATA/DELETE never call this
    /// since they carry a prior `archived` row forward instead).
    ///
    /// Content is deduplicated by hash across distinct paths (§1, §3): if a
    /// non-poisoned `archived` row already exists for this content's hash,
    /// it is reused and no upload happens at all — "at most one `archived`
    /// row has a given hash non-empty" (§3) only holds if this check runs
    /// before a new row is ever created.
    ///
    /// On upload failure the freshly-inserted `archived` row is poisoned and
    /// this returns [`ErrorKind::ArchiveFailed`] with the storage error
    /// chained on as its source; the caller decides whether that failure
    /// aborts the whole commit or is merely recorded against this one file.
    pub async fn archive(
        &mut self,
        storage: &dyn serac_storage::StorageBackend,
        index: &serac_index::Repository,
        password: &str,
    ) -> Result<()> {
        if self.id.is_some() {
            return Err(Error::from(ErrorKind::AlreadyArchived));
        }

        let hash = self.calculate_hash()?;

        if let Some(existing) = index.archived_by_hash(&hash).await.or_raise(|| ErrorKind::Index)? {
            let file_row = index
                .insert_file(
                    path_to_str(&self.path)?,
                    &existing,
                    self.action.as_i64(),
                    self.last_modified,
                    self.owner,
                    self.group,
                    self.permissions,
                )
                .await
                .or_raise(|| ErrorKind::Index)?;
            self.id = Some(file_row.id as u64);
            self.archived = Some(Archived::from(existing));
            return Ok(());
        }

        let size = std::fs::metadata(&self.path).or_raise(|| ErrorKind::Io)?.len();
        let archived_row = index.insert_archived(&hash, size).await.or_raise(|| ErrorKind::Index)?;

        match storage.store(&self.path, &archived_row.id.to_string(), password).await {
            Ok(()) => {
                let file_row = index
                    .insert_file(
                        path_to_str(&self.path)?,
                        &archived_row,
                        self.action.as_i64(),
                        self.last_modified,
                        self.owner,
                        self.group,
                        self.permissions,
                    )
                    .await
                    .or_raise(|| ErrorKind::Index)?;
                self.id = Some(file_row.id as u64);
                self.archived = Some(Archived::from(archived_row));
                Ok(())
            }
            Err(source) => {
                index
                    .mark_archived_poisoned(archived_row.id as u64)
                    .await
                    .or_raise(|| ErrorKind::Index)?;
                Err(source).or_raise(|| ErrorKind::ArchiveFailed)
            }
        }
    }

    /// Fetches this file's archived content from `storage` and writes it to
    /// `destination` (§4.8 step 4). Fails with [`ErrorKind::NotFound`] if
    /// this `File` carries no `archived` row (a `DELETE` entry never should
    /// be restored; callers are expected to have filtered those out already
    /// via [`crate::state::State`]).
    pub async fn restore(
        &self,
        storage: &dyn serac_storage::StorageBackend,
        password: &str,
        destination: &Path,
    ) -> Result<()> {
        let archived = self.archived.as_ref().ok_or_raise(|| ErrorKind::NotFound)?;
        crate::error::from_storage(storage.retrieve(destination, &archived.id.to_string(), password).await)
    }
}

fn path_to_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_raise(|| ErrorKind::InvalidPath)
}

impl TryFrom<FileRow> for File {
    type Error = Error;

    fn try_from(row: FileRow) -> Result<Self> {
        Ok(Self {
            id: Some(row.id as u64),
            path: PathBuf::from(row.path),
            archived: Some(Archived {
                id: row.archived_id as u64,
                hash: row.archived_hash,
                size: row.archived_size as u64,
            }),
            action: Action::from_i64(row.action)?,
            last_modified: row.last_modified,
            owner: row.owner as u32,
            group: row.group_id as u32,
            permissions: row.permissions as u32,
            cached_hash: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn equality_ignores_action_and_archived() {
        let mut a = File::new(PathBuf::from("/a"));
        a.last_modified = 100;
        a.owner = 1;
        a.group = 1;
        a.permissions = 0o644;
        a.action = Action::Add;

        let mut b = a.clone();
        b.action = Action::Metadata;
        b.archived = Some(Archived { id: 1, hash: "abc".into(), size: 3 });

        assert_eq!(a, b);
    }

    #[test]
    fn equality_differs_on_last_modified() {
        let mut a = File::new(PathBuf::from("/a"));
        a.last_modified = 100;
        let mut b = File::new(PathBuf::from("/a"));
        b.last_modified = 101;
        assert_ne!(a, b);
    }

    #[test]
    fn refresh_metadata_from_disk_fails_on_missing_path() {
        let mut file = File::new(PathBuf::from("/does/not/exist/at/all"));
        let err = file.refresh_metadata_from_disk().unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound));
    }

    #[test]
    fn refresh_metadata_from_disk_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::new(dir.path().to_path_buf());
        let err = file.refresh_metadata_from_disk().unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAFile));
    }

    #[test]
    fn calculate_hash_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::File::create(&path).unwrap().write_all(b"hello").unwrap();
        let mut file = File::new(path.clone());
        let first = file.calculate_hash().unwrap();
        std::fs::write(&path, b"changed").unwrap();
        let second = file.calculate_hash().unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn archive_deduplicates_identical_content_across_paths() {
        let db = serac_index::Database::connect_in_memory().await.unwrap();
        let index = serac_index::Repository::from(&db);
        let dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let storage = serac_storage::backend::LocalBackend::new(store_dir.path()).unwrap();

        let path_a = dir.path().join("a.txt");
        let path_b = dir.path().join("b.txt");
        std::fs::File::create(&path_a).unwrap().write_all(b"same bytes").unwrap();
        std::fs::File::create(&path_b).unwrap().write_all(b"same bytes").unwrap();

        let mut file_a = File::new(path_a);
        file_a.refresh_metadata_from_disk().unwrap();
        file_a.archive(&storage, &index, "hunter2").await.unwrap();

        let mut file_b = File::new(path_b);
        file_b.refresh_metadata_from_disk().unwrap();
        file_b.archive(&storage, &index, "hunter2").await.unwrap();

        let archived_a = file_a.archived.as_ref().unwrap();
        let archived_b = file_b.archived.as_ref().unwrap();
        assert_eq!(archived_a.id, archived_b.id);

        let entries = std::fs::read_dir(store_dir.path()).unwrap().count();
        assert_eq!(entries, 1, "identical content must be uploaded only once");
    }

    #[test]
    fn action_round_trips_through_i64() {
        for action in [Action::Add, Action::Content, Action::Metadata, Action::Delete] {
            assert_eq!(Action::from_i64(action.as_i64()).unwrap(), action);
        }
        assert!(Action::from_i64(0).is_err());
        assert!(Action::from_i64(5).is_err());
    }
}
