//! Core error types (§7).
//!
//! `ArchiveUnavailable`, `ObjectFrozen`/`ObjectRetrieving`, `FileExists` and
//! the crypto failures are not duplicated here: they already exist as
//! [`serac_storage::ErrorKind`] variants and are carried through unchanged
//! in [`ErrorKind::Storage`], the same way `serac-storage` itself carries
//! `serac-crypto`'s errors through its own `Crypto` variant.

use derive_more::{Display, Error};
use exn::ResultExt;
use serac_storage::ErrorKind as StorageErrorKind;

/// A core error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories (§7).
#[derive(Debug, Clone, Display, Error)]
pub enum ErrorKind {
    /// Underlying I/O error unrelated to any of the more specific cases below.
    #[display("I/O error")]
    Io,
    /// `refresh_metadata_from_disk` found no file at the path, or a restore
    /// pattern matched nothing in the requested state.
    #[display("not found")]
    NotFound,
    /// Path exists but isn't a regular file (a directory, socket, device…).
    #[display("path exists but is not a regular file")]
    NotAFile,
    /// A path could not be represented as UTF-8.
    #[display("path is not valid UTF-8")]
    InvalidPath,
    /// An include/exclude glob pattern failed to parse.
    #[display("invalid glob pattern")]
    InvalidPattern,
    /// `File::archive` was called on a `File` that already has a database id.
    #[display("file has already been archived")]
    AlreadyArchived,
    /// The upload half of archiving a file failed; the `archived` row backing
    /// it has been poisoned.
    #[display("failed to upload archived content")]
    ArchiveFailed,
    /// `restore` was asked for an empty pattern against an empty state.
    #[display("archive is empty at the requested timestamp")]
    ArchiveEmpty,
    /// `--at` did not parse to a POSIX integer timestamp.
    #[display("timestamp must be an integer number of seconds since the epoch")]
    BadTimestamp,
    /// The `file` table held an action code outside 1..=4.
    #[display("invalid action code in index: {_0}")]
    InvalidAction(#[error(not(source))] i64),
    /// The index database returned an error.
    #[display("index error")]
    Index,
    /// The storage backend returned an error; the original kind is preserved
    /// so callers can branch on `ObjectFrozen`/`ObjectRetrieving`/`AlreadyExists`.
    #[display("storage error: {_0}")]
    Storage(#[error(not(source))] StorageErrorKind),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed without user intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(k) if k.is_retryable())
    }

    /// Returns `true` for the "object exists but isn't ready yet" conditions.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Storage(k) if k.is_unavailable())
    }

    /// Returns `true` if a restore target already existed on disk.
    pub fn is_file_exists(&self) -> bool {
        matches!(self, Self::Storage(StorageErrorKind::AlreadyExists(_)))
    }
}

impl From<StorageErrorKind> for ErrorKind {
    fn from(kind: StorageErrorKind) -> Self {
        Self::Storage(kind)
    }
}

/// Bridges a `serac-storage` result into a core one, preserving the
/// original `StorageErrorKind` variant (so callers can still branch on
/// `ObjectFrozen`/`ObjectRetrieving`/`AlreadyExists`) while chaining the
/// original error as this one's source.
pub(crate) fn from_storage<T>(result: serac_storage::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            let kind = ErrorKind::Storage((*e).clone());
            Err(e).or_raise(|| kind)
        }
    }
}
