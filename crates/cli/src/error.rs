//! Top-level CLI error (§7): collects every crate's error into one type
//! with an exit code, the way `main` needs to see it.
//!
//! Each sub-crate's `ErrorKind` is carried through verbatim in its own
//! variant (same `from_storage`-style bridging `serac-core` uses over
//! `serac-storage`) rather than collapsed, so a `--verbose` run can still
//! print the original message chain.

use derive_more::{Display, Error};
use exn::ResultExt;

/// A CLI error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories (§7), plus the two that only make sense at
/// the CLI boundary: `Busy` (process-lock contention) and `BadTimestamp`
/// parse failures that never reach `serac-core` at all.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Underlying I/O error unrelated to any of the more specific cases below.
    #[display("I/O error")]
    Io,
    /// The config file is already locked by another `serac` process.
    #[display("config file is already in use by another process")]
    Busy,
    /// `init` was asked to create a database that already exists.
    #[display("index database already exists: {}", _0.display())]
    AlreadyExists(#[error(not(source))] std::path::PathBuf),
    /// `--at` did not parse as a POSIX integer or one of the supported
    /// date formats.
    #[display("invalid timestamp; expected a POSIX integer or a YYYY-MM-DD[THH:MM:SS] date")]
    BadTimestamp,
    /// An error from `serac-config`.
    #[display("{_0}")]
    Config(#[error(not(source))] serac_config::error::ErrorKind),
    /// An error from `serac-index`.
    #[display("{_0}")]
    Index(#[error(not(source))] serac_index::error::ErrorKind),
    /// An error from `serac-core` (which itself may carry a
    /// `serac-storage` kind inside its own `Storage` variant).
    #[display("{_0}")]
    Core(#[error(not(source))] serac_core::ErrorKind),
}

impl ErrorKind {
    /// The process exit code this error maps to (§6): 2 for a malformed
    /// `--at`, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BadTimestamp => 2,
            Self::Core(serac_core::ErrorKind::BadTimestamp) => 2,
            _ => 1,
        }
    }
}

/// Bridges a `serac-config` result, preserving the original `ErrorKind`.
pub fn from_config<T>(result: serac_config::error::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            let kind = ErrorKind::Config((*e).clone());
            Err(e).or_raise(|| kind)
        }
    }
}

/// Bridges a `serac-index` result, preserving the original `ErrorKind`.
pub fn from_index<T>(result: serac_index::error::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            let kind = ErrorKind::Index((*e).clone());
            Err(e).or_raise(|| kind)
        }
    }
}

/// Bridges a `serac-core` result, preserving the original `ErrorKind`.
pub fn from_core<T>(result: serac_core::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            let kind = ErrorKind::Core((*e).clone());
            Err(e).or_raise(|| kind)
        }
    }
}

/// Bridges a `serac-storage` result (backend construction, before any core
/// operation exists to carry it), tagging it as a `Core(Storage(..))` error
/// so it still classifies the same way a failure mid-archive would.
pub fn from_storage<T>(result: serac_storage::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            let kind = ErrorKind::Core(serac_core::ErrorKind::Storage((*e).clone()));
            Err(e).or_raise(|| kind)
        }
    }
}
