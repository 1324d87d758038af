//! Config Error Types
//!
//! Structured errors using `exn`, matching the convention used across the
//! rest of the workspace.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A config error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Clone, Display, Error)]
pub enum ErrorKind {
    /// Could not read the config file.
    #[display("I/O error reading config file")]
    Io,
    /// The file's contents could not be parsed as the expected INI shape.
    #[display("failed to parse config file")]
    Parse,
    /// A required key was absent, or present but empty.
    #[display("config is missing required field `{_0}`")]
    MissingField(#[error(not(source))] &'static str),
    /// The config declared a section set other than exactly
    /// `source`, `archive`, `index`.
    #[display("config must contain exactly the sections source, archive, index; instead found {}", _0.join(", "))]
    InvalidSection(#[error(not(source))] Vec<String>),
    /// `archive.storage` named a backend this build doesn't recognise.
    #[display("unrecognised storage backend: {_0}")]
    UnknownStorage(#[error(not(source))] String),
    /// `index.path`'s parent directory doesn't exist (spec §6: "Parent
    /// directory must exist").
    #[display("index parent directory does not exist: {}", _0.display())]
    IndexParentMissing(#[error(not(source))] PathBuf),
}
impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
