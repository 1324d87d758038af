//! Index Error Types
//!
//! Structured errors using `exn` for automatic location tracking, in the
//! same style as the other crates in this workspace.

use derive_more::{Display, Error};

/// An index error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Clone, Display, Error)]
pub enum ErrorKind {
    /// Underlying sqlite error.
    #[display("database error")]
    Database,
    /// Migration failed to apply.
    #[display("database migration error")]
    Migration,
    /// `connect` was called against a path with no database file.
    #[display("index database does not exist")]
    DatabaseMissing,
    /// A row could not be converted to/from its domain representation.
    #[display("invalid index data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}
impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
