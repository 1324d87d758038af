//! Crypto Stream Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction, following the same pattern used
//! throughout the rest of the workspace.

use derive_more::{Display, Error};

/// A crypto stream error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for crypto stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Underlying I/O error while reading/writing the stream.
    #[display("I/O error")]
    Io,
    /// The authentication tag on a block did not match. Either the password
    /// is wrong or the ciphertext has been tampered with / corrupted.
    #[display("wrong password or corrupted ciphertext")]
    WrongPassword,
    /// `src_size` bytes were promised but the source ended early.
    #[display("ciphertext ended before the declared size was reached")]
    Truncated,
}
impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io)
    }
}
