//! Storage error types.
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, following the convention used throughout the
//! workspace.

use derive_more::{Display, Error};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// `Clone` lets callers above this crate (`serac-core`) classify an error
/// before consuming it as a chained source (see `serac_core::error::from_storage`).
#[derive(Debug, Clone, Display, Error)]
pub enum ErrorKind {
    /// Underlying I/O error.
    #[display("I/O error")]
    Io,
    /// No object exists under this archive id.
    #[display("archive object not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// `retrieve`'s precondition failed: the destination path already exists.
    #[display("file already exists: {}", _0.display())]
    AlreadyExists(#[error(not(source))] std::path::PathBuf),
    /// Archive id contains characters that would escape the backend root/prefix.
    #[display("invalid archive id: {_0}")]
    InvalidArchiveId(#[error(not(source))] String),
    /// Network-related error (S3 connections, timeouts, DNS, etc).
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Backend-specific error that doesn't fit another category.
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
    /// Object is archived in Glacier/Deep Archive and no restore is in progress.
    /// A restore has just been requested.
    #[display("object is frozen; a restore has been requested")]
    ObjectFrozen,
    /// Object is thawing; the caller should retry later.
    #[display("object is still thawing; try again later")]
    ObjectRetrieving,
    /// Underlying crypto stream error: wrong password, truncated ciphertext,
    /// or an I/O error while streaming through the cipher. The original
    /// `serac_crypto` error is chained on as this error's source.
    #[display("crypto stream error")]
    Crypto,
}
impl ErrorKind {
    /// Returns `true` if retrying might succeed without user intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::Network(_) | Self::BackendError(_))
    }

    /// Returns `true` for the two "the object exists but isn't ready yet"
    /// conditions (the `ArchiveUnavailable` supertype in the design).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ObjectFrozen | Self::ObjectRetrieving)
    }
}
