//! Storage backend trait and implementations.
//!
//! A [`StorageBackend`] is a password-authenticated, content-addressed
//! object store: objects are identified by an opaque `archive_id` (in
//! practice, the decimal primary key of the corresponding `archived` row)
//! and are always encrypted with [`serac_crypto`] before they leave the
//! caller's machine.

mod local;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalBackend;
#[cfg(feature = "s3")]
pub use s3::S3Backend;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// A storage backend capable of archiving and retrieving encrypted objects.
///
/// Implementations MUST commit `store` atomically: a reader calling
/// `exists`/`get_size`/`retrieve` concurrently with an in-flight `store`
/// must see either the complete prior object or nothing, never a partial
/// write. They are free to differ in how they achieve this (a
/// temp-file-then-rename for a local filesystem, a single `PutObject` call
/// for S3).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// A short name for this backend, used in log messages and error context.
    fn name(&self) -> &str;

    /// Returns `true` if an object exists under `archive_id`.
    async fn exists(&self, archive_id: &str) -> Result<bool>;

    /// Returns the size in bytes of the encrypted object (the ciphertext
    /// framing, not the plaintext length).
    async fn get_size(&self, archive_id: &str) -> Result<u64>;

    /// Reads `local_path`, encrypts it with `password`, and stores the
    /// result under `archive_id`, overwriting any prior object there.
    async fn store(&self, local_path: &Path, archive_id: &str, password: &str) -> Result<()>;

    /// Fetches the object under `archive_id`, decrypts it with `password`,
    /// and writes the plaintext to `local_path`.
    ///
    /// `local_path` MUST NOT already exist; fails with
    /// [`crate::error::ErrorKind::AlreadyExists`] otherwise.
    async fn retrieve(&self, local_path: &Path, archive_id: &str, password: &str) -> Result<()>;

    /// Checks whether `archive_id` is immediately readable.
    ///
    /// Backends with no cold-storage tier (like [`LocalBackend`]) are
    /// always available. Backends that support one (like [`S3Backend`])
    /// fail with `ObjectFrozen` or `ObjectRetrieving` instead of returning
    /// `false`, since those two states call for different caller action.
    async fn check_is_available(&self, _archive_id: &str) -> Result<()> {
        Ok(())
    }

    /// Requests that a frozen object be thawed. A no-op for backends with
    /// no cold-storage tier.
    async fn start_thaw(&self, _archive_id: &str) -> Result<()> {
        Ok(())
    }
}
