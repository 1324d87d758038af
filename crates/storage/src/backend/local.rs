//! Local filesystem storage backend.

use super::StorageBackend;
use crate::error::{Error, ErrorKind, Result};
use crate::path::validate_archive_id;
use async_trait::async_trait;
use exn::ResultExt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Stores objects as plain files under a single root directory, one file
/// per archive id.
///
/// Writes are committed atomically: the ciphertext is streamed into a
/// temporary file in the same directory as the final destination, then
/// renamed into place. A reader can never observe a partially-written
/// object.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Creates a backend rooted at `root`. `root` must be an absolute path;
    /// it is created (along with any missing parents) on first use, not
    /// eagerly here.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidArchiveId(root.display().to_string()));
        }
        Ok(Self { root })
    }

    fn object_path(&self, archive_id: &str) -> Result<PathBuf> {
        validate_archive_id(archive_id)?;
        Ok(self.root.join(archive_id))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn exists(&self, archive_id: &str) -> Result<bool> {
        let path = self.object_path(archive_id)?;
        tokio::fs::try_exists(&path).await.or_raise(|| ErrorKind::Io)
    }

    async fn get_size(&self, archive_id: &str) -> Result<u64> {
        let path = self.object_path(archive_id)?;
        let meta = tokio::fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::from(ErrorKind::NotFound(archive_id.to_string()))
            } else {
                Error::from(ErrorKind::Io)
            }
        })?;
        Ok(meta.len())
    }

    #[instrument(skip(self, password), fields(backend = "local"))]
    async fn store(&self, local_path: &Path, archive_id: &str, password: &str) -> Result<()> {
        let object_path = self.object_path(archive_id)?;
        let parent = object_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        tokio::fs::create_dir_all(&parent).await.or_raise(|| ErrorKind::Io)?;

        let src = tokio::fs::File::open(local_path)
            .await
            .or_raise(|| ErrorKind::Io)?
            .into_std()
            .await;
        let password = password.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut src = src;
            let mut temp = tempfile::NamedTempFile::new_in(&parent).or_raise(|| ErrorKind::Io)?;
            serac_crypto::encrypt(&mut src, temp.as_file_mut(), &password).or_raise(|| ErrorKind::Crypto)?;
            temp.as_file_mut().flush().or_raise(|| ErrorKind::Io)?;
            temp.persist(&object_path).map_err(|e| e.error).or_raise(|| ErrorKind::Io)?;
            Ok(())
        })
        .await
        .or_raise(|| ErrorKind::Io)??;
        Ok(())
    }

    #[instrument(skip(self, password), fields(backend = "local"))]
    async fn retrieve(&self, local_path: &Path, archive_id: &str, password: &str) -> Result<()> {
        if tokio::fs::try_exists(local_path).await.or_raise(|| ErrorKind::Io)? {
            exn::bail!(ErrorKind::AlreadyExists(local_path.to_path_buf()));
        }
        let object_path = self.object_path(archive_id)?;
        let size = self.get_size(archive_id).await?;

        let src = tokio::fs::File::open(&object_path)
            .await
            .or_raise(|| ErrorKind::Io)?
            .into_std()
            .await;
        let local_path = local_path.to_path_buf();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut src = src;
            let mut dst = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&local_path)
                .or_raise(|| ErrorKind::Io)?;
            serac_crypto::decrypt(&mut src, &mut dst, &password, size).or_raise(|| ErrorKind::Crypto)?;
            dst.flush().or_raise(|| ErrorKind::Io)?;
            Ok(())
        })
        .await
        .or_raise(|| ErrorKind::Io)??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn backend() -> (LocalBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();
        (backend, dir)
    }

    #[test]
    fn new_rejects_relative_root() {
        assert!(LocalBackend::new("relative/path").is_err());
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips() {
        let (backend, dir) = backend();
        let src_path = dir.path().join("source.txt");
        std::fs::File::create(&src_path).unwrap().write_all(b"hello, archive").unwrap();

        backend.store(&src_path, "1", "hunter2").await.unwrap();
        assert!(backend.exists("1").await.unwrap());

        let dst_path = dir.path().join("restored.txt");
        backend.retrieve(&dst_path, "1", "hunter2").await.unwrap();
        assert_eq!(std::fs::read(&dst_path).unwrap(), b"hello, archive");
    }

    #[tokio::test]
    async fn retrieve_fails_if_destination_exists() {
        let (backend, dir) = backend();
        let src_path = dir.path().join("source.txt");
        std::fs::write(&src_path, b"data").unwrap();
        backend.store(&src_path, "1", "pw").await.unwrap();

        let dst_path = dir.path().join("already-there.txt");
        std::fs::write(&dst_path, b"existing").unwrap();

        let err = backend.retrieve(&dst_path, "1", "pw").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn retrieve_with_wrong_password_fails() {
        let (backend, dir) = backend();
        let src_path = dir.path().join("source.txt");
        std::fs::write(&src_path, b"data").unwrap();
        backend.store(&src_path, "1", "right").await.unwrap();

        let dst_path = dir.path().join("out.txt");
        let err = backend.retrieve(&dst_path, "1", "wrong").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Crypto));
    }

    #[tokio::test]
    async fn get_size_of_missing_object_fails_with_not_found() {
        let (backend, _dir) = backend();
        let err = backend.get_size("999").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn exists_is_false_for_missing_object() {
        let (backend, _dir) = backend();
        assert!(!backend.exists("999").await.unwrap());
    }

    #[tokio::test]
    async fn store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("nested").join("deeper")).unwrap();
        let src_path = dir.path().join("source.txt");
        std::fs::write(&src_path, b"data").unwrap();
        backend.store(&src_path, "7", "pw").await.unwrap();
        assert!(backend.exists("7").await.unwrap());
    }

    #[tokio::test]
    async fn rejects_archive_id_path_traversal() {
        let (backend, dir) = backend();
        let src_path = dir.path().join("source.txt");
        std::fs::write(&src_path, b"data").unwrap();
        let err = backend.store(&src_path, "../escape", "pw").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArchiveId(_)));
    }
}
