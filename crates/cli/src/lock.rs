//! Exclusive advisory lock on the config file (§5): only one `serac`
//! process may operate on a given config at a time.
//!
//! Grounded on the original's `fcntl.flock(fd, LOCK_EX | LOCK_NB)` in
//! `commands.py::cli`; `fs2` is the standard ecosystem wrapper for the
//! same OS facility (`flock` on Unix, `LockFileEx` on Windows).

use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use fs2::FileExt;
use std::fs::File;
use std::path::Path;

/// Holds the lock for as long as it's alive; released on drop (including
/// during a panic unwind), matching "held for the full lifetime of the
/// process" (§5).
pub struct ConfigLock {
    file: File,
}

impl ConfigLock {
    /// Attempts to acquire the lock on `config_path`, failing immediately
    /// (never blocking) with [`ErrorKind::Busy`] if another process holds it.
    pub fn acquire(config_path: &Path) -> Result<Self> {
        let file = File::open(config_path).or_raise(|| ErrorKind::Io)?;
        file.try_lock_exclusive().map_err(|_| Error::from(ErrorKind::Busy))?;
        Ok(Self { file })
    }
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_attempt_fails_busy() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("serac.conf");
        std::fs::write(&config_path, "").unwrap();

        let first = ConfigLock::acquire(&config_path).unwrap();
        let err = ConfigLock::acquire(&config_path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Busy));
        drop(first);

        // Lock released on drop, so a third attempt succeeds.
        assert!(ConfigLock::acquire(&config_path).is_ok());
    }
}
