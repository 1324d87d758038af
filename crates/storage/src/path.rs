//! Archive id validation.
//!
//! Archive ids become path segments (local filesystem) or key segments
//! (S3) under a backend-controlled root. This guards against an archive
//! id that could escape that root via `..` components or an absolute path.

use crate::error::{ErrorKind, Result};
use exn::bail;

/// Validates that `archive_id` is safe to join onto a backend root/prefix.
///
/// Rejects empty ids, absolute paths, and any component that is `.` or
/// `..`, since those are the only ways a single path segment can escape
/// the directory it's joined into.
pub fn validate_archive_id(archive_id: &str) -> Result<()> {
    if archive_id.is_empty() {
        bail!(ErrorKind::InvalidArchiveId(archive_id.to_string()));
    }
    let path = std::path::Path::new(archive_id);
    if path.is_absolute() {
        bail!(ErrorKind::InvalidArchiveId(archive_id.to_string()));
    }
    for component in path.components() {
        match component {
            std::path::Component::Normal(_) => {}
            _ => bail!(ErrorKind::InvalidArchiveId(archive_id.to_string())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_ids() {
        assert!(validate_archive_id("1").is_ok());
        assert!(validate_archive_id("42").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_archive_id("").is_err());
    }

    #[test]
    fn rejects_absolute_paths() {
        assert!(validate_archive_id("/etc/passwd").is_err());
    }

    #[test]
    fn rejects_parent_traversal() {
        assert!(validate_archive_id("../../etc/passwd").is_err());
        assert!(validate_archive_id("foo/../../bar").is_err());
    }

    #[test]
    fn rejects_current_dir_component() {
        assert!(validate_archive_id("./1").is_err());
    }
}
