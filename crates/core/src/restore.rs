//! Restores a point-in-time state to disk (§4.8).

use crate::error::{ErrorKind, Result};
use crate::state::{search, Pattern};
use serac_index::Repository;
use serac_storage::StorageBackend;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What happened to one path during a restore.
#[derive(Debug, Clone)]
pub enum RestoreOutcome {
    Restored,
    Failed(String),
}

/// Per-path outcome of a [`restore`] call.
#[derive(Debug, Clone, Default)]
pub struct RestoreReport(pub BTreeMap<PathBuf, RestoreOutcome>);

impl RestoreReport {
    pub fn has_failures(&self) -> bool {
        self.0.values().any(|o| matches!(o, RestoreOutcome::Failed(_)))
    }
}

/// Restores every file live at `timestamp` and matched by `pattern` into
/// `destination` (§4.8).
///
/// - An empty pattern against an empty state fails with [`ErrorKind::ArchiveEmpty`].
/// - A non-empty pattern that matches nothing fails with [`ErrorKind::NotFound`].
/// - A single matched file restored into an existing directory is written
///   under that directory using the matched path's final component, rather
///   than overwriting the directory itself (§4.8 step 2).
pub async fn restore(
    index: &Repository,
    storage: &dyn StorageBackend,
    password: &str,
    timestamp: i64,
    destination: &Path,
    pattern: &Pattern,
) -> Result<RestoreReport> {
    let state = search(index, timestamp, pattern).await?;

    if state.is_empty() {
        return Err(if pattern.is_empty() {
            crate::error::Error::from(ErrorKind::ArchiveEmpty)
        } else {
            crate::error::Error::from(ErrorKind::NotFound)
        });
    }

    let mut destination = destination.to_path_buf();
    if let Some(pattern_str) = pattern.as_str() {
        if state.len() == 1 && destination.is_dir() {
            if let Some(name) = Path::new(pattern_str).file_name() {
                destination = destination.join(name);
            }
        }
    }

    let mut report = RestoreReport::default();
    for (path, file) in state.into_map() {
        let target = match pattern.as_str() {
            Some(prefix) => destination.join(path.strip_prefix(prefix).unwrap_or(&path)),
            None => destination.join(path.strip_prefix("/").unwrap_or(&path)),
        };
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|_| crate::error::Error::from(ErrorKind::Io))?;
            }
        }

        match file.restore(storage, password, &target).await {
            Ok(()) => {
                report.0.insert(path, RestoreOutcome::Restored);
            }
            Err(e) => {
                report.0.insert(path, RestoreOutcome::Failed(e.to_string()));
            }
        }
    }

    Ok(report)
}
