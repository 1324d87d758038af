//! Persists a [`crate::scanner::Changeset`] (§4.7).
//!
//! Metadata and delete events never touch the storage backend, so they're
//! persisted first; added/content events are uploaded and persisted after.
//! A failure uploading one file poisons its `archived` row and is recorded
//! against that file in the returned report — it never aborts the rest of
//! the commit.

use crate::error::{ErrorKind, Result};
use crate::reporter::Reporter;
use crate::scanner::Changeset;
use exn::{OptionExt, ResultExt};
use serac_config::ArchiveSection;
use serac_index::{ArchivedRow, Repository};
use serac_storage::StorageBackend;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What happened to one path during a commit.
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    Committed,
    Failed(String),
}

/// Per-path outcome of a [`Changeset::commit`] call.
#[derive(Debug, Clone, Default)]
pub struct CommitReport(pub BTreeMap<PathBuf, CommitOutcome>);

impl CommitReport {
    pub fn failures(&self) -> impl Iterator<Item = (&PathBuf, &str)> {
        self.0.iter().filter_map(|(path, outcome)| match outcome {
            CommitOutcome::Failed(message) => Some((path, message.as_str())),
            CommitOutcome::Committed => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.0.values().any(|o| matches!(o, CommitOutcome::Failed(_)))
    }
}

impl Changeset {
    /// Persists every bucket of this changeset (§4.7).
    pub async fn commit(
        self,
        storage: &dyn StorageBackend,
        index: &Repository,
        archive: &ArchiveSection,
        reporter: &dyn Reporter,
    ) -> Result<CommitReport> {
        let mut report = CommitReport::default();

        for (path, file) in self.metadata.into_iter().chain(self.deleted) {
            let archived = file.archived.as_ref().ok_or_raise(|| ErrorKind::ArchiveFailed)?;
            let archived_row =
                ArchivedRow { id: archived.id as i64, hash: archived.hash.clone(), size: archived.size as i64 };
            index
                .insert_file(
                    path.to_str().ok_or_raise(|| ErrorKind::InvalidPath)?,
                    &archived_row,
                    file.action.as_i64(),
                    file.last_modified,
                    file.owner,
                    file.group,
                    file.permissions,
                )
                .await
                .or_raise(|| ErrorKind::Index)?;
            reporter.complete(&path, "ok");
            report.0.insert(path, CommitOutcome::Committed);
        }

        for (path, mut file) in self.added.into_iter().chain(self.content) {
            reporter.update(&path, "archiving");
            match file.archive(storage, index, &archive.password).await {
                Ok(()) => {
                    reporter.complete(&path, "ok");
                    report.0.insert(path, CommitOutcome::Committed);
                }
                Err(e) => {
                    reporter.complete(&path, "failed");
                    report.0.insert(path, CommitOutcome::Failed(e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use crate::scanner::scan;
    use serac_config::Backend;
    use serac_storage::backend::LocalBackend;
    use std::io::Write as _;

    fn archive_section(path: &std::path::Path) -> ArchiveSection {
        ArchiveSection { backend: Backend::Local { path: path.to_path_buf() }, password: "hunter2".into() }
    }

    #[tokio::test]
    async fn committing_added_files_persists_index_and_storage() {
        let db = serac_index::Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let source = tempfile::tempdir().unwrap();
        std::fs::File::create(source.path().join("a.txt")).unwrap().write_all(b"hello").unwrap();

        let store_dir = tempfile::tempdir().unwrap();
        let storage = LocalBackend::new(store_dir.path()).unwrap();
        let archive = archive_section(store_dir.path());

        let include = format!("{}/*", source.path().display());
        let changeset = scan(&repo, &[include], &[], i64::MAX).await.unwrap();
        assert_eq!(changeset.added.len(), 1);

        let report = changeset.commit(&storage, &repo, &archive, &NullReporter).await.unwrap();
        assert!(!report.has_failures());

        let state = crate::state::State::at(&repo, i64::MAX).await.unwrap();
        assert_eq!(state.len(), 1);
    }

    #[tokio::test]
    async fn upload_failure_is_recorded_without_aborting_the_commit() {
        let db = serac_index::Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let source = tempfile::tempdir().unwrap();
        std::fs::File::create(source.path().join("a.txt")).unwrap().write_all(b"hello").unwrap();

        // A storage root that is itself a plain file makes every `store`
        // call's `create_dir_all` fail.
        let outer = tempfile::tempdir().unwrap();
        let bogus_root = outer.path().join("not-a-dir");
        std::fs::write(&bogus_root, b"blocking file").unwrap();
        let storage = LocalBackend::new(bogus_root.join("backend-root")).unwrap();
        let archive = archive_section(&bogus_root);

        let include = format!("{}/*", source.path().display());
        let changeset = scan(&repo, &[include], &[], i64::MAX).await.unwrap();

        let report = changeset.commit(&storage, &repo, &archive, &NullReporter).await.unwrap();
        assert!(report.has_failures());
    }
}
