//! Walks the filesystem and diffs it against the last known state to
//! produce a [`Changeset`] (§4.6).
//!
//! Directory descent is an explicit work queue rather than recursion or a
//! self-extending iterator: include globs seed the queue, each directory
//! popped off it pushes its children back on, so the whole walk is one flat
//! loop regardless of tree depth.

use crate::entity::{Action, File};
use crate::error::{ErrorKind, Result};
use crate::state::State;
use exn::{OptionExt, ResultExt};
use serac_index::Repository;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

/// The four buckets a scan sorts every visited path into (§4.6).
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    /// Paths with no prior state entry.
    pub added: BTreeMap<PathBuf, File>,
    /// Paths whose content hash changed.
    pub content: BTreeMap<PathBuf, File>,
    /// Paths whose metadata changed but content did not.
    pub metadata: BTreeMap<PathBuf, File>,
    /// Paths present in the prior state but no longer on disk.
    pub deleted: BTreeMap<PathBuf, File>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.content.is_empty() && self.metadata.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.content.len() + self.metadata.len() + self.deleted.len()
    }
}

/// Walks `includes`, dropping anything matched by `excludes`, and diffs the
/// result against the state as of `now` (§4.6).
///
/// `includes`/`excludes` are glob patterns; an exclude is checked against
/// the whole path string (fnmatch-style), not just the final component, and
/// is applied before a matched directory is ever descended into.
pub async fn scan(index: &Repository, includes: &[String], excludes: &[String], now: i64) -> Result<Changeset> {
    let exclude_patterns: Vec<glob::Pattern> = excludes
        .iter()
        .map(|pattern| glob::Pattern::new(pattern).or_raise(|| ErrorKind::InvalidPattern))
        .collect::<Result<_>>()?;

    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    for include in includes {
        for entry in glob::glob(include).or_raise(|| ErrorKind::InvalidPattern)? {
            queue.push_back(entry.or_raise(|| ErrorKind::Io)?);
        }
    }

    let mut remaining = State::at(index, now).await?.into_map();
    let mut changeset = Changeset::default();

    while let Some(path) = queue.pop_front() {
        let path_str = path.to_str().ok_or_raise(|| ErrorKind::InvalidPath)?;
        if exclude_patterns.iter().any(|pattern| pattern.matches(path_str)) {
            continue;
        }

        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };

        if metadata.is_dir() {
            for entry in std::fs::read_dir(&path).or_raise(|| ErrorKind::Io)? {
                queue.push_back(entry.or_raise(|| ErrorKind::Io)?.path());
            }
            continue;
        }
        if !metadata.is_file() {
            continue;
        }

        let mut file = File::new(path.clone());
        file.refresh_metadata_from_disk()?;

        match remaining.remove(&path) {
            None => {
                file.action = Action::Add;
                changeset.added.insert(path, file);
            }
            Some(prev) => {
                if file == prev {
                    continue;
                }
                let hash = file.calculate_hash()?;
                let prev_hash = prev.archived.as_ref().map(|a| a.hash.as_str()).unwrap_or_default();
                if hash == prev_hash {
                    file.action = Action::Metadata;
                    file.archived = prev.archived;
                    changeset.metadata.insert(path, file);
                } else {
                    file.action = Action::Content;
                    changeset.content.insert(path, file);
                }
            }
        }
    }

    for (path, mut prev) in remaining {
        prev.id = None;
        prev.action = Action::Delete;
        changeset.deleted.insert(path, prev);
    }

    Ok(changeset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    async fn repo() -> Repository {
        let db = serac_index::Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    fn write_file(path: &std::path::Path, contents: &[u8]) {
        std::fs::File::create(path).unwrap().write_all(contents).unwrap();
    }

    #[tokio::test]
    async fn fresh_scan_classifies_everything_as_added() {
        let repo = repo().await;
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("a.txt"), b"hello");
        write_file(&dir.path().join("b.txt"), b"world");

        let include = format!("{}/*", dir.path().display());
        let changeset = scan(&repo, &[include], &[], i64::MAX).await.unwrap();

        assert_eq!(changeset.added.len(), 2);
        assert!(changeset.content.is_empty());
        assert!(changeset.metadata.is_empty());
        assert!(changeset.deleted.is_empty());
    }

    #[tokio::test]
    async fn excluded_paths_are_skipped() {
        let repo = repo().await;
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("keep.txt"), b"keep");
        write_file(&dir.path().join("skip.txt"), b"skip");

        let include = format!("{}/*", dir.path().display());
        let exclude = dir.path().join("skip.txt").display().to_string();
        let changeset = scan(&repo, &[include], &[exclude], i64::MAX).await.unwrap();

        assert_eq!(changeset.added.len(), 1);
        assert!(changeset.added.contains_key(&dir.path().join("keep.txt")));
    }

    #[tokio::test]
    async fn unchanged_metadata_tuple_produces_no_entry() {
        let repo = repo().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        write_file(&path, b"hello");

        let mut probe = File::new(path.clone());
        probe.refresh_metadata_from_disk().unwrap();
        let hash = probe.calculate_hash().unwrap();
        let archived = repo.insert_archived(&hash, 5).await.unwrap();
        repo.insert_file(
            path.to_str().unwrap(),
            &archived,
            1,
            probe.last_modified,
            probe.owner,
            probe.group,
            probe.permissions,
        )
        .await
        .unwrap();

        let include = format!("{}/*", dir.path().display());
        let changeset = scan(&repo, &[include], &[], i64::MAX).await.unwrap();
        assert!(changeset.is_empty());
    }

    #[tokio::test]
    async fn vanished_prior_entry_is_marked_deleted() {
        let repo = repo().await;
        let archived = repo.insert_archived("deadbeef", 0).await.unwrap();
        repo.insert_file("/not/on/disk.txt", &archived, 1, 100, 0, 0, 0o644).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let include = format!("{}/*", dir.path().display());
        let changeset = scan(&repo, &[include], &[], i64::MAX).await.unwrap();

        assert_eq!(changeset.deleted.len(), 1);
        assert!(changeset.deleted.contains_key(std::path::Path::new("/not/on/disk.txt")));
    }
}
