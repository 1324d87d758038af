//! Point-in-time reconstruction of "what files exist" (§4.5) and the
//! `--pattern` restore filter (§4.8 step 1).

use crate::entity::File;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serac_index::Repository;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The live set of files at some timestamp: per path, the most recent
/// non-`DELETE` `file` row with `last_modified <= timestamp` (§4.5).
#[derive(Debug, Clone, Default)]
pub struct State(BTreeMap<PathBuf, File>);

impl State {
    /// Reconstructs the state at `timestamp` (POSIX seconds) by delegating
    /// the "latest row per path" aggregation to the index's SQL query and
    /// converting the resulting rows into domain [`File`]s.
    pub async fn at(index: &Repository, timestamp: i64) -> Result<Self> {
        let rows = index.state_at(timestamp).await.or_raise(|| ErrorKind::Index)?;
        let mut map = BTreeMap::new();
        for row in rows {
            let file = File::try_from(row)?;
            map.insert(file.path.clone(), file);
        }
        Ok(Self(map))
    }

    pub fn get(&self, path: &Path) -> Option<&File> {
        self.0.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &File)> {
        self.0.iter()
    }

    pub fn into_map(self) -> BTreeMap<PathBuf, File> {
        self.0
    }
}

/// A `restore` path filter (§4.8 step 1): empty, an exact file, or an
/// ancestor directory of a whole subtree.
#[derive(Debug, Clone, Default)]
pub struct Pattern(Option<String>);

impl Pattern {
    /// `None`/empty string both mean "match everything".
    pub fn new(pattern: Option<String>) -> Self {
        Self(pattern.filter(|p| !p.is_empty()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// `true` iff the pattern is empty, equals `path`, or is an ancestor
    /// directory of it. `Path::starts_with` is component-wise, so it
    /// already covers both the exact-match and ancestor cases.
    pub fn matches(&self, path: &Path) -> bool {
        match &self.0 {
            None => true,
            Some(pattern) => path.starts_with(Path::new(pattern)),
        }
    }
}

/// Filters [`State::at`] down to the paths matched by `pattern` (§4.8 step 1).
pub async fn search(index: &Repository, timestamp: i64, pattern: &Pattern) -> Result<State> {
    let state = State::at(index, timestamp).await?;
    if pattern.is_empty() {
        return Ok(state);
    }
    let filtered = state.0.into_iter().filter(|(path, _)| pattern.matches(path)).collect();
    Ok(State(filtered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_matches_everything() {
        let pattern = Pattern::new(None);
        assert!(pattern.matches(Path::new("/anything")));
    }

    #[test]
    fn pattern_matches_exact_path() {
        let pattern = Pattern::new(Some("/a/b.txt".into()));
        assert!(pattern.matches(Path::new("/a/b.txt")));
        assert!(!pattern.matches(Path::new("/a/c.txt")));
    }

    #[test]
    fn pattern_matches_subtree() {
        let pattern = Pattern::new(Some("/a".into()));
        assert!(pattern.matches(Path::new("/a/b/c.txt")));
        assert!(!pattern.matches(Path::new("/ab/c.txt")));
    }

    #[tokio::test]
    async fn state_at_converts_rows_to_files() {
        let db = serac_index::Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let archived = repo.insert_archived("hash1", 5).await.unwrap();
        repo.insert_file("/a.txt", &archived, 1, 100, 0, 0, 0o644).await.unwrap();

        let state = State::at(&repo, 200).await.unwrap();
        assert_eq!(state.len(), 1);
        assert!(state.get(Path::new("/a.txt")).is_some());
    }
}
