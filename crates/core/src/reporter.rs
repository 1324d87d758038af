//! Progress reporting capability threaded through `commit`/`restore` (§6).
//!
//! The original reporter was one object instantiated per file; here it's a
//! single trait object called once per file per state change, which keeps
//! `commit`/`restore` from needing to construct anything per-file just to
//! report on it.

use std::path::Path;

/// Receives progress updates as `commit`/`restore` work through a batch of
/// files. `update` may be called zero or more times before the terminal
/// `complete` call for a given path.
pub trait Reporter: Send + Sync {
    fn update(&self, path: &Path, status: &str);
    fn complete(&self, path: &Path, status: &str);
}

/// A [`Reporter`] that discards every event, for callers (tests, library
/// consumers) that don't care about progress output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn update(&self, _path: &Path, _status: &str) {}
    fn complete(&self, _path: &Path, _status: &str) {}
}
