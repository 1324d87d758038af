//! `StdoutReporter` (§6): a `\r`-rewriting progress line per file.
//!
//! A literal translation of `original_source/serac/reporter.py`'s
//! `StreamReporter`: `update` rewrites the current line, `complete` prints
//! it and moves to a new one. Kept out of `serac-core` since it touches
//! `std::io::stdout` directly — a shell-boundary concern, not a core one.

use serac_core::Reporter;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;

/// Writes progress to stdout, one rewritten line per file.
pub struct StdoutReporter {
    stdout: Mutex<std::io::Stdout>,
}

impl StdoutReporter {
    pub fn new() -> Self {
        Self { stdout: Mutex::new(std::io::stdout()) }
    }
}

impl Reporter for StdoutReporter {
    fn update(&self, path: &Path, status: &str) {
        let mut stdout = self.stdout.lock().expect("stdout lock poisoned");
        let _ = write!(stdout, "\r{}... {} ", path.display(), status);
        let _ = stdout.flush();
    }

    fn complete(&self, path: &Path, status: &str) {
        let mut stdout = self.stdout.lock().expect("stdout lock poisoned");
        let _ = write!(stdout, "\r{}... {} ", path.display(), status);
        let _ = writeln!(stdout);
    }
}
