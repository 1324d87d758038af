//! Scan, diff, commit and restore: the algorithmic core of serac (§4, §6).
//!
//! `serac-index` is the persistence layer; this crate owns the domain
//! entities built from its rows ([`entity`]), point-in-time reconstruction
//! ([`state`]), the filesystem scan/diff ([`scanner`]), and the two
//! operations that actually move bytes ([`commit`], [`restore`]).

pub mod commit;
pub mod entity;
pub mod error;
pub mod reporter;
pub mod restore;
pub mod scanner;
pub mod state;

pub use crate::commit::{CommitOutcome, CommitReport};
pub use crate::entity::{Action, Archived, File};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::reporter::{NullReporter, Reporter};
pub use crate::restore::{restore, RestoreOutcome, RestoreReport};
pub use crate::scanner::{scan, Changeset};
pub use crate::state::{search, Pattern, State};
