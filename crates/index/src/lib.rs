//! Append-only SQLite index of archived file history.
//!
//! This crate is the persistence layer for the two entities in the data
//! model: [`models::ArchivedRow`] and [`models::FileRow`]. It never deletes
//! or updates a row (with the single, deliberate exception of poisoning an
//! `archived` row's hash) — the database itself is not the source of truth
//! for "what currently exists", it's a full history of every observed
//! state, and `serac-core` does the work of reconstructing a point-in-time
//! view from it.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{ArchivedRow, FileRow};
pub use crate::repo::Repository;
