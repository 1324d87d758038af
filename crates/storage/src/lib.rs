//! Content-addressed, encrypted object storage.
//!
//! A [`backend::StorageBackend`] is the boundary between serac's index
//! (which knows *what* has been archived) and wherever the encrypted bytes
//! actually live. Two implementations ship here: [`backend::LocalBackend`]
//! for a plain directory on disk, and [`backend::S3Backend`] (behind the
//! `s3` feature) for S3 and its Glacier/Deep Archive cold-storage tiers.

pub mod backend;
pub mod error;
mod path;

pub use backend::StorageBackend;
pub use error::{Error, ErrorKind, Result};
