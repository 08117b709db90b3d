//! Directory error taxonomy — shared by the service and its HTTP clients.
//!
//! Every variant is recoverable: the operation that produced it had no side
//! effects and the caller may simply re-invoke it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// A register call named an empty or unusable field.
    #[error("missing or invalid field: {0}")]
    InvalidInput(&'static str),

    /// The username is already registered. Entries are never overwritten.
    #[error("username already exists")]
    DuplicateUsername,

    /// No registration under that username.
    #[error("peer not found")]
    NotFound,

    /// The registry backend (or the directory itself) could not be reached
    /// or answered outside its contract.
    #[error("registry backend error: {0}")]
    Backend(String),
}
