//! Error types for rolodex-core

use thiserror::Error;

/// Result type alias using rolodex-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in rolodex-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No local or remote record with the requested id
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Operation is illegal for the record's current local state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Transient network or remote service failure
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The remote service rejected the call
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Local persistence failure
    #[error("Store failure: {0}")]
    Store(String),
}

impl Error {
    /// Whether this error aborts an in-progress sync pass outright.
    ///
    /// Store failures mean local-state invariants can no longer be trusted;
    /// everything else is recoverable at record granularity.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        Self::Store(error.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Store(error.to_string())
    }
}
