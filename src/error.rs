//! Error types shared by the engine, store, and HTTP surfaces.

/// Error type for competition engine operations.
///
/// Every variant leaves state unchanged unless the message says otherwise:
/// validation failures are rejected before any mutation, precondition
/// failures abort with no partial writes, and timed-out queue waits never
/// touch the store.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed input (negative time, contestant not in match, ...).
    #[error("{0}")]
    Validation(String),

    /// An operation guard failed (incomplete stage, empty roster, ...).
    #[error("{0}")]
    Precondition(String),

    /// Stale state detected; the caller must re-fetch and retry.
    #[error("{0}")]
    Conflict(String),

    /// A queued mutation exceeded its wait budget or the queue was full.
    #[error("{0}")]
    Timeout(String),

    /// The referenced competition, match, or contestant does not exist.
    #[error("{0}")]
    NotFound(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Validation(s)
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
