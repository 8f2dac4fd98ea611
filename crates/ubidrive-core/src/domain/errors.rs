//! Domain and operation error types
//!
//! [`DomainError`] covers validation failures and invalid state transitions
//! inside the domain model. [`OperationError`] is the taxonomy surfaced to
//! callers of the orchestration layer.

use thiserror::Error;

use super::newtypes::FileName;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid file name (empty, contains a path separator, etc.)
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// Invalid content fingerprint format (expected hex-encoded SHA-256)
    #[error("Invalid fingerprint format: {0}")]
    InvalidFingerprint(String),

    /// Invalid identity token (empty)
    #[error("Invalid identity token")]
    InvalidToken,

    /// Invalid remote URL
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// A version that is not part of the file's history was referenced
    #[error("Unknown version for file {file}: {version}")]
    UnknownVersion {
        /// The file whose history was searched
        file: String,
        /// The version identifier that was not found
        version: String,
    },
}

/// Errors surfaced to callers of synchronization operations
///
/// Single-file operations return exactly one of these through their
/// `Result`; batch operations isolate them into the per-file progress
/// callback and never abort the remaining batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The remote store is unreachable or not configured
    #[error("Remote store unavailable")]
    Unavailable,

    /// The operation target does not exist
    #[error("Document not found: {0}")]
    NotFound(FileName),

    /// The rename/duplicate target already exists
    #[error("Document already exists: {0}")]
    AlreadyExists(FileName),

    /// Another operation for the same name is already in flight
    #[error("Operation already in flight for: {0}")]
    Busy(FileName),

    /// Divergent versions were detected; explicit resolution is required
    #[error("Unresolved version conflict for: {0}")]
    Conflict(FileName),

    /// An underlying read/write error from the document store
    #[error("I/O failure: {0}")]
    Io(String),

    /// The supplied document name is empty or illegal
    #[error("Invalid document name: {0}")]
    InvalidName(String),
}

impl OperationError {
    /// Wraps an adapter-level error from a port boundary
    pub fn io(err: anyhow::Error) -> Self {
        OperationError::Io(format!("{err:#}"))
    }

    /// Returns true if this error is terminal for the operation
    ///
    /// `Conflict` is not terminal: the operation stays paused until the
    /// caller resolves or abandons it.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationError::Conflict(_))
    }
}

impl From<DomainError> for OperationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidName(name) => OperationError::InvalidName(name),
            other => OperationError::Io(other.to_string()),
        }
    }
}
