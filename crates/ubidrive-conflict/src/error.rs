//! Error types for the conflict engine

use thiserror::Error;

use ubidrive_core::domain::{FileName, VersionId};

/// Errors that can occur during conflict detection and resolution
#[derive(Debug, Error)]
pub enum ConflictError {
    /// No conflict is recorded for the named file
    #[error("no conflict recorded for: {0}")]
    NotFound(FileName),

    /// The chosen version is not among the file's competing versions
    #[error("version {version} is not a contender for {file}")]
    UnknownVersion { file: FileName, version: VersionId },

    /// Resolution operation failed (version replacement or cleanup)
    #[error("resolution failed: {0}")]
    ResolutionFailed(String),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
