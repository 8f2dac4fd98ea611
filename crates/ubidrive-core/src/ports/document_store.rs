//! Document store port (driven/secondary port)
//!
//! This module defines the interface for reading and writing document
//! content, both in the remote container and in the local offline
//! directory. Metadata observation lives in
//! [`IMetadataSource`](super::IMetadataSource); this port moves bytes.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - Every content operation is addressed by `(StoreLocation, FileName)`;
//!   the engine never handles paths or URLs at this boundary.
//! - Version operations (`replace_with_version`, `remove_other_versions`)
//!   exist for conflict resolution and are remote-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{FileName, Fingerprint, VersionId};

/// Which side of the sync boundary an operation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLocation {
    /// The local offline directory
    Local,
    /// The remote container
    Remote,
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreLocation::Local => write!(f, "local"),
            StoreLocation::Remote => write!(f, "remote"),
        }
    }
}

/// Lifecycle state of a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    /// Open and readable, no competing versions
    Normal,
    /// Not currently open
    Closed,
    /// Competing versions exist and need resolution
    InConflict,
    /// The last save did not complete
    SavingError,
}

impl DocumentState {
    /// Returns true if the document can be read without further action
    pub fn is_readable(&self) -> bool {
        matches!(self, DocumentState::Normal | DocumentState::Closed)
    }
}

/// Port trait for document content operations
///
/// Implementations wrap a concrete byte store. All methods addressed at
/// [`StoreLocation::Remote`] require the backing account to be reachable;
/// implementations surface unreachability as errors, which the engine
/// classifies at the use-case layer.
#[async_trait::async_trait]
pub trait IDocumentStore: Send + Sync {
    /// Reads the full content of an existing document
    async fn open(&self, location: StoreLocation, name: &FileName) -> anyhow::Result<Vec<u8>>;

    /// Creates a new document; fails if one already exists
    async fn create(
        &self,
        location: StoreLocation,
        name: &FileName,
        content: &[u8],
    ) -> anyhow::Result<()>;

    /// Overwrites an existing document, or creates it if absent
    async fn save(
        &self,
        location: StoreLocation,
        name: &FileName,
        content: &[u8],
    ) -> anyhow::Result<()>;

    /// Flushes and closes a document previously opened or saved
    async fn close(&self, location: StoreLocation, name: &FileName) -> anyhow::Result<()>;

    /// Removes a document
    async fn delete(&self, location: StoreLocation, name: &FileName) -> anyhow::Result<()>;

    /// Returns true if a document with the given name exists
    async fn exists(&self, location: StoreLocation, name: &FileName) -> anyhow::Result<bool>;

    /// Lists the names of all documents at the given location
    async fn list(&self, location: StoreLocation) -> anyhow::Result<Vec<FileName>>;

    /// Renames a document within one location; fails if `to` exists
    async fn rename(
        &self,
        location: StoreLocation,
        from: &FileName,
        to: &FileName,
    ) -> anyhow::Result<()>;

    /// Moves a document between locations, removing the source copy
    async fn move_to(
        &self,
        name: &FileName,
        from: StoreLocation,
        to: StoreLocation,
    ) -> anyhow::Result<()>;

    /// Returns the content fingerprint of an existing document
    async fn content_fingerprint(
        &self,
        location: StoreLocation,
        name: &FileName,
    ) -> anyhow::Result<Fingerprint>;

    /// Returns the modification date of an existing document
    async fn modified_date(
        &self,
        location: StoreLocation,
        name: &FileName,
    ) -> anyhow::Result<DateTime<Utc>>;

    /// Returns the lifecycle state of a remote document
    async fn document_state(&self, name: &FileName) -> anyhow::Result<DocumentState>;

    /// Makes the given version the remote document's content
    async fn replace_with_version(
        &self,
        name: &FileName,
        version: &VersionId,
    ) -> anyhow::Result<()>;

    /// Discards every remote version except the current one
    async fn remove_other_versions(&self, name: &FileName) -> anyhow::Result<()>;
}
