//! CloudFile domain entity
//!
//! A [`CloudFile`] represents one named document known to the remote store,
//! together with its download/upload status and its version history. The
//! version history enforces the central invariant of the data model: at most
//! one [`FileVersion`] is *current* at any time; all others are pending
//! conflict resolution or already discarded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::DomainError;
use super::newtypes::{FileName, Fingerprint, RemoteUrl, VersionId};

/// Download status of a file's content relative to the local replica
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Metadata only; content exists only in the remote store
    #[default]
    NotDownloaded,
    /// Content transfer from the remote store is in progress
    Downloading,
    /// Content is resident locally and up to date
    Current,
}

impl DownloadStatus {
    /// Returns true if the content is available locally
    pub fn is_local(&self) -> bool {
        matches!(self, DownloadStatus::Current)
    }

    /// Returns true if a transfer is in progress
    pub fn is_transferring(&self) -> bool {
        matches!(self, DownloadStatus::Downloading)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadStatus::NotDownloaded => write!(f, "not_downloaded"),
            DownloadStatus::Downloading => write!(f, "downloading"),
            DownloadStatus::Current => write!(f, "current"),
        }
    }
}

/// Upload status of a file's content relative to the remote store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// No upload pending
    #[default]
    Idle,
    /// Content transfer to the remote store is in progress
    Uploading,
    /// The remote store holds the latest local content
    Uploaded,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStatus::Idle => write!(f, "idle"),
            UploadStatus::Uploading => write!(f, "uploading"),
            UploadStatus::Uploaded => write!(f, "uploaded"),
        }
    }
}

/// An immutable, timestamped content reference
///
/// Versions are never mutated after creation; conflict resolution only
/// selects among them and discards the losers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersion {
    /// Identifier of this version
    id: VersionId,
    /// When this version's content was last modified
    modified_at: DateTime<Utc>,
    /// Fingerprint of this version's content
    fingerprint: Fingerprint,
}

impl FileVersion {
    /// Creates a new FileVersion
    pub fn new(id: VersionId, modified_at: DateTime<Utc>, fingerprint: Fingerprint) -> Self {
        Self {
            id,
            modified_at,
            fingerprint,
        }
    }

    /// Returns the version identifier
    pub fn id(&self) -> &VersionId {
        &self.id
    }

    /// Returns when this version was modified
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Returns the content fingerprint
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

/// One named document in the synchronized directory
///
/// Created when first observed in a metadata snapshot or when a local
/// upload begins; destroyed when deleted remotely and locally, or when
/// evicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudFile {
    /// File name; the identity of this record
    name: FileName,
    /// Location in the remote store
    url: RemoteUrl,
    /// Content size in bytes
    size_bytes: u64,
    /// When the document was created in the remote store
    created_at: DateTime<Utc>,
    /// When the document was last modified in the remote store
    modified_at: DateTime<Utc>,
    /// Download status of the content
    download_status: DownloadStatus,
    /// Upload status of the content
    upload_status: UploadStatus,
    /// The single authoritative version, if known
    current_version: Option<FileVersion>,
    /// Divergent versions awaiting conflict resolution
    pending_versions: Vec<FileVersion>,
}

impl CloudFile {
    /// Creates a CloudFile from remote metadata
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: FileName,
        url: RemoteUrl,
        size_bytes: u64,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
        download_status: DownloadStatus,
        upload_status: UploadStatus,
        current_version: Option<FileVersion>,
    ) -> Self {
        Self {
            name,
            url,
            size_bytes,
            created_at,
            modified_at,
            download_status,
            upload_status,
            current_version,
            pending_versions: Vec::new(),
        }
    }

    // --- Getters ---

    /// Returns the file name
    pub fn name(&self) -> &FileName {
        &self.name
    }

    /// Returns the remote location
    pub fn url(&self) -> &RemoteUrl {
        &self.url
    }

    /// Returns the size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Returns the creation date
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the modification date
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Returns the download status
    pub fn download_status(&self) -> DownloadStatus {
        self.download_status
    }

    /// Returns the upload status
    pub fn upload_status(&self) -> UploadStatus {
        self.upload_status
    }

    /// Returns the current version, if known
    pub fn current_version(&self) -> Option<&FileVersion> {
        self.current_version.as_ref()
    }

    /// Returns the versions awaiting conflict resolution
    pub fn pending_versions(&self) -> &[FileVersion] {
        &self.pending_versions
    }

    /// Returns the fingerprint of the current version, if known
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.current_version.as_ref().map(|v| v.fingerprint())
    }

    /// Returns true if any versions are awaiting resolution
    pub fn has_pending_versions(&self) -> bool {
        !self.pending_versions.is_empty()
    }

    // --- Mutation ---

    /// Sets the download status
    pub fn set_download_status(&mut self, status: DownloadStatus) {
        self.download_status = status;
    }

    /// Sets the upload status
    pub fn set_upload_status(&mut self, status: UploadStatus) {
        self.upload_status = status;
    }

    /// Updates size and modification date from fresh metadata
    pub fn update_metadata(&mut self, size_bytes: u64, modified_at: DateTime<Utc>) {
        self.size_bytes = size_bytes;
        self.modified_at = modified_at;
    }

    /// Records a divergent version awaiting resolution
    ///
    /// A version whose fingerprint equals the current version's is not
    /// divergent and is ignored.
    pub fn add_pending_version(&mut self, version: FileVersion) {
        if let Some(current) = &self.current_version {
            if current.fingerprint() == version.fingerprint() {
                return;
            }
        }
        if self.pending_versions.iter().any(|v| v.id() == version.id()) {
            return;
        }
        self.pending_versions.push(version);
    }

    /// Makes the given version current and discards all other versions
    ///
    /// The chosen version may be the existing current version (a no-op
    /// apart from clearing the pending list) or one of the pending
    /// versions.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownVersion` if the id is not part of this
    /// file's history.
    pub fn promote_version(&mut self, id: &VersionId) -> Result<(), DomainError> {
        if self.current_version.as_ref().is_some_and(|v| v.id() == id) {
            self.pending_versions.clear();
            return Ok(());
        }

        let position = self
            .pending_versions
            .iter()
            .position(|v| v.id() == id)
            .ok_or_else(|| DomainError::UnknownVersion {
                file: self.name.to_string(),
                version: id.to_string(),
            })?;

        let winner = self.pending_versions.swap_remove(position);
        self.modified_at = winner.modified_at();
        self.current_version = Some(winner);
        self.pending_versions.clear();
        Ok(())
    }
}
