//! Metadata source port (driven/secondary port)
//!
//! This module defines the interface for observing the remote container's
//! metadata: what files exist, their sizes, dates, transfer status, and
//! competing versions. The engine never reads file content through this
//! port; content flows through [`IDocumentStore`](super::IDocumentStore).
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific and don't need domain-level classification.
//! - Uses `#[async_trait]` for async trait methods.
//! - `RemoteItem` is a port-level record of one listed file; the watcher
//!   maps it onto the domain's `CloudFile`.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::domain::{
    DownloadStatus, FileName, FileVersion, IdentityToken, RemoteUrl, UploadStatus,
};

/// Which files a metadata query should return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataFilter {
    /// Every file in the synchronized directory
    All,
    /// Only files with the given extension (without the leading dot)
    WithExtension(String),
}

impl MetadataFilter {
    /// Returns true if a file with this name passes the filter
    pub fn matches(&self, name: &FileName) -> bool {
        match self {
            MetadataFilter::All => true,
            MetadataFilter::WithExtension(ext) => name.extension() == Some(ext.as_str()),
        }
    }
}

/// One file as listed by the remote metadata source
#[derive(Debug, Clone)]
pub struct RemoteItem {
    /// File name, unique within the synchronized directory
    pub name: FileName,
    /// Remote location of the file
    pub url: RemoteUrl,
    /// Size in bytes
    pub size: u64,
    /// Creation date
    pub created_at: DateTime<Utc>,
    /// Last modification date
    pub modified_at: DateTime<Utc>,
    /// Local presence of the content
    pub download_status: DownloadStatus,
    /// Transfer state of local edits
    pub upload_status: UploadStatus,
    /// The version currently presented by the store, if known
    pub current_version: Option<FileVersion>,
    /// Versions competing with the current one
    pub conflict_versions: Vec<FileVersion>,
}

/// Port trait for remote metadata observation
///
/// Implementations wrap a concrete metadata backend. The engine assumes
/// the backend reports a complete listing on every query; incremental
/// deltas are not part of this interface.
#[async_trait::async_trait]
pub trait IMetadataSource: Send + Sync {
    /// Lists the files currently visible in the synchronized directory
    ///
    /// Returns the complete listing passing `filter`, in no particular
    /// order. An empty vector means the directory is empty, not that the
    /// query failed.
    async fn query(&self, filter: &MetadataFilter) -> anyhow::Result<Vec<RemoteItem>>;

    /// Returns a stream of change ticks, if the backend can push them
    ///
    /// Each tick means "the listing may have changed; query again".
    /// `None` means the backend has no change notification and the
    /// watcher must fall back to interval polling.
    fn change_ticks(&self) -> Option<mpsc::Receiver<()>>;

    /// Returns the current identity token, or `None` when signed out
    ///
    /// A token different from the previously observed one means the
    /// backing account changed and all session state is stale.
    async fn identity_token(&self) -> anyhow::Result<Option<IdentityToken>>;

    /// Returns the container root URL, or `None` when unavailable
    async fn container_url(&self) -> anyhow::Result<Option<RemoteUrl>>;

    /// Asks the backend to start downloading the named file's content
    async fn start_download(&self, name: &FileName) -> anyhow::Result<()>;
}
