//! Conflict records
//!
//! A conflict exists when a file has versions beyond its current one, or
//! when a local copy and the remote copy carry the same modification date
//! with different content. The record captures everything a resolution
//! decision needs; it holds no file bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file::FileVersion;
use super::newtypes::{FileName, Fingerprint};

/// A local copy competing with the remote file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalContender {
    fingerprint: Fingerprint,
    modified_at: DateTime<Utc>,
}

impl LocalContender {
    pub fn new(fingerprint: Fingerprint, modified_at: DateTime<Utc>) -> Self {
        Self {
            fingerprint,
            modified_at,
        }
    }

    /// Returns the local content fingerprint
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns the local modification date
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }
}

/// One detected conflict on a named file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    name: FileName,
    pending: Vec<FileVersion>,
    local: Option<LocalContender>,
    detected_at: DateTime<Utc>,
}

impl ConflictRecord {
    /// Creates a record for a remote version conflict
    pub fn remote(name: FileName, pending: Vec<FileVersion>) -> Self {
        Self {
            name,
            pending,
            local: None,
            detected_at: Utc::now(),
        }
    }

    /// Creates a record for a local-versus-remote content conflict
    pub fn local(name: FileName, local: LocalContender) -> Self {
        Self {
            name,
            pending: Vec::new(),
            local: Some(local),
            detected_at: Utc::now(),
        }
    }

    /// Returns the conflicted file name
    pub fn name(&self) -> &FileName {
        &self.name
    }

    /// Returns the competing remote versions, if any
    pub fn pending(&self) -> &[FileVersion] {
        &self.pending
    }

    /// Returns the competing local copy, if any
    pub fn local_contender(&self) -> Option<&LocalContender> {
        self.local.as_ref()
    }

    /// Returns when the conflict was detected
    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    /// Returns true if nothing actually competes
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.local.is_none()
    }

    /// Returns the newest competing remote version, if any
    pub fn newest_pending(&self) -> Option<&FileVersion> {
        self.pending.iter().max_by_key(|v| v.modified_at())
    }
}
