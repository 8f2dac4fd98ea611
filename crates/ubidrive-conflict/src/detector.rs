//! Conflict detection logic
//!
//! Determines whether a local copy and the remote file genuinely compete
//! by comparing content fingerprints and modification dates within a
//! configurable tolerance, and surfaces competing remote versions.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use ubidrive_core::domain::{
    CloudFile, ConflictRecord, FileName, FileVersion, Fingerprint, LocalContender,
};

/// Outcome of comparing a local copy against the remote file
///
/// This is the per-file reconciliation ladder used both when uploading
/// offline documents and when evicting a file that still has a local copy.
#[derive(Debug, Clone)]
pub enum Reconciliation {
    /// Same content on both sides; the redundant copy can be discarded
    Identical,
    /// The local copy is newer and should replace the remote content
    LocalWins,
    /// The remote content is newer and the local copy should be discarded
    RemoteWins,
    /// Different content, dates too close to call; needs resolution
    Conflicted(ConflictRecord),
}

/// Detects conflicts between local and remote file versions
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    /// Dates closer together than this are indistinguishable
    date_tolerance: Duration,
}

impl ConflictDetector {
    /// Creates a detector with the given date tolerance in milliseconds
    pub fn new(date_tolerance_ms: u64) -> Self {
        Self {
            date_tolerance: Duration::milliseconds(date_tolerance_ms as i64),
        }
    }

    /// Returns true if two modification dates cannot be ordered reliably
    pub fn dates_indistinguishable(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        (a - b).abs() <= self.date_tolerance
    }

    /// Compares a local copy against the remote file's current state
    ///
    /// The ladder, in order:
    /// 1. Equal fingerprints mean the copies are the same document;
    ///    whichever side is redundant can go.
    /// 2. Distinguishable dates mean the newer side wins.
    /// 3. Otherwise the copies genuinely compete and a conflict record
    ///    is produced for resolution.
    ///
    /// A remote file with no known fingerprint cannot be proven identical
    /// and falls through to the date comparison.
    pub fn reconcile(&self, remote: &CloudFile, local: &LocalContender) -> Reconciliation {
        self.reconcile_parts(remote.name(), remote.fingerprint(), remote.modified_at(), local)
    }

    /// Same ladder as [`reconcile`](Self::reconcile), without a full entity
    ///
    /// Used when the remote side is known only through store queries
    /// (fingerprint and modification date) rather than a listed file.
    pub fn reconcile_parts(
        &self,
        name: &FileName,
        remote_fingerprint: Option<&Fingerprint>,
        remote_date: DateTime<Utc>,
        local: &LocalContender,
    ) -> Reconciliation {
        if remote_fingerprint == Some(local.fingerprint()) {
            debug!(file = %name, "Local and remote content identical");
            return Reconciliation::Identical;
        }

        let local_date = local.modified_at();

        if !self.dates_indistinguishable(remote_date, local_date) {
            return if local_date > remote_date {
                debug!(file = %name, "Local copy is newer");
                Reconciliation::LocalWins
            } else {
                debug!(file = %name, "Remote content is newer");
                Reconciliation::RemoteWins
            };
        }

        info!(
            file = %name,
            local_date = %local_date,
            remote_date = %remote_date,
            "Conflict detected: different content, indistinguishable dates"
        );
        Reconciliation::Conflicted(ConflictRecord::local(name.clone(), local.clone()))
    }

    /// Surfaces the remote versions competing with a file's current one
    ///
    /// Returns `None` when the file has no pending versions.
    pub fn check_remote_versions(&self, file: &CloudFile) -> Option<ConflictRecord> {
        if !file.has_pending_versions() {
            return None;
        }

        info!(
            file = %file.name(),
            contenders = file.pending_versions().len(),
            "Remote version conflict detected"
        );
        Some(ConflictRecord::remote(
            file.name().clone(),
            file.pending_versions().to_vec(),
        ))
    }

    /// Returns the unresolved versions of a file, current one excluded
    pub fn unresolved_versions(&self, file: &CloudFile) -> Vec<FileVersion> {
        file.pending_versions().to_vec()
    }

    /// Convenience check for raw fingerprints without a domain entity
    pub fn contents_identical(a: &Fingerprint, b: &Fingerprint) -> bool {
        a == b
    }
}
