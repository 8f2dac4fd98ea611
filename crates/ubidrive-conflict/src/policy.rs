//! Resolution policy
//!
//! Decides whether a detected conflict is resolved automatically or handed
//! to the caller. The policy is read from the `conflicts.default_strategy`
//! configuration key.

use serde::{Deserialize, Serialize};
use tracing::trace;

use ubidrive_core::domain::{ConflictRecord, VersionId};

/// How detected conflicts are resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the version with the newest modification date automatically
    #[default]
    LatestWins,
    /// Record the conflict and wait for an explicit resolution
    Manual,
}

impl ConflictPolicy {
    /// Parses a policy from its configuration string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "latest_wins" => Some(ConflictPolicy::LatestWins),
            "manual" => Some(ConflictPolicy::Manual),
            _ => None,
        }
    }

    /// Picks the version to keep for a record, if the policy is automatic
    ///
    /// Returns `None` under `Manual`, or when the record has no competing
    /// remote versions to choose between.
    pub fn choose(&self, record: &ConflictRecord) -> Option<VersionId> {
        match self {
            ConflictPolicy::Manual => None,
            ConflictPolicy::LatestWins => {
                let chosen = record.newest_pending().map(|v| *v.id());
                trace!(
                    file = %record.name(),
                    chosen = ?chosen,
                    "Latest-wins policy evaluated"
                );
                chosen
            }
        }
    }
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::LatestWins => write!(f, "latest_wins"),
            ConflictPolicy::Manual => write!(f, "manual"),
        }
    }
}
