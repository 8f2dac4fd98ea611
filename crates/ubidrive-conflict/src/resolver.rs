//! Conflict resolution executor
//!
//! Owns the set of unresolved [`ConflictRecord`]s and applies resolutions
//! by performing the actual store operations: make the chosen version the
//! document's content, then discard the competing ones. Resolution is
//! idempotent; resolving a file with no recorded conflict is a no-op.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use ubidrive_core::{
    domain::{ConflictRecord, FileName, FileVersion, VersionId},
    events::{EventBus, SyncEvent},
    ports::IDocumentStore,
};

use crate::{error::ConflictError, policy::ConflictPolicy};

/// Applies conflict resolutions with real store operations
pub struct ConflictResolver {
    store: Arc<dyn IDocumentStore>,
    events: EventBus,
    records: Mutex<BTreeMap<FileName, ConflictRecord>>,
}

impl ConflictResolver {
    pub fn new(store: Arc<dyn IDocumentStore>, events: EventBus) -> Self {
        Self {
            store,
            events,
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers a detected conflict and notifies subscribers
    ///
    /// A later record for the same file replaces the earlier one.
    pub async fn record(&self, record: ConflictRecord) {
        info!(
            file = %record.name(),
            contenders = record.pending().len(),
            has_local = record.local_contender().is_some(),
            "Recording conflict"
        );
        let mut records = self.records.lock().await;
        records.insert(record.name().clone(), record.clone());
        self.events.publish(SyncEvent::ConflictDetected { record });
    }

    /// Returns the unresolved competing versions of the named file
    ///
    /// Empty when no conflict is recorded, or when the recorded conflict
    /// has no remote contenders (local-versus-remote conflicts carry a
    /// local contender instead).
    pub async fn find_conflicts(&self, name: &FileName) -> Vec<FileVersion> {
        let records = self.records.lock().await;
        records
            .get(name)
            .map(|r| r.pending().to_vec())
            .unwrap_or_default()
    }

    /// Returns every unresolved conflict, in file-name order
    pub async fn pending_conflicts(&self) -> Vec<ConflictRecord> {
        let records = self.records.lock().await;
        records.values().cloned().collect()
    }

    /// Returns true if the named file has an unresolved conflict
    pub async fn has_conflict(&self, name: &FileName) -> bool {
        let records = self.records.lock().await;
        records.contains_key(name)
    }

    /// Keeps one version of the named file and discards the rest
    ///
    /// The chosen version becomes the document's content, every other
    /// version is removed, and the conflict record is cleared. Calling
    /// this for a file with no recorded conflict returns `Ok` without
    /// touching the store, which makes repeated resolution safe.
    pub async fn resolve(&self, name: &FileName, keep: &VersionId) -> Result<(), ConflictError> {
        let mut records = self.records.lock().await;

        let Some(record) = records.get(name) else {
            debug!(file = %name, "No conflict recorded, resolution is a no-op");
            return Ok(());
        };

        if !record.pending().iter().any(|v| v.id() == keep) {
            return Err(ConflictError::UnknownVersion {
                file: name.clone(),
                version: *keep,
            });
        }

        self.store
            .replace_with_version(name, keep)
            .await
            .map_err(|e| ConflictError::ResolutionFailed(format!("replace version: {e}")))?;
        self.store
            .remove_other_versions(name)
            .await
            .map_err(|e| ConflictError::ResolutionFailed(format!("remove versions: {e}")))?;

        records.remove(name);
        drop(records);

        info!(file = %name, kept = %keep, "Conflict resolved");
        self.events
            .publish(SyncEvent::ConflictResolved { name: name.clone() });
        Ok(())
    }

    /// Clears a record after the conflict was settled outside this resolver
    ///
    /// Used when the engine settles a local-versus-remote conflict by
    /// overwriting or discarding one side itself. Also a no-op when no
    /// conflict is recorded.
    pub async fn clear(&self, name: &FileName) {
        let mut records = self.records.lock().await;
        if records.remove(name).is_some() {
            drop(records);
            debug!(file = %name, "Conflict record cleared");
            self.events
                .publish(SyncEvent::ConflictResolved { name: name.clone() });
        }
    }

    /// Attempts automatic resolution of the named conflict under a policy
    ///
    /// Returns `Ok(true)` if the conflict was resolved, `Ok(false)` if the
    /// policy defers to the caller (or nothing is recorded).
    pub async fn apply_policy(
        &self,
        name: &FileName,
        policy: ConflictPolicy,
    ) -> Result<bool, ConflictError> {
        let chosen = {
            let records = self.records.lock().await;
            records.get(name).and_then(|r| policy.choose(r))
        };

        match chosen {
            Some(version) => {
                self.resolve(name, &version).await?;
                Ok(true)
            }
            None => {
                if policy == ConflictPolicy::Manual && self.has_conflict(name).await {
                    warn!(file = %name, "Conflict awaits manual resolution");
                }
                Ok(false)
            }
        }
    }
}
