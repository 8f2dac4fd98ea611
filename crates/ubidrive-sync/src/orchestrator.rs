//! Synchronization orchestration
//!
//! The [`SyncOrchestrator`] is the use-case layer: it owns the session
//! state, guards every document operation behind an availability check
//! and the per-file in-flight table, drives the metadata watcher, and
//! routes detected conflicts through the resolver.
//!
//! ## Operation lifecycle
//!
//! ```text
//! request ──→ ensure_available ──→ session.begin ──→ store/metadata I/O
//!                                        │                    │
//!                                   Busy/Conflict      succeed / fail
//!                                        │                    │
//!                                     caller ←── OperationCompleted event
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};

use ubidrive_conflict::{ConflictDetector, ConflictPolicy, ConflictResolver, Reconciliation};
use ubidrive_core::{
    config::{Config, PendingPolicy, SyncConfig},
    domain::{
        ChangeDetector, CloudFile, DownloadStatus, FileListSnapshot, FileName, FileVersion,
        LocalContender, OperationError, OperationKind, SessionError, SyncSession, VersionId,
    },
    events::{EventBus, SyncEvent},
    ports::{DocumentState, IDocumentStore, IMetadataSource, MetadataFilter, StoreLocation},
};

use crate::availability::AvailabilityMonitor;
use crate::watcher::MetadataWatcher;

/// Outcome of one offline-upload batch
///
/// Every local file gets exactly one terminal disposition; the counters
/// partition the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files whose content reached the remote store
    pub uploaded: usize,
    /// Files discarded because the remote copy was identical or newer
    pub skipped: usize,
    /// Files that hit an error and keep their local copy
    pub failed: usize,
    /// Files parked as conflicts awaiting resolution
    pub conflicts: usize,
    /// Human-readable error messages, one per failed or skipped-in-error file
    pub errors: Vec<String>,
}

impl BatchSummary {
    /// Total number of files the batch touched
    pub fn total(&self) -> usize {
        self.uploaded + self.skipped + self.failed + self.conflicts
    }
}

/// Coordinates document operations against the remote store
///
/// Cheap to share behind an `Arc`; all interior state is behind async
/// locks. One orchestrator per synchronized container.
pub struct SyncOrchestrator {
    metadata: Arc<dyn IMetadataSource>,
    store: Arc<dyn IDocumentStore>,
    availability: AvailabilityMonitor,
    resolver: Arc<ConflictResolver>,
    detector: ConflictDetector,
    events: EventBus,
    config: SyncConfig,
    policy: ConflictPolicy,
    session: Arc<Mutex<SyncSession>>,
    queue: Arc<Notify>,
    watcher: Mutex<MetadataWatcher>,
}

impl SyncOrchestrator {
    pub fn new(
        metadata: Arc<dyn IMetadataSource>,
        store: Arc<dyn IDocumentStore>,
        events: EventBus,
        config: &Config,
    ) -> Self {
        let policy = ConflictPolicy::parse(&config.conflicts.default_strategy)
            .unwrap_or_default();
        let filter = match &config.sync.file_extension {
            Some(ext) => MetadataFilter::WithExtension(ext.clone()),
            None => MetadataFilter::All,
        };
        let watcher = MetadataWatcher::new(metadata.clone(), events.clone(), filter, &config.sync);
        Self {
            availability: AvailabilityMonitor::new(metadata.clone(), events.clone()),
            resolver: Arc::new(ConflictResolver::new(store.clone(), events.clone())),
            detector: ConflictDetector::new(config.sync.date_tolerance_ms),
            metadata,
            store,
            events,
            config: config.sync.clone(),
            policy,
            session: Arc::new(Mutex::new(SyncSession::new())),
            queue: Arc::new(Notify::new()),
            watcher: Mutex::new(watcher),
        }
    }

    /// The conflict resolver backing this orchestrator
    pub fn resolver(&self) -> &Arc<ConflictResolver> {
        &self.resolver
    }

    /// The event bus this orchestrator publishes to
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ========================================================================
    // Session setup and teardown
    // ========================================================================

    /// Performs the initial synchronization pass
    ///
    /// Checks availability, starts the metadata watcher, waits for the
    /// first listing, merges it with local offline documents, and returns
    /// the merged name list. Later snapshots are consumed in the
    /// background and surface as [`SyncEvent::FileListChanged`].
    pub async fn initial_sync(&self) -> Result<Vec<FileName>, OperationError> {
        self.ensure_available().await?;

        let mut snapshots = self.watcher.lock().await.start();
        let first = snapshots.recv().await.ok_or(OperationError::Unavailable)?;

        let local = self
            .store
            .list(StoreLocation::Local)
            .await
            .map_err(OperationError::io)?;

        let mut names: Vec<FileName> = first.names().cloned().collect();
        for name in local {
            if !first.contains(&name) {
                names.push(name);
            }
        }
        names.sort();

        self.absorb_snapshot(first).await;
        self.spawn_snapshot_drain(snapshots);

        info!(files = names.len(), "Initial synchronization complete");
        Ok(names)
    }

    /// Stops background watching; in-flight operations finish normally
    pub async fn shutdown(&self) {
        self.watcher.lock().await.stop();
        info!("Orchestrator shut down");
    }

    /// Errors recorded on the session so far, oldest first
    pub async fn session_errors(&self) -> Vec<SessionError> {
        self.session.lock().await.errors().to_vec()
    }

    // ========================================================================
    // Document operations
    // ========================================================================

    /// Writes content to the remote document and closes it
    ///
    /// Creates the document if it does not exist yet.
    pub async fn save_and_close(
        &self,
        name: &FileName,
        content: &[u8],
    ) -> Result<(), OperationError> {
        self.ensure_available().await?;
        self.begin(name, OperationKind::Save).await?;

        let result = async {
            self.store
                .save(StoreLocation::Remote, name, content)
                .await
                .map_err(OperationError::io)?;
            self.store
                .close(StoreLocation::Remote, name)
                .await
                .map_err(OperationError::io)
        }
        .await;

        self.finish(name, OperationKind::Save, &result).await;
        result
    }

    /// Reads the full content of a remote document
    ///
    /// A missing document is created empty rather than reported as an
    /// error, so a first retrieve always yields a usable document. If the
    /// content is known to still live remote-only, a download is
    /// requested first.
    pub async fn retrieve(&self, name: &FileName) -> Result<Vec<u8>, OperationError> {
        self.ensure_available().await?;
        self.begin(name, OperationKind::Retrieve).await?;

        let result = async {
            let exists = self
                .store
                .exists(StoreLocation::Remote, name)
                .await
                .map_err(OperationError::io)?;
            if !exists {
                debug!(file = %name, "Document absent, creating empty");
                self.store
                    .create(StoreLocation::Remote, name, &[])
                    .await
                    .map_err(OperationError::io)?;
                return Ok(Vec::new());
            }

            let needs_download = {
                let session = self.session.lock().await;
                session
                    .previous_snapshot()
                    .and_then(|s| s.get(name))
                    .is_some_and(|f| !f.download_status().is_local())
            };
            if needs_download {
                self.metadata
                    .start_download(name)
                    .await
                    .map_err(OperationError::io)?;
            }

            self.store
                .open(StoreLocation::Remote, name)
                .await
                .map_err(OperationError::io)
        }
        .await;

        self.finish(name, OperationKind::Retrieve, &result).await;
        result
    }

    /// Removes a document from the remote store and any local copy
    pub async fn delete(&self, name: &FileName) -> Result<(), OperationError> {
        self.ensure_available().await?;
        self.begin(name, OperationKind::Delete).await?;

        let result = async {
            let exists = self
                .store
                .exists(StoreLocation::Remote, name)
                .await
                .map_err(OperationError::io)?;
            if !exists {
                return Err(OperationError::NotFound(name.clone()));
            }
            self.store
                .delete(StoreLocation::Remote, name)
                .await
                .map_err(OperationError::io)?;

            if self
                .store
                .exists(StoreLocation::Local, name)
                .await
                .map_err(OperationError::io)?
            {
                self.store
                    .delete(StoreLocation::Local, name)
                    .await
                    .map_err(OperationError::io)?;
            }
            Ok(())
        }
        .await;

        self.finish(name, OperationKind::Delete, &result).await;
        result
    }

    /// Renames a remote document; the target name must be free
    ///
    /// Both names are claimed in the in-flight table for the duration, so
    /// a concurrent operation cannot create the target mid-rename.
    pub async fn rename(&self, from: &FileName, to: &FileName) -> Result<(), OperationError> {
        self.ensure_available().await?;
        self.begin(from, OperationKind::Rename).await?;
        if let Err(err) = self.reserve_target(to, OperationKind::Rename).await {
            let result = Err(err);
            self.finish(from, OperationKind::Rename, &result).await;
            return result;
        }

        let result = async {
            self.check_source_and_target(from, to).await?;
            self.store
                .rename(StoreLocation::Remote, from, to)
                .await
                .map_err(OperationError::io)
        }
        .await;

        self.release_target(to).await;
        self.finish(from, OperationKind::Rename, &result).await;
        result
    }

    /// Copies a remote document under a new name; the target must be free
    ///
    /// Claims both names like [`rename`](Self::rename).
    pub async fn duplicate(&self, from: &FileName, to: &FileName) -> Result<(), OperationError> {
        self.ensure_available().await?;
        self.begin(from, OperationKind::Duplicate).await?;
        if let Err(err) = self.reserve_target(to, OperationKind::Duplicate).await {
            let result = Err(err);
            self.finish(from, OperationKind::Duplicate, &result).await;
            return result;
        }

        let result = async {
            self.check_source_and_target(from, to).await?;
            let content = self
                .store
                .open(StoreLocation::Remote, from)
                .await
                .map_err(OperationError::io)?;
            self.store
                .create(StoreLocation::Remote, to, &content)
                .await
                .map_err(OperationError::io)
        }
        .await;

        self.release_target(to).await;
        self.finish(from, OperationKind::Duplicate, &result).await;
        result
    }

    /// Moves a document out of the remote store into the offline directory
    ///
    /// When a local copy already exists the two are reconciled first: an
    /// identical or older remote copy is simply dropped, a newer remote
    /// copy overwrites the local one, and genuinely competing copies are
    /// parked as a conflict.
    pub async fn evict(&self, name: &FileName) -> Result<(), OperationError> {
        self.ensure_available().await?;
        self.begin(name, OperationKind::Evict).await?;

        let result = self.evict_inner(name).await;
        match &result {
            Err(OperationError::Conflict(_)) => {
                self.park_conflict(name, OperationKind::Evict).await;
            }
            _ => self.finish(name, OperationKind::Evict, &result).await,
        }
        result
    }

    async fn evict_inner(&self, name: &FileName) -> Result<(), OperationError> {
        if !self
            .store
            .exists(StoreLocation::Remote, name)
            .await
            .map_err(OperationError::io)?
        {
            return Err(OperationError::NotFound(name.clone()));
        }

        let has_local = self
            .store
            .exists(StoreLocation::Local, name)
            .await
            .map_err(OperationError::io)?;
        if !has_local {
            return self
                .store
                .move_to(name, StoreLocation::Remote, StoreLocation::Local)
                .await
                .map_err(OperationError::io);
        }

        match self.reconcile_against_remote(name).await? {
            Reconciliation::Identical | Reconciliation::LocalWins => {
                debug!(file = %name, "Keeping local copy, dropping remote");
                self.store
                    .delete(StoreLocation::Remote, name)
                    .await
                    .map_err(OperationError::io)
            }
            Reconciliation::RemoteWins => {
                debug!(file = %name, "Remote copy is newer, replacing local");
                let content = self
                    .store
                    .open(StoreLocation::Remote, name)
                    .await
                    .map_err(OperationError::io)?;
                self.store
                    .save(StoreLocation::Local, name, &content)
                    .await
                    .map_err(OperationError::io)?;
                self.store
                    .delete(StoreLocation::Remote, name)
                    .await
                    .map_err(OperationError::io)
            }
            Reconciliation::Conflicted(record) => {
                self.resolver.record(record).await;
                Err(OperationError::Conflict(name.clone()))
            }
        }
    }

    /// Uploads every document in the local offline directory
    ///
    /// Each file is reconciled against the remote store and resolved per
    /// the ladder; `progress` is invoked exactly once per file with its
    /// terminal disposition. Completion is the returned summary.
    pub async fn upload_local_offline_documents<F>(
        &self,
        mut progress: F,
    ) -> Result<BatchSummary, OperationError>
    where
        F: FnMut(&FileName, &Result<(), OperationError>),
    {
        self.ensure_available().await?;

        let names = self
            .store
            .list(StoreLocation::Local)
            .await
            .map_err(OperationError::io)?;
        info!(files = names.len(), "Uploading offline documents");

        let mut summary = BatchSummary::default();
        for name in &names {
            if name.is_hidden() && !self.config.sync_hidden_files {
                let err = OperationError::InvalidName(format!("hidden file: {name}"));
                warn!(file = %name, "Skipping hidden offline document");
                summary.skipped += 1;
                summary.errors.push(err.to_string());
                progress(name, &Err(err));
                continue;
            }

            if let Err(err) = self.session.lock().await.begin(name, OperationKind::Upload) {
                summary.failed += 1;
                summary.errors.push(err.to_string());
                progress(name, &Err(err));
                continue;
            }

            let outcome = self.upload_one(name).await;
            match &outcome {
                Ok(UploadDisposition::Uploaded) => {
                    summary.uploaded += 1;
                    self.finish(name, OperationKind::Upload, &Ok(())).await;
                    progress(name, &Ok(()));
                }
                Ok(UploadDisposition::Discarded) => {
                    summary.skipped += 1;
                    self.finish(name, OperationKind::Upload, &Ok(())).await;
                    progress(name, &Ok(()));
                }
                Ok(UploadDisposition::Conflicted) => {
                    summary.conflicts += 1;
                    self.park_conflict(name, OperationKind::Upload).await;
                    progress(name, &Err(OperationError::Conflict(name.clone())));
                }
                Err(err) => {
                    summary.failed += 1;
                    summary.errors.push(err.to_string());
                    let failure: Result<(), OperationError> = Err(err.clone());
                    self.finish(name, OperationKind::Upload, &failure).await;
                    progress(name, &failure);
                }
            }
        }

        info!(
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            failed = summary.failed,
            conflicts = summary.conflicts,
            "Offline upload batch complete"
        );
        Ok(summary)
    }

    async fn upload_one(&self, name: &FileName) -> Result<UploadDisposition, OperationError> {
        let exists = self
            .store
            .exists(StoreLocation::Remote, name)
            .await
            .map_err(OperationError::io)?;
        if !exists {
            self.store
                .move_to(name, StoreLocation::Local, StoreLocation::Remote)
                .await
                .map_err(OperationError::io)?;
            return Ok(UploadDisposition::Uploaded);
        }

        match self.reconcile_against_remote(name).await? {
            Reconciliation::Identical | Reconciliation::RemoteWins => {
                debug!(file = %name, "Local copy redundant, discarding");
                self.store
                    .delete(StoreLocation::Local, name)
                    .await
                    .map_err(OperationError::io)?;
                Ok(UploadDisposition::Discarded)
            }
            Reconciliation::LocalWins => {
                let content = self
                    .store
                    .open(StoreLocation::Local, name)
                    .await
                    .map_err(OperationError::io)?;
                self.store
                    .save(StoreLocation::Remote, name, &content)
                    .await
                    .map_err(OperationError::io)?;
                self.store
                    .delete(StoreLocation::Local, name)
                    .await
                    .map_err(OperationError::io)?;
                Ok(UploadDisposition::Uploaded)
            }
            Reconciliation::Conflicted(record) => {
                self.resolver.record(record).await;
                Ok(UploadDisposition::Conflicted)
            }
        }
    }

    // ========================================================================
    // Conflict handling
    // ========================================================================

    /// Competing versions recorded for the named file
    pub async fn find_conflicts(&self, name: &FileName) -> Vec<FileVersion> {
        self.resolver.find_conflicts(name).await
    }

    /// Resolves a version conflict by promoting the chosen remote version
    pub async fn resolve_conflict(
        &self,
        name: &FileName,
        keep: &VersionId,
    ) -> Result<(), OperationError> {
        self.ensure_available().await?;
        self.begin(name, OperationKind::Resolve).await?;

        let result = self
            .resolver
            .resolve(name, keep)
            .await
            .map_err(|e| OperationError::Io(e.to_string()));

        self.finish(name, OperationKind::Resolve, &result).await;
        result
    }

    /// Resolves a local-versus-remote conflict in favor of the local copy
    pub async fn resolve_keeping_local(&self, name: &FileName) -> Result<(), OperationError> {
        self.ensure_available().await?;
        self.begin(name, OperationKind::Resolve).await?;

        let result = async {
            let content = self
                .store
                .open(StoreLocation::Local, name)
                .await
                .map_err(OperationError::io)?;
            self.store
                .save(StoreLocation::Remote, name, &content)
                .await
                .map_err(OperationError::io)?;
            self.store
                .delete(StoreLocation::Local, name)
                .await
                .map_err(OperationError::io)?;
            self.resolver.clear(name).await;
            Ok(())
        }
        .await;

        self.finish(name, OperationKind::Resolve, &result).await;
        result
    }

    /// Resolves a local-versus-remote conflict in favor of the remote copy
    pub async fn resolve_keeping_remote(&self, name: &FileName) -> Result<(), OperationError> {
        self.ensure_available().await?;
        self.begin(name, OperationKind::Resolve).await?;

        let result = async {
            if self
                .store
                .exists(StoreLocation::Local, name)
                .await
                .map_err(OperationError::io)?
            {
                self.store
                    .delete(StoreLocation::Local, name)
                    .await
                    .map_err(OperationError::io)?;
            }
            self.resolver.clear(name).await;
            Ok(())
        }
        .await;

        self.finish(name, OperationKind::Resolve, &result).await;
        result
    }

    // ========================================================================
    // Metadata queries
    // ========================================================================

    /// Returns true if the named document exists in the remote store
    pub async fn file_exists(&self, name: &FileName) -> Result<bool, OperationError> {
        self.ensure_available().await?;
        self.store
            .exists(StoreLocation::Remote, name)
            .await
            .map_err(OperationError::io)
    }

    /// Names of all remote documents, from the latest snapshot when one
    /// exists and from the store otherwise
    pub async fn list_files(&self) -> Result<Vec<FileName>, OperationError> {
        self.ensure_available().await?;
        if let Some(snapshot) = self.session.lock().await.previous_snapshot() {
            return Ok(snapshot.names().cloned().collect());
        }
        self.store
            .list(StoreLocation::Remote)
            .await
            .map_err(OperationError::io)
    }

    /// Size in bytes of the named document, per the latest snapshot
    pub async fn file_size(&self, name: &FileName) -> Result<u64, OperationError> {
        self.snapshot_file(name, |f| f.size_bytes()).await
    }

    /// Modification date of the named document, per the latest snapshot
    pub async fn modified_date(
        &self,
        name: &FileName,
    ) -> Result<chrono::DateTime<chrono::Utc>, OperationError> {
        self.snapshot_file(name, |f| f.modified_at()).await
    }

    /// Creation date of the named document, per the latest snapshot
    pub async fn created_date(
        &self,
        name: &FileName,
    ) -> Result<chrono::DateTime<chrono::Utc>, OperationError> {
        self.snapshot_file(name, |f| f.created_at()).await
    }

    /// Lifecycle state of the named remote document
    pub async fn document_state(&self, name: &FileName) -> Result<DocumentState, OperationError> {
        self.ensure_available().await?;
        self.store
            .document_state(name)
            .await
            .map_err(OperationError::io)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Reads one field of a file from the latest snapshot
    async fn snapshot_file<T>(
        &self,
        name: &FileName,
        read: impl Fn(&CloudFile) -> T,
    ) -> Result<T, OperationError> {
        self.ensure_available().await?;
        self.session
            .lock()
            .await
            .previous_snapshot()
            .and_then(|s| s.get(name))
            .map(read)
            .ok_or_else(|| OperationError::NotFound(name.clone()))
    }

    /// Refuses to proceed while the remote store is unreachable
    ///
    /// An identity change drains the session first: operations begun
    /// under the previous identity must not complete under the new one.
    async fn ensure_available(&self) -> Result<(), OperationError> {
        let check = self.availability.check().await;
        if check.token_changed {
            let drained = self.session.lock().await.invalidate();
            if !drained.is_empty() {
                warn!(
                    drained = drained.len(),
                    "Identity changed, drained in-flight operations"
                );
            }
            self.queue.notify_waiters();
        }
        if check.available {
            Ok(())
        } else {
            Err(OperationError::Unavailable)
        }
    }

    /// Claims the per-file slot, waiting if the pending policy queues
    async fn begin(&self, name: &FileName, kind: OperationKind) -> Result<(), OperationError> {
        loop {
            let released = self.queue.notified();
            match self.session.lock().await.begin(name, kind) {
                Err(OperationError::Busy(_)) if self.config.pending_policy == PendingPolicy::Queue => {
                    debug!(file = %name, kind = %kind, "Slot busy, queueing");
                }
                other => return other,
            }
            released.await;
        }
    }

    /// Claims the target name of a two-name operation
    ///
    /// Unlike [`begin`](Self::begin) this never queues: waiting on the
    /// target while holding the source could deadlock against an operation
    /// holding the names the other way around.
    async fn reserve_target(
        &self,
        to: &FileName,
        kind: OperationKind,
    ) -> Result<(), OperationError> {
        self.session.lock().await.begin(to, kind)
    }

    /// Frees a claimed target name
    async fn release_target(&self, to: &FileName) {
        self.session.lock().await.succeed(to);
        self.queue.notify_waiters();
    }

    /// Settles the operation on the session and publishes its completion
    async fn finish<T>(
        &self,
        name: &FileName,
        kind: OperationKind,
        result: &Result<T, OperationError>,
    ) {
        {
            let mut session = self.session.lock().await;
            match result {
                Ok(_) => session.succeed(name),
                Err(err) => session.fail(name, err.to_string()),
            }
        }
        self.queue.notify_waiters();
        self.events.publish(SyncEvent::OperationCompleted {
            name: name.clone(),
            kind,
            success: result.is_ok(),
        });
    }

    /// Parks the operation as conflicted instead of settling it
    async fn park_conflict(&self, name: &FileName, kind: OperationKind) {
        self.session.lock().await.conflict(name);
        self.events.publish(SyncEvent::OperationCompleted {
            name: name.clone(),
            kind,
            success: false,
        });
    }

    /// Runs the reconciliation ladder for a file present on both sides
    async fn reconcile_against_remote(
        &self,
        name: &FileName,
    ) -> Result<Reconciliation, OperationError> {
        let local = LocalContender::new(
            self.store
                .content_fingerprint(StoreLocation::Local, name)
                .await
                .map_err(OperationError::io)?,
            self.store
                .modified_date(StoreLocation::Local, name)
                .await
                .map_err(OperationError::io)?,
        );
        let remote_fingerprint = self
            .store
            .content_fingerprint(StoreLocation::Remote, name)
            .await
            .map_err(OperationError::io)?;
        let remote_date = self
            .store
            .modified_date(StoreLocation::Remote, name)
            .await
            .map_err(OperationError::io)?;

        Ok(self
            .detector
            .reconcile_parts(name, Some(&remote_fingerprint), remote_date, &local))
    }

    /// Source must exist remotely and target must be free
    async fn check_source_and_target(
        &self,
        from: &FileName,
        to: &FileName,
    ) -> Result<(), OperationError> {
        if !self
            .store
            .exists(StoreLocation::Remote, from)
            .await
            .map_err(OperationError::io)?
        {
            return Err(OperationError::NotFound(from.clone()));
        }
        if self
            .store
            .exists(StoreLocation::Remote, to)
            .await
            .map_err(OperationError::io)?
        {
            return Err(OperationError::AlreadyExists(to.clone()));
        }
        Ok(())
    }

    /// Stores a snapshot and surfaces its remote-version conflicts
    async fn absorb_snapshot(&self, snapshot: FileListSnapshot) {
        Self::ingest_snapshot(
            snapshot,
            &self.session,
            &self.events,
            &self.resolver,
            &self.detector,
            self.policy,
        )
        .await;
    }

    /// Consumes later watcher snapshots in the background
    fn spawn_snapshot_drain(&self, mut snapshots: mpsc::Receiver<FileListSnapshot>) {
        let session = self.session.clone();
        let events = self.events.clone();
        let resolver = self.resolver.clone();
        let detector = self.detector.clone();
        let policy = self.policy;

        tokio::spawn(async move {
            while let Some(snapshot) = snapshots.recv().await {
                Self::ingest_snapshot(snapshot, &session, &events, &resolver, &detector, policy)
                    .await;
            }
            debug!("Snapshot stream ended");
        });
    }

    async fn ingest_snapshot(
        snapshot: FileListSnapshot,
        session: &Mutex<SyncSession>,
        events: &EventBus,
        resolver: &ConflictResolver,
        detector: &ConflictDetector,
        policy: ConflictPolicy,
    ) {
        let (delta, visible) = {
            let mut session = session.lock().await;
            let delta = match session.previous_snapshot() {
                Some(previous) => ChangeDetector::diff(previous, &snapshot),
                None => ChangeDetector::diff(&FileListSnapshot::new(), &snapshot),
            };
            let visible: Vec<CloudFile> = snapshot
                .files()
                .filter(|f| f.download_status() == DownloadStatus::Current)
                .cloned()
                .collect();
            session.store_snapshot(snapshot);
            (delta, visible)
        };

        // The visible list carries resident files only; a file listed
        // remotely but not yet downloaded joins it on a later refresh,
        // once the kicked download completes.
        if !delta.is_empty() {
            events.publish(SyncEvent::FileListChanged {
                files: visible,
                added: resident_names(&delta.added),
                removed: delta.removed_names(),
                changed: resident_names(&delta.changed),
            });
        }

        for file in delta.added.iter().chain(delta.changed.iter()) {
            if let Some(record) = detector.check_remote_versions(file) {
                let name = record.name().clone();
                resolver.record(record).await;
                match resolver.apply_policy(&name, policy).await {
                    Ok(true) => debug!(file = %name, "Version conflict auto-resolved"),
                    Ok(false) => {}
                    Err(err) => warn!(file = %name, error = %err, "Auto-resolution failed"),
                }
            }
        }
    }
}

/// Terminal disposition of one file in an upload batch
enum UploadDisposition {
    Uploaded,
    Discarded,
    Conflicted,
}

/// Names of the delta files whose content is resident locally
fn resident_names(files: &[CloudFile]) -> Vec<FileName> {
    files
        .iter()
        .filter(|f| f.download_status() == DownloadStatus::Current)
        .map(|f| f.name().clone())
        .collect()
}
