//! Integration test: SyncOrchestrator → in-memory store and metadata
//!
//! Drives the full operation flow against in-memory port
//! implementations: initial sync, save/retrieve round-trips, the
//! offline-upload reconciliation ladder, busy rejection, and conflict
//! resolution.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::bail;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use ubidrive_core::{
    config::Config,
    domain::{
        DownloadStatus, FileName, FileVersion, Fingerprint, IdentityToken, OperationError,
        RemoteUrl, UploadStatus, VersionId,
    },
    events::{EventBus, SyncEvent},
    ports::{
        DocumentState, IDocumentStore, IMetadataSource, MetadataFilter, RemoteItem, StoreLocation,
    },
};
use ubidrive_sync::SyncOrchestrator;

// ============================================================================
// In-memory ports
// ============================================================================

#[derive(Clone)]
struct Doc {
    content: Vec<u8>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryStore {
    local: StdMutex<BTreeMap<FileName, Doc>>,
    remote: StdMutex<BTreeMap<FileName, Doc>>,
    // Files whose save always errors, to exercise failure paths
    failing: StdMutex<Vec<FileName>>,
    // Artificial latency applied to saves, to exercise busy rejection
    save_delay: StdMutex<Option<Duration>>,
    version_ops: StdMutex<Vec<String>>,
}

impl MemoryStore {
    fn put(&self, location: StoreLocation, name: &str, content: &[u8], modified: DateTime<Utc>) {
        let doc = Doc {
            content: content.to_vec(),
            created: modified,
            modified,
        };
        self.docs(location)
            .lock()
            .unwrap()
            .insert(FileName::new(name).unwrap(), doc);
    }

    fn fail_saves_for(&self, name: &str) {
        self.failing
            .lock()
            .unwrap()
            .push(FileName::new(name).unwrap());
    }

    fn delay_saves(&self, delay: Duration) {
        *self.save_delay.lock().unwrap() = Some(delay);
    }

    fn content(&self, location: StoreLocation, name: &str) -> Option<Vec<u8>> {
        self.docs(location)
            .lock()
            .unwrap()
            .get(&FileName::new(name).unwrap())
            .map(|d| d.content.clone())
    }

    fn version_ops(&self) -> Vec<String> {
        self.version_ops.lock().unwrap().clone()
    }

    fn docs(&self, location: StoreLocation) -> &StdMutex<BTreeMap<FileName, Doc>> {
        match location {
            StoreLocation::Local => &self.local,
            StoreLocation::Remote => &self.remote,
        }
    }

    fn get(&self, location: StoreLocation, name: &FileName) -> anyhow::Result<Doc> {
        match self.docs(location).lock().unwrap().get(name) {
            Some(doc) => Ok(doc.clone()),
            None => bail!("no such document: {name}"),
        }
    }
}

#[async_trait::async_trait]
impl IDocumentStore for MemoryStore {
    async fn open(&self, location: StoreLocation, name: &FileName) -> anyhow::Result<Vec<u8>> {
        Ok(self.get(location, name)?.content)
    }

    async fn create(
        &self,
        location: StoreLocation,
        name: &FileName,
        content: &[u8],
    ) -> anyhow::Result<()> {
        let mut docs = self.docs(location).lock().unwrap();
        if docs.contains_key(name) {
            bail!("document already exists: {name}");
        }
        let now = Utc::now();
        docs.insert(
            name.clone(),
            Doc {
                content: content.to_vec(),
                created: now,
                modified: now,
            },
        );
        Ok(())
    }

    async fn save(
        &self,
        location: StoreLocation,
        name: &FileName,
        content: &[u8],
    ) -> anyhow::Result<()> {
        let delay = *self.save_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(name) {
            bail!("simulated write failure: {name}");
        }
        let mut docs = self.docs(location).lock().unwrap();
        let now = Utc::now();
        let created = docs.get(name).map(|d| d.created).unwrap_or(now);
        docs.insert(
            name.clone(),
            Doc {
                content: content.to_vec(),
                created,
                modified: now,
            },
        );
        Ok(())
    }

    async fn close(&self, _location: StoreLocation, _name: &FileName) -> anyhow::Result<()> {
        Ok(())
    }

    async fn delete(&self, location: StoreLocation, name: &FileName) -> anyhow::Result<()> {
        match self.docs(location).lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => bail!("no such document: {name}"),
        }
    }

    async fn exists(&self, location: StoreLocation, name: &FileName) -> anyhow::Result<bool> {
        Ok(self.docs(location).lock().unwrap().contains_key(name))
    }

    async fn list(&self, location: StoreLocation) -> anyhow::Result<Vec<FileName>> {
        Ok(self.docs(location).lock().unwrap().keys().cloned().collect())
    }

    async fn rename(
        &self,
        location: StoreLocation,
        from: &FileName,
        to: &FileName,
    ) -> anyhow::Result<()> {
        let mut docs = self.docs(location).lock().unwrap();
        if docs.contains_key(to) {
            bail!("document already exists: {to}");
        }
        match docs.remove(from) {
            Some(doc) => {
                docs.insert(to.clone(), doc);
                Ok(())
            }
            None => bail!("no such document: {from}"),
        }
    }

    async fn move_to(
        &self,
        name: &FileName,
        from: StoreLocation,
        to: StoreLocation,
    ) -> anyhow::Result<()> {
        let doc = match self.docs(from).lock().unwrap().remove(name) {
            Some(doc) => doc,
            None => bail!("no such document: {name}"),
        };
        self.docs(to).lock().unwrap().insert(name.clone(), doc);
        Ok(())
    }

    async fn content_fingerprint(
        &self,
        location: StoreLocation,
        name: &FileName,
    ) -> anyhow::Result<Fingerprint> {
        Ok(Fingerprint::of(&self.get(location, name)?.content))
    }

    async fn modified_date(
        &self,
        location: StoreLocation,
        name: &FileName,
    ) -> anyhow::Result<DateTime<Utc>> {
        Ok(self.get(location, name)?.modified)
    }

    async fn document_state(&self, _name: &FileName) -> anyhow::Result<DocumentState> {
        Ok(DocumentState::Normal)
    }

    async fn replace_with_version(
        &self,
        name: &FileName,
        version: &VersionId,
    ) -> anyhow::Result<()> {
        self.version_ops
            .lock()
            .unwrap()
            .push(format!("replace {name} {version}"));
        Ok(())
    }

    async fn remove_other_versions(&self, name: &FileName) -> anyhow::Result<()> {
        self.version_ops
            .lock()
            .unwrap()
            .push(format!("prune {name}"));
        Ok(())
    }
}

#[derive(Default)]
struct MemorySource {
    token: StdMutex<Option<IdentityToken>>,
    items: StdMutex<Vec<RemoteItem>>,
    downloads: StdMutex<Vec<FileName>>,
}

impl MemorySource {
    fn signed_in() -> Self {
        let source = Self::default();
        source.set_token(Some("account-1"));
        source
    }

    fn set_token(&self, token: Option<&str>) {
        *self.token.lock().unwrap() = token.map(|t| IdentityToken::new(t).unwrap());
    }

    fn set_items(&self, items: Vec<RemoteItem>) {
        *self.items.lock().unwrap() = items;
    }

    fn downloads(&self) -> Vec<FileName> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IMetadataSource for MemorySource {
    async fn query(&self, filter: &MetadataFilter) -> anyhow::Result<Vec<RemoteItem>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| filter.matches(&i.name))
            .cloned()
            .collect())
    }

    fn change_ticks(&self) -> Option<mpsc::Receiver<()>> {
        None
    }

    async fn identity_token(&self) -> anyhow::Result<Option<IdentityToken>> {
        Ok(self.token.lock().unwrap().clone())
    }

    async fn container_url(&self) -> anyhow::Result<Option<RemoteUrl>> {
        Ok(Some(RemoteUrl::new("ubiq://container").unwrap()))
    }

    async fn start_download(&self, name: &FileName) -> anyhow::Result<()> {
        self.downloads.lock().unwrap().push(name.clone());
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn item(name: &str, content: &[u8], versions: Vec<FileVersion>) -> RemoteItem {
    let now = Utc::now();
    RemoteItem {
        name: FileName::new(name).unwrap(),
        url: RemoteUrl::new(format!("ubiq://container/Documents/{name}")).unwrap(),
        size: content.len() as u64,
        created_at: now,
        modified_at: now,
        download_status: DownloadStatus::Current,
        upload_status: UploadStatus::Uploaded,
        current_version: Some(FileVersion::new(VersionId::new(), now, Fingerprint::of(content))),
        conflict_versions: versions,
    }
}

fn name(s: &str) -> FileName {
    FileName::new(s).unwrap()
}

fn manual_config() -> Config {
    let mut config = Config::default();
    config.conflicts.default_strategy = "manual".to_string();
    config
}

fn orchestrator(
    source: &Arc<MemorySource>,
    store: &Arc<MemoryStore>,
    config: &Config,
) -> SyncOrchestrator {
    SyncOrchestrator::new(
        source.clone() as Arc<dyn IMetadataSource>,
        store.clone() as Arc<dyn IDocumentStore>,
        EventBus::new(),
        config,
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_unavailable_until_signed_in() {
    let source = Arc::new(MemorySource::default());
    let store = Arc::new(MemoryStore::default());
    let engine = orchestrator(&source, &store, &Config::default());

    assert_eq!(
        engine.initial_sync().await.unwrap_err(),
        OperationError::Unavailable
    );

    source.set_token(Some("account-1"));
    assert!(engine.initial_sync().await.is_ok());
    engine.shutdown().await;
}

#[tokio::test]
async fn test_initial_sync_merges_remote_and_offline_names() {
    let source = Arc::new(MemorySource::signed_in());
    source.set_items(vec![item("remote.txt", b"r", vec![])]);
    let store = Arc::new(MemoryStore::default());
    store.put(StoreLocation::Local, "offline.txt", b"o", Utc::now());
    let engine = orchestrator(&source, &store, &Config::default());

    let names = engine.initial_sync().await.unwrap();
    assert_eq!(names, vec![name("offline.txt"), name("remote.txt")]);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_save_then_retrieve_round_trip() {
    let source = Arc::new(MemorySource::signed_in());
    let store = Arc::new(MemoryStore::default());
    let engine = orchestrator(&source, &store, &Config::default());

    let file = name("notes.txt");
    engine.save_and_close(&file, b"hello").await.unwrap();
    assert_eq!(engine.retrieve(&file).await.unwrap(), b"hello");
}

#[tokio::test]
async fn test_retrieve_missing_document_creates_it_empty() {
    let source = Arc::new(MemorySource::signed_in());
    let store = Arc::new(MemoryStore::default());
    let engine = orchestrator(&source, &store, &Config::default());

    let file = name("fresh.txt");
    assert_eq!(engine.retrieve(&file).await.unwrap(), Vec::<u8>::new());
    assert_eq!(store.content(StoreLocation::Remote, "fresh.txt"), Some(vec![]));
}

#[tokio::test]
async fn test_concurrent_operation_on_same_file_is_rejected() {
    let source = Arc::new(MemorySource::signed_in());
    let store = Arc::new(MemoryStore::default());
    store.delay_saves(Duration::from_millis(200));
    let engine = Arc::new(orchestrator(&source, &store, &Config::default()));

    let file = name("busy.txt");
    let slow = {
        let engine = engine.clone();
        let file = file.clone();
        tokio::spawn(async move { engine.save_and_close(&file, b"slow").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        engine.delete(&file).await.unwrap_err(),
        OperationError::Busy(file.clone())
    );

    slow.await.unwrap().unwrap();
    // The slot is free again once the first operation settles.
    assert!(engine.delete(&file).await.is_ok());
}

#[tokio::test]
async fn test_upload_batch_reports_each_file_once() {
    let source = Arc::new(MemorySource::signed_in());
    let store = Arc::new(MemoryStore::default());
    let now = Utc::now();
    store.put(StoreLocation::Local, "a.txt", b"a", now);
    store.put(StoreLocation::Local, "b.txt", b"b", now);
    store.put(StoreLocation::Local, "c.txt", b"c", now);
    // b collides with a newer local copy, so it takes the save path and fails
    store.put(
        StoreLocation::Remote,
        "b.txt",
        b"old",
        now - chrono::Duration::seconds(60),
    );
    store.fail_saves_for("b.txt");
    let engine = orchestrator(&source, &store, &Config::default());

    let progress = StdMutex::new(Vec::new());
    let summary = engine
        .upload_local_offline_documents(|file, outcome| {
            progress.lock().unwrap().push((file.clone(), outcome.is_ok()));
        })
        .await
        .unwrap();

    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.conflicts, 0);
    assert_eq!(summary.total(), 3);
    assert_eq!(summary.errors.len(), 1);

    let progress = progress.lock().unwrap();
    assert_eq!(
        *progress,
        vec![
            (name("a.txt"), true),
            (name("b.txt"), false),
            (name("c.txt"), true),
        ]
    );

    // Successful files moved out of the offline directory, the failed one stays
    assert_eq!(store.content(StoreLocation::Remote, "a.txt"), Some(b"a".to_vec()));
    assert_eq!(store.content(StoreLocation::Remote, "c.txt"), Some(b"c".to_vec()));
    assert!(store.content(StoreLocation::Local, "a.txt").is_none());
    assert!(store.content(StoreLocation::Local, "b.txt").is_some());
}

#[tokio::test]
async fn test_upload_discards_redundant_and_stale_local_copies() {
    let source = Arc::new(MemorySource::signed_in());
    let store = Arc::new(MemoryStore::default());
    let now = Utc::now();
    // same.txt: identical content on both sides
    store.put(StoreLocation::Local, "same.txt", b"x", now);
    store.put(StoreLocation::Remote, "same.txt", b"x", now - chrono::Duration::seconds(30));
    // stale.txt: remote is clearly newer
    store.put(
        StoreLocation::Local,
        "stale.txt",
        b"old local",
        now - chrono::Duration::seconds(60),
    );
    store.put(StoreLocation::Remote, "stale.txt", b"new remote", now);
    let engine = orchestrator(&source, &store, &Config::default());

    let summary = engine
        .upload_local_offline_documents(|_, _| {})
        .await
        .unwrap();

    assert_eq!(summary.uploaded, 0);
    assert_eq!(summary.skipped, 2);
    assert!(store.content(StoreLocation::Local, "same.txt").is_none());
    assert!(store.content(StoreLocation::Local, "stale.txt").is_none());
    assert_eq!(
        store.content(StoreLocation::Remote, "stale.txt"),
        Some(b"new remote".to_vec())
    );
}

#[tokio::test]
async fn test_upload_with_indistinguishable_dates_parks_a_conflict() {
    let source = Arc::new(MemorySource::signed_in());
    let store = Arc::new(MemoryStore::default());
    let now = Utc::now();
    store.put(StoreLocation::Local, "doc.txt", b"local edit", now);
    store.put(
        StoreLocation::Remote,
        "doc.txt",
        b"remote edit",
        now - chrono::Duration::milliseconds(400),
    );
    let engine = orchestrator(&source, &store, &manual_config());

    let summary = engine
        .upload_local_offline_documents(|_, _| {})
        .await
        .unwrap();
    assert_eq!(summary.conflicts, 1);

    let file = name("doc.txt");
    assert!(engine.resolver().has_conflict(&file).await);

    // The parked file rejects everything except resolution
    assert_eq!(
        engine.save_and_close(&file, b"again").await.unwrap_err(),
        OperationError::Conflict(file.clone())
    );

    engine.resolve_keeping_local(&file).await.unwrap();
    assert_eq!(
        store.content(StoreLocation::Remote, "doc.txt"),
        Some(b"local edit".to_vec())
    );
    assert!(store.content(StoreLocation::Local, "doc.txt").is_none());
    assert!(!engine.resolver().has_conflict(&file).await);

    // The slot is released after resolution
    engine.save_and_close(&file, b"again").await.unwrap();
}

#[tokio::test]
async fn test_remote_version_conflict_resolution_keeps_chosen_version() {
    let now = Utc::now();
    let keep = FileVersion::new(VersionId::new(), now, Fingerprint::of(b"device-a"));
    let other = FileVersion::new(
        VersionId::new(),
        now - chrono::Duration::milliseconds(200),
        Fingerprint::of(b"device-b"),
    );

    let source = Arc::new(MemorySource::signed_in());
    source.set_items(vec![item(
        "shared.txt",
        b"current",
        vec![keep.clone(), other.clone()],
    )]);
    let store = Arc::new(MemoryStore::default());
    store.put(StoreLocation::Remote, "shared.txt", b"current", now);
    let engine = orchestrator(&source, &store, &manual_config());

    engine.initial_sync().await.unwrap();

    let file = name("shared.txt");
    let found = engine.find_conflicts(&file).await;
    assert_eq!(found.len(), 2);
    assert!(found.iter().any(|v| v.id() == keep.id()));
    assert!(found.iter().any(|v| v.id() == other.id()));

    engine.resolve_conflict(&file, keep.id()).await.unwrap();
    assert_eq!(
        store.version_ops(),
        vec![
            format!("replace shared.txt {}", keep.id()),
            "prune shared.txt".to_string(),
        ]
    );
    assert!(engine.find_conflicts(&file).await.is_empty());

    // Resolving again is a no-op, not an error
    engine.resolve_conflict(&file, keep.id()).await.unwrap();
    assert_eq!(store.version_ops().len(), 2);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_latest_wins_policy_resolves_version_conflicts_automatically() {
    let now = Utc::now();
    let newer = FileVersion::new(VersionId::new(), now, Fingerprint::of(b"newer"));
    let older = FileVersion::new(
        VersionId::new(),
        now - chrono::Duration::seconds(10),
        Fingerprint::of(b"older"),
    );

    let source = Arc::new(MemorySource::signed_in());
    source.set_items(vec![item("auto.txt", b"current", vec![older, newer.clone()])]);
    let store = Arc::new(MemoryStore::default());
    store.put(StoreLocation::Remote, "auto.txt", b"current", now);
    // Default strategy is latest_wins
    let engine = orchestrator(&source, &store, &Config::default());

    engine.initial_sync().await.unwrap();

    let file = name("auto.txt");
    assert!(engine.find_conflicts(&file).await.is_empty());
    assert_eq!(
        store.version_ops(),
        vec![
            format!("replace auto.txt {}", newer.id()),
            "prune auto.txt".to_string(),
        ]
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn test_evict_moves_remote_only_file_to_offline() {
    let source = Arc::new(MemorySource::signed_in());
    let store = Arc::new(MemoryStore::default());
    store.put(StoreLocation::Remote, "park.txt", b"content", Utc::now());
    let engine = orchestrator(&source, &store, &Config::default());

    engine.evict(&name("park.txt")).await.unwrap();
    assert!(store.content(StoreLocation::Remote, "park.txt").is_none());
    assert_eq!(
        store.content(StoreLocation::Local, "park.txt"),
        Some(b"content".to_vec())
    );
}

#[tokio::test]
async fn test_rename_and_duplicate_preconditions() {
    let source = Arc::new(MemorySource::signed_in());
    let store = Arc::new(MemoryStore::default());
    store.put(StoreLocation::Remote, "a.txt", b"a", Utc::now());
    store.put(StoreLocation::Remote, "b.txt", b"b", Utc::now());
    let engine = orchestrator(&source, &store, &Config::default());

    assert_eq!(
        engine.rename(&name("a.txt"), &name("b.txt")).await.unwrap_err(),
        OperationError::AlreadyExists(name("b.txt"))
    );
    assert_eq!(
        engine.rename(&name("ghost.txt"), &name("c.txt")).await.unwrap_err(),
        OperationError::NotFound(name("ghost.txt"))
    );

    engine.duplicate(&name("a.txt"), &name("copy.txt")).await.unwrap();
    assert_eq!(
        store.content(StoreLocation::Remote, "copy.txt"),
        Some(b"a".to_vec())
    );

    engine.rename(&name("a.txt"), &name("renamed.txt")).await.unwrap();
    assert!(store.content(StoreLocation::Remote, "a.txt").is_none());
    assert_eq!(
        store.content(StoreLocation::Remote, "renamed.txt"),
        Some(b"a".to_vec())
    );
}

#[tokio::test]
async fn test_rename_rejects_target_claimed_by_inflight_operation() {
    let source = Arc::new(MemorySource::signed_in());
    let store = Arc::new(MemoryStore::default());
    store.put(StoreLocation::Remote, "src.txt", b"s", Utc::now());
    store.delay_saves(Duration::from_millis(200));
    let engine = Arc::new(orchestrator(&source, &store, &Config::default()));

    let saving = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.save_and_close(&name("dst.txt"), b"d").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The in-flight save holds dst.txt even though nothing exists there
    // yet, so the rename cannot race it into a collision.
    assert_eq!(
        engine.rename(&name("src.txt"), &name("dst.txt")).await.unwrap_err(),
        OperationError::Busy(name("dst.txt"))
    );

    saving.await.unwrap().unwrap();
    assert_eq!(
        engine.rename(&name("src.txt"), &name("dst.txt")).await.unwrap_err(),
        OperationError::AlreadyExists(name("dst.txt"))
    );

    // Both names are released once a rename settles.
    engine.rename(&name("src.txt"), &name("moved.txt")).await.unwrap();
    engine.save_and_close(&name("moved.txt"), b"m").await.unwrap();
    engine.save_and_close(&name("src.txt"), b"s2").await.unwrap();
}

#[tokio::test]
async fn test_file_list_event_carries_resident_files_only() {
    let mut ghost = item("ghost.txt", b"g", Vec::new());
    ghost.download_status = DownloadStatus::NotDownloaded;
    let source = Arc::new(MemorySource::signed_in());
    source.set_items(vec![item("seen.txt", b"s", Vec::new()), ghost]);
    let store = Arc::new(MemoryStore::default());
    let engine = orchestrator(&source, &store, &Config::default());
    let mut events = engine.events().subscribe();

    engine.initial_sync().await.unwrap();

    let (files, added) = loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event in time")
            .unwrap();
        if let SyncEvent::FileListChanged { files, added, .. } = event {
            break (files, added);
        }
    };

    // The not-yet-downloaded file is withheld from the visible list until
    // its content is resident; its download is kicked off instead.
    assert_eq!(added, vec![name("seen.txt")]);
    let listed: Vec<FileName> = files.iter().map(|f| f.name().clone()).collect();
    assert_eq!(listed, vec![name("seen.txt")]);
    assert!(source.downloads().contains(&name("ghost.txt")));
}

#[tokio::test]
async fn test_identity_change_drains_the_session() {
    let source = Arc::new(MemorySource::signed_in());
    let store = Arc::new(MemoryStore::default());
    let engine = orchestrator(&source, &store, &Config::default());

    engine.save_and_close(&name("seed.txt"), b"x").await.unwrap();
    assert!(engine.session_errors().await.is_empty());

    source.set_token(Some("account-2"));
    // The next guarded call notices the change; with nothing in flight
    // the drain is empty and operations proceed under the new identity.
    engine.save_and_close(&name("seed.txt"), b"y").await.unwrap();

    source.set_token(None);
    assert_eq!(
        engine.save_and_close(&name("seed.txt"), b"z").await.unwrap_err(),
        OperationError::Unavailable
    );
}
