//! Metadata watching and debounced snapshot delivery
//!
//! Provides a [`MetadataWatcher`] that turns the remote metadata source
//! into a stream of [`FileListSnapshot`]s. When the source pushes change
//! ticks, bursts within the debounce window are coalesced so that
//! consumers only see the listing after it has gone quiet; when the
//! source cannot push, the watcher falls back to interval polling.
//!
//! ## Architecture
//!
//! ```text
//! metadata backend
//!       │ change ticks (or poll timer)
//!       ▼
//!  MetadataWatcher ──→ mpsc::channel ──→ SyncOrchestrator
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ubidrive_core::{
    config::SyncConfig,
    domain::{CloudFile, FileListSnapshot},
    events::{EventBus, SyncEvent},
    ports::{IMetadataSource, MetadataFilter, RemoteItem},
};

/// Capacity of the snapshot channel; refreshes are slow, consumers fast
const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

/// Streams debounced metadata snapshots from the remote source
///
/// Restartable: `stop()` cancels the running task and a later `start()`
/// begins a fresh stream. Stopping cancels future delivery only; it does
/// not interrupt document operations already in flight elsewhere.
pub struct MetadataWatcher {
    source: Arc<dyn IMetadataSource>,
    events: EventBus,
    filter: MetadataFilter,
    debounce_delay: Duration,
    poll_interval: Duration,
    auto_download: bool,
    cancel: Option<CancellationToken>,
}

impl MetadataWatcher {
    pub fn new(
        source: Arc<dyn IMetadataSource>,
        events: EventBus,
        filter: MetadataFilter,
        config: &SyncConfig,
    ) -> Self {
        Self {
            source,
            events,
            filter,
            debounce_delay: Duration::from_millis(config.debounce_delay_ms),
            poll_interval: Duration::from_secs(config.poll_interval),
            auto_download: config.auto_download,
            cancel: None,
        }
    }

    /// Starts watching and returns the snapshot stream
    ///
    /// Delivers one immediate best-effort snapshot, then a snapshot per
    /// settled change (push mode) or per poll interval (poll mode). If a
    /// watch is already running it is stopped first.
    pub fn start(&mut self) -> mpsc::Receiver<FileListSnapshot> {
        self.stop();

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let (tx, rx) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let task = WatchTask {
            source: self.source.clone(),
            events: self.events.clone(),
            filter: self.filter.clone(),
            debounce_delay: self.debounce_delay,
            poll_interval: self.poll_interval,
            auto_download: self.auto_download,
        };

        info!(
            debounce_ms = self.debounce_delay.as_millis() as u64,
            poll_secs = self.poll_interval.as_secs(),
            "Starting metadata watcher"
        );
        tokio::spawn(task.run(tx, cancel));

        rx
    }

    /// Stops the running watch, if any
    ///
    /// The snapshot receiver returned by `start()` ends after this call.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            info!("Stopping metadata watcher");
            cancel.cancel();
        }
    }

    /// Returns true if a watch task is active
    pub fn is_running(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| !c.is_cancelled())
    }
}

impl Drop for MetadataWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved into the spawned watch task
struct WatchTask {
    source: Arc<dyn IMetadataSource>,
    events: EventBus,
    filter: MetadataFilter,
    debounce_delay: Duration,
    poll_interval: Duration,
    auto_download: bool,
}

impl WatchTask {
    async fn run(self, tx: mpsc::Sender<FileListSnapshot>, cancel: CancellationToken) {
        // Immediate best-effort snapshot before entering the loop.
        if self.refresh(&tx).await.is_err() {
            return;
        }

        let mut ticks = self.source.change_ticks();

        loop {
            let changed = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Watch task cancelled");
                    return;
                }
                changed = self.wait_for_change(&mut ticks) => changed,
            };

            if changed {
                // Absorb the rest of the burst before querying.
                self.debounce(&mut ticks, &cancel).await;
            }
            if cancel.is_cancelled() {
                return;
            }
            if self.refresh(&tx).await.is_err() {
                return;
            }
        }
    }

    /// Waits for the next reason to refresh
    ///
    /// Returns true when a pushed change tick arrived (debounce applies),
    /// false when the poll timer fired. A closed tick channel demotes the
    /// watcher to polling.
    async fn wait_for_change(&self, ticks: &mut Option<mpsc::Receiver<()>>) -> bool {
        match ticks {
            Some(rx) => match rx.recv().await {
                Some(()) => true,
                None => {
                    warn!("Change tick channel closed, falling back to polling");
                    *ticks = None;
                    tokio::time::sleep(self.poll_interval).await;
                    false
                }
            },
            None => {
                tokio::time::sleep(self.poll_interval).await;
                false
            }
        }
    }

    /// Swallows further ticks until the source has been quiet long enough
    async fn debounce(&self, ticks: &mut Option<mpsc::Receiver<()>>, cancel: &CancellationToken) {
        let Some(rx) = ticks else { return };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                settled = tokio::time::timeout(self.debounce_delay, rx.recv()) => {
                    match settled {
                        Err(_) => return,          // quiet for a full window
                        Ok(Some(())) => continue,  // burst continues
                        Ok(None) => {
                            *ticks = None;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Queries the source and delivers a fresh snapshot
    ///
    /// Query failures are logged and skipped; the stream stays alive for
    /// the next change. The update bracket events are published only once
    /// the query has succeeded, so subscribers never see an unclosed
    /// `UpdateStarted`. `Err` here only means the receiver is gone and
    /// the task should end.
    async fn refresh(&self, tx: &mpsc::Sender<FileListSnapshot>) -> Result<(), ()> {
        let items = match self.source.query(&self.filter).await {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "Metadata query failed, keeping previous snapshot");
                return Ok(());
            }
        };
        self.events.publish(SyncEvent::UpdateStarted);

        if self.auto_download {
            self.kick_downloads(&items).await;
        }

        let snapshot = FileListSnapshot::from_files(items.into_iter().map(item_to_file));
        debug!(files = snapshot.len(), "Delivering metadata snapshot");
        self.events.publish(SyncEvent::UpdateEnded {
            snapshot: snapshot.clone(),
        });

        tx.send(snapshot).await.map_err(|_| ())
    }

    /// Starts downloads for listed files whose content is not local yet
    async fn kick_downloads(&self, items: &[RemoteItem]) {
        for item in items {
            if !item.download_status.is_local() && !item.download_status.is_transferring() {
                debug!(file = %item.name, "Requesting download for listed file");
                if let Err(err) = self.source.start_download(&item.name).await {
                    warn!(file = %item.name, error = %err, "Download request failed");
                }
            }
        }
    }
}

/// Maps a listed item onto its domain record
fn item_to_file(item: RemoteItem) -> CloudFile {
    let mut file = CloudFile::new(
        item.name,
        item.url,
        item.size,
        item.created_at,
        item.modified_at,
        item.download_status,
        item.upload_status,
        item.current_version,
    );
    for version in item.conflict_versions {
        file.add_pending_version(version);
    }
    file
}
