//! Engine notifications
//!
//! Every externally observable state change is published as a [`SyncEvent`]
//! on the [`EventBus`]. Multiple observers (UI layers, loggers, tests) can
//! subscribe independently; a slow subscriber only loses its own events.

use tokio::sync::broadcast;

use crate::domain::{
    CloudFile, ConflictRecord, FileListSnapshot, FileName, IdentityToken, OperationKind, RemoteUrl,
};

/// Default capacity of the event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One externally observable state change
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A metadata refresh began
    UpdateStarted,
    /// A metadata refresh finished and the snapshot below is current
    UpdateEnded { snapshot: FileListSnapshot },
    /// The visible file list changed since the previous refresh
    ///
    /// `files` is the full current list restricted to files whose content
    /// is resident locally (`DownloadStatus::Current`); `added` and
    /// `changed` carry only resident files too. A file listed remotely but
    /// not yet downloaded appears here once its download completes.
    /// `removed` is unfiltered.
    FileListChanged {
        files: Vec<CloudFile>,
        added: Vec<FileName>,
        removed: Vec<FileName>,
        changed: Vec<FileName>,
    },
    /// An operation on a named file completed
    OperationCompleted {
        name: FileName,
        kind: OperationKind,
        success: bool,
    },
    /// A conflict was detected and needs resolution
    ConflictDetected { record: ConflictRecord },
    /// A previously detected conflict was resolved
    ConflictResolved { name: FileName },
    /// Remote store availability changed
    AvailabilityChanged {
        available: bool,
        token: Option<IdentityToken>,
        container: Option<RemoteUrl>,
    },
}

/// Broadcast channel for [`SyncEvent`] values
///
/// Cloning the bus clones the sender; all clones publish into the same
/// channel. Publishing never blocks and never fails: with no subscribers
/// the event is simply dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to all current subscribers
    pub fn publish(&self, event: SyncEvent) {
        // Err here only means there are no subscribers right now.
        let _ = self.tx.send(event);
    }

    /// Creates a new subscription receiving events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
