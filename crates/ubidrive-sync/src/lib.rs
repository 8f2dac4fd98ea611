//! UbiDrive Sync - Document synchronization engine
//!
//! Provides:
//! - Remote availability monitoring with identity-change detection
//! - Debounced metadata watching with push and polling modes
//! - The sync orchestrator: save, retrieve, delete, rename, duplicate,
//!   evict, and offline-document reconciliation
//!
//! ## Modules
//!
//! - [`availability`] - Account availability and identity-token tracking
//! - [`watcher`] - Metadata snapshot stream with debounce and auto-download
//! - [`orchestrator`] - Per-file operations and batch reconciliation

pub mod availability;
pub mod orchestrator;
pub mod watcher;

pub use availability::{AvailabilityCheck, AvailabilityMonitor};
pub use orchestrator::{BatchSummary, SyncOrchestrator};
pub use watcher::MetadataWatcher;
