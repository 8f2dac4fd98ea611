//! UbiDrive Conflict - Conflict detection and resolution
//!
//! Provides:
//! - Fingerprint- and date-based conflict detection
//! - The reconciliation ladder used for offline uploads and eviction
//! - Configurable resolution policy (latest-wins or manual)
//! - Version-keeping resolution against the document store

pub mod detector;
pub mod error;
pub mod policy;
pub mod resolver;

pub use detector::{ConflictDetector, Reconciliation};
pub use error::ConflictError;
pub use policy::ConflictPolicy;
pub use resolver::ConflictResolver;
