//! Sync session and per-file operation tracking
//!
//! A [`SyncSession`] is the engine's authority on which files currently
//! have an operation in flight. At most one operation per file name may be
//! pending at any time; a second request on the same name is rejected as
//! busy until the first reaches a terminal state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::OperationError;
use super::newtypes::FileName;
use super::snapshot::FileListSnapshot;

/// Kind of operation in flight on a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Save,
    Retrieve,
    Upload,
    Delete,
    Rename,
    Duplicate,
    Evict,
    Resolve,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationKind::Save => "save",
            OperationKind::Retrieve => "retrieve",
            OperationKind::Upload => "upload",
            OperationKind::Delete => "delete",
            OperationKind::Rename => "rename",
            OperationKind::Duplicate => "duplicate",
            OperationKind::Evict => "evict",
            OperationKind::Resolve => "resolve",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle state of one in-flight operation
///
/// Valid transitions:
/// - `Idle` → `Pending`
/// - `Pending` → `Succeeded` | `Failed` | `Conflicted`
/// - `Conflicted` → `Succeeded` | `Failed` (resolution outcome)
///
/// `Succeeded` and `Failed` are terminal. `Conflicted` is not: the
/// operation stays parked until a resolution decision lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Idle,
    Pending,
    Succeeded,
    Failed,
    Conflicted,
}

impl OperationState {
    /// Returns true if the transition to `target` is valid
    pub fn can_transition_to(&self, target: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (self, target),
            (Idle, Pending)
                | (Pending, Succeeded)
                | (Pending, Failed)
                | (Pending, Conflicted)
                | (Conflicted, Succeeded)
                | (Conflicted, Failed)
        )
    }

    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Succeeded | OperationState::Failed)
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationState::Idle => "idle",
            OperationState::Pending => "pending",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
            OperationState::Conflicted => "conflicted",
        };
        write!(f, "{s}")
    }
}

/// One operation currently tracked by the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InFlightOperation {
    kind: OperationKind,
    state: OperationState,
    started_at: DateTime<Utc>,
}

impl InFlightOperation {
    fn begin(kind: OperationKind) -> Self {
        Self {
            kind,
            state: OperationState::Pending,
            started_at: Utc::now(),
        }
    }

    /// Returns the operation kind
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Returns the current state
    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Returns when the operation began
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Error recorded against a file when its operation fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionError {
    name: FileName,
    kind: OperationKind,
    message: String,
    occurred_at: DateTime<Utc>,
}

impl SessionError {
    /// Returns the file the error occurred on
    pub fn name(&self) -> &FileName {
        &self.name
    }

    /// Returns the operation that failed
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Returns the failure description
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns when the failure was recorded
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Tracks in-flight operations and the last observed file list
///
/// Purely in-memory; the engine rebuilds it from the remote store on
/// startup and after an identity change.
#[derive(Debug, Default)]
pub struct SyncSession {
    operations: BTreeMap<FileName, InFlightOperation>,
    errors: Vec<SessionError>,
    previous_snapshot: Option<FileListSnapshot>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins an operation on the named file
    ///
    /// Rejects with [`OperationError::Busy`] if another operation is
    /// pending on the same name, or [`OperationError::Conflict`] if the
    /// name is parked awaiting conflict resolution and the new operation
    /// is not itself a resolution.
    pub fn begin(&mut self, name: &FileName, kind: OperationKind) -> Result<(), OperationError> {
        match self.operations.get(name) {
            Some(existing) if existing.state == OperationState::Conflicted => {
                if kind != OperationKind::Resolve {
                    return Err(OperationError::Conflict(name.clone()));
                }
            }
            Some(_) => return Err(OperationError::Busy(name.clone())),
            None => {}
        }
        self.operations
            .insert(name.clone(), InFlightOperation::begin(kind));
        Ok(())
    }

    /// Marks the named operation succeeded and clears it
    pub fn succeed(&mut self, name: &FileName) {
        if let Some(op) = self.operations.get(name) {
            if op.state.can_transition_to(OperationState::Succeeded) {
                self.operations.remove(name);
            }
        }
    }

    /// Marks the named operation failed, records the error, and clears it
    pub fn fail(&mut self, name: &FileName, message: impl Into<String>) {
        if let Some(op) = self.operations.get(name) {
            if op.state.can_transition_to(OperationState::Failed) {
                self.errors.push(SessionError {
                    name: name.clone(),
                    kind: op.kind,
                    message: message.into(),
                    occurred_at: Utc::now(),
                });
                self.operations.remove(name);
            }
        }
    }

    /// Parks the named operation as conflicted
    ///
    /// The entry stays in the table; only a resolution (or session
    /// invalidation) releases the name.
    pub fn conflict(&mut self, name: &FileName) {
        if let Some(op) = self.operations.get_mut(name) {
            if op.state.can_transition_to(OperationState::Conflicted) {
                op.state = OperationState::Conflicted;
            }
        }
    }

    /// Returns the in-flight operation on the named file, if any
    pub fn operation(&self, name: &FileName) -> Option<&InFlightOperation> {
        self.operations.get(name)
    }

    /// Returns true if the named file has any operation in flight
    pub fn is_busy(&self, name: &FileName) -> bool {
        self.operations.contains_key(name)
    }

    /// Returns all errors recorded so far, oldest first
    pub fn errors(&self) -> &[SessionError] {
        &self.errors
    }

    /// Takes the stored snapshot from the previous observation
    pub fn previous_snapshot(&self) -> Option<&FileListSnapshot> {
        self.previous_snapshot.as_ref()
    }

    /// Replaces the stored snapshot with the latest observation
    pub fn store_snapshot(&mut self, snapshot: FileListSnapshot) {
        self.previous_snapshot = Some(snapshot);
    }

    /// Drains the session when the backing identity becomes unavailable
    ///
    /// Every in-flight operation is failed with an unavailability error
    /// and the stored snapshot is dropped. Returns the names that were
    /// drained, in name order.
    pub fn invalidate(&mut self) -> Vec<FileName> {
        let drained: Vec<FileName> = self.operations.keys().cloned().collect();
        for name in &drained {
            if let Some(op) = self.operations.get(name) {
                self.errors.push(SessionError {
                    name: name.clone(),
                    kind: op.kind,
                    message: OperationError::Unavailable.to_string(),
                    occurred_at: Utc::now(),
                });
            }
        }
        self.operations.clear();
        self.previous_snapshot = None;
        drained
    }
}
