//! File list snapshots and change detection
//!
//! A [`FileListSnapshot`] is the set of files the remote store reported at
//! one observation point. Consumers must treat each snapshot as the
//! authoritative current state, never as an incremental patch log.
//!
//! [`ChangeDetector::diff`] is the pure function that turns two successive
//! snapshots into a [`Delta`] of added/removed/changed files.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file::CloudFile;
use super::newtypes::FileName;

/// The remote directory contents at one observation point
///
/// Keyed by file name; iteration order is name order, but snapshot
/// comparison is order-irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileListSnapshot {
    /// When the snapshot was taken
    taken_at: DateTime<Utc>,
    /// Files keyed by name
    files: BTreeMap<FileName, CloudFile>,
}

impl FileListSnapshot {
    /// Creates an empty snapshot taken now
    pub fn new() -> Self {
        Self {
            taken_at: Utc::now(),
            files: BTreeMap::new(),
        }
    }

    /// Creates a snapshot from a list of files, taken now
    pub fn from_files(files: impl IntoIterator<Item = CloudFile>) -> Self {
        Self {
            taken_at: Utc::now(),
            files: files
                .into_iter()
                .map(|f| (f.name().clone(), f))
                .collect(),
        }
    }

    /// Returns when the snapshot was taken
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Returns the file with the given name, if present
    pub fn get(&self, name: &FileName) -> Option<&CloudFile> {
        self.files.get(name)
    }

    /// Returns a mutable reference to the file with the given name
    pub fn get_mut(&mut self, name: &FileName) -> Option<&mut CloudFile> {
        self.files.get_mut(name)
    }

    /// Returns true if a file with the given name is present
    pub fn contains(&self, name: &FileName) -> bool {
        self.files.contains_key(name)
    }

    /// Inserts or replaces a file record
    pub fn insert(&mut self, file: CloudFile) {
        self.files.insert(file.name().clone(), file);
    }

    /// Removes a file record, returning it if present
    pub fn remove(&mut self, name: &FileName) -> Option<CloudFile> {
        self.files.remove(name)
    }

    /// Iterates over all files in name order
    pub fn files(&self) -> impl Iterator<Item = &CloudFile> {
        self.files.values()
    }

    /// Iterates over all file names in name order
    pub fn names(&self) -> impl Iterator<Item = &FileName> {
        self.files.keys()
    }

    /// Returns the number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if the snapshot holds no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Difference between two successive snapshots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    /// Files present in the current snapshot but not the previous one
    pub added: Vec<CloudFile>,
    /// Files present in the previous snapshot but not the current one
    pub removed: Vec<CloudFile>,
    /// Files present in both whose content fingerprint changed
    pub changed: Vec<CloudFile>,
}

impl Delta {
    /// Returns true if nothing was added, removed, or changed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Names of removed files
    pub fn removed_names(&self) -> Vec<FileName> {
        self.removed.iter().map(|f| f.name().clone()).collect()
    }
}

/// Pure snapshot diffing
pub struct ChangeDetector;

impl ChangeDetector {
    /// Computes the delta between two snapshots
    ///
    /// Partitioned by name-set membership; names present on both sides are
    /// `changed` only when the content fingerprint differs. A download or
    /// upload status change with an unchanged fingerprint is not a content
    /// change and is excluded.
    ///
    /// Deterministic and side-effect free.
    pub fn diff(previous: &FileListSnapshot, current: &FileListSnapshot) -> Delta {
        let mut delta = Delta::default();

        for file in current.files() {
            match previous.get(file.name()) {
                None => delta.added.push(file.clone()),
                Some(before) => {
                    if before.fingerprint() != file.fingerprint() {
                        delta.changed.push(file.clone());
                    }
                }
            }
        }

        for file in previous.files() {
            if !current.contains(file.name()) {
                delta.removed.push(file.clone());
            }
        }

        delta
    }
}
