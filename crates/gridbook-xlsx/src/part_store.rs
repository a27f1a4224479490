//! Concurrency-safe storage for package parts.
//!
//! Each part path maps to its own mutex-guarded entry, so work on one path
//! never blocks work on another; only concurrent access to the same path
//! serializes. The outer map lock is held just long enough to clone the
//! entry handle out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::worksheet::WorksheetPart;

/// One stored part: raw bytes straight out of the container, or the
/// worksheet tree materialized from them.
#[derive(Debug)]
pub enum PartEntry {
    Raw(Vec<u8>),
    Sheet(WorksheetPart),
}

impl PartEntry {
    pub fn is_materialized(&self) -> bool {
        matches!(self, PartEntry::Sheet(_))
    }
}

#[derive(Debug, Default)]
pub struct PartStore {
    entries: RwLock<HashMap<String, Arc<Mutex<PartEntry>>>>,
}

impl PartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry handle for `path`, if present. The map lock is
    /// released before returning; the handle's own mutex serializes
    /// same-path access.
    pub fn load(&self, path: &str) -> Option<Arc<Mutex<PartEntry>>> {
        self.entries
            .read()
            .expect("part store lock poisoned")
            .get(path)
            .cloned()
    }

    /// Inserts or replaces the bytes at `path`. Replacing goes through the
    /// existing entry's mutex, so writers racing readers on the same path
    /// still serialize; any materialized state is discarded.
    pub fn store_raw(&self, path: &str, bytes: Vec<u8>) {
        let mut entries = self.entries.write().expect("part store lock poisoned");
        match entries.get(path) {
            Some(entry) => {
                *entry.lock().expect("part entry mutex poisoned") = PartEntry::Raw(bytes);
            }
            None => {
                entries.insert(path.to_string(), Arc::new(Mutex::new(PartEntry::Raw(bytes))));
            }
        }
    }

    /// Removes `path` from the store. Removing an absent path is a no-op.
    pub fn delete(&self, path: &str) {
        self.entries
            .write()
            .expect("part store lock poisoned")
            .remove(path);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries
            .read()
            .expect("part store lock poisoned")
            .contains_key(path)
    }

    /// Snapshot of the stored paths, sorted so iteration order is stable.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .entries
            .read()
            .expect("part store lock poisoned")
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("part store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
