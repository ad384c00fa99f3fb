//! Best-effort in-memory snapshot cache.
//!
//! Not authoritative: callers check the cache first and fall through to the
//! store on a miss.  Unbounded, no eviction.  A poisoned lock degrades to a
//! miss rather than an error.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::Snapshot;

#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: Mutex<HashMap<String, Snapshot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Snapshot> {
        self.entries.lock().ok()?.get(id).cloned()
    }

    pub fn put(&self, snapshot: Snapshot) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.insert(snapshot.id.clone(), snapshot);
        }
    }

    pub fn remove(&self, id: &str) -> Option<Snapshot> {
        self.entries.lock().ok()?.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
