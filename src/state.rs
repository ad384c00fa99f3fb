//! Shared application context passed to every handler.

use std::sync::{Mutex, MutexGuard};

use crate::builder::SnapshotBuilder;
use crate::cache::SnapshotCache;
use crate::config::Config;
use crate::error::DebuggerError;
use crate::logs::LogBuffers;
use crate::model::Snapshot;
use crate::store::SnapshotStore;

#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub store: SnapshotStore,
    pub cache: SnapshotCache,
    pub logs: LogBuffers,
    pub builder: SnapshotBuilder,
    /// Serializes read-modify-write updates of stored snapshots.
    mutation: Mutex<()>,
}

impl AppState {
    /// Open the store named by `config.storage_dir` and start with empty
    /// cache and logs.
    pub fn new(config: Config) -> std::io::Result<Self> {
        let store = SnapshotStore::open(config.storage_dir.clone())?;
        let builder = SnapshotBuilder::new(config.capture.clone());
        Ok(Self {
            config,
            store,
            cache: SnapshotCache::new(),
            logs: LogBuffers::new(),
            builder,
            mutation: Mutex::new(()),
        })
    }

    /// Cache first, then the store; a store hit populates the cache.
    pub fn load_snapshot(&self, id: &str) -> Result<Snapshot, DebuggerError> {
        if let Some(snapshot) = self.cache.get(id) {
            return Ok(snapshot);
        }
        let snapshot = self.store.load(id)?;
        self.cache.put(snapshot.clone());
        Ok(snapshot)
    }

    /// Store write followed by cache write.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), DebuggerError> {
        self.store.save(snapshot)?;
        self.cache.put(snapshot.clone());
        Ok(())
    }

    /// Load, apply `f`, and save, holding the mutation lock throughout.
    pub fn update_snapshot<F>(&self, id: &str, f: F) -> Result<Snapshot, DebuggerError>
    where
        F: FnOnce(&mut Snapshot),
    {
        let _guard = self.lock_mutation();
        let mut snapshot = self.load_snapshot(id)?;
        f(&mut snapshot);
        self.save_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    pub fn delete_snapshot(&self, id: &str) -> Result<(), DebuggerError> {
        let _guard = self.lock_mutation();
        self.store.delete(id)?;
        self.cache.remove(id);
        Ok(())
    }

    fn lock_mutation(&self) -> MutexGuard<'_, ()> {
        self.mutation.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
