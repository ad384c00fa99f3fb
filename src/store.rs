//! File-per-snapshot persistent store.
//!
//! Layout: `{storage_dir}/{id}.json`, pretty-printed.  The store is the
//! authoritative source of truth; a snapshot exists iff its file exists.
//!
//! ## Guarantees
//! - Atomic writes: temp sibling + rename, so readers never see a partial document
//! - Ids that are not well-formed UUIDs are reported as not found before any
//!   path is constructed
//! - `list()` skips unreadable or malformed files with a warning instead of failing

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use crate::error::DebuggerError;
use crate::model::Snapshot;

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open the store, creating the directory if absent.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, DebuggerError> {
        // Only the canonical hyphenated form maps to a file name.
        match uuid::Uuid::try_parse(id) {
            Ok(parsed) if parsed.hyphenated().to_string() == id => {
                Ok(self.dir.join(format!("{id}.json")))
            }
            _ => Err(DebuggerError::not_found(id)),
        }
    }

    /// Write the full document, replacing any previous version.
    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf, DebuggerError> {
        let final_path = self.path_for(&snapshot.id)?;
        let temp_path = self
            .dir
            .join(format!("{}.json.tmp.{}", snapshot.id, std::process::id()));

        let json = serde_json::to_vec_pretty(snapshot)?;
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        tracing::debug!(id = %snapshot.id, path = %final_path.display(), "snapshot saved");
        Ok(final_path)
    }

    pub fn load(&self, id: &str) -> Result<Snapshot, DebuggerError> {
        let bytes = self.load_raw(id)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The stored bytes exactly as written, for export.
    pub fn load_raw(&self, id: &str) -> Result<Vec<u8>, DebuggerError> {
        let path = self.path_for(id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(DebuggerError::not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, id: &str) -> bool {
        self.path_for(id).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn delete(&self, id: &str) -> Result<(), DebuggerError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(id, "snapshot file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(DebuggerError::not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    fn json_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            // Skips `.tmp.*` siblings as well as foreign files.
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Every readable snapshot, newest first.
    pub fn list(&self) -> Result<Vec<Snapshot>, DebuggerError> {
        let mut snapshots = Vec::new();
        for path in self.json_files()? {
            let parsed = fs::read(&path).map_err(DebuggerError::from).and_then(|bytes| {
                serde_json::from_slice::<Snapshot>(&bytes).map_err(DebuggerError::from)
            });
            match parsed {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable snapshot file");
                }
            }
        }
        snapshots.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));
        Ok(snapshots)
    }

    /// Number of readable snapshots; agrees with `list().len()`.
    pub fn count(&self) -> Result<usize, DebuggerError> {
        Ok(self.list()?.len())
    }
}
