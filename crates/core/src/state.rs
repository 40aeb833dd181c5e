//! Durable job snapshots for resume
//!
//! One JSON document per job, overwritten at every checkpoint and removed
//! when the job completes. Writes go to a sibling temp file that is renamed
//! over the snapshot, so a crash mid-checkpoint leaves the previous
//! snapshot intact.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::job::SyncOptions;
use crate::stats::SyncStats;
use crate::traits::ObjectRecord;

/// Default snapshot file name, relative to the working directory
pub const DEFAULT_STATE_FILE: &str = ".msync-state.json";

/// Persisted job state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub source_container: String,
    pub dest_container: String,
    #[serde(default)]
    pub prefix: String,
    pub full_object_list: Vec<ObjectRecord>,
    pub filtered_object_list: Vec<ObjectRecord>,
    pub stats: SyncStats,
    pub options: SyncOptions,
}

impl SyncState {
    /// Whether this snapshot belongs to the given container pair
    pub fn matches(&self, source: &str, dest: &str) -> bool {
        self.source_container == source && self.dest_container == dest
    }
}

/// File-backed snapshot store
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Overwrite the snapshot atomically
    ///
    /// Blocking; async callers run it on the blocking pool.
    pub fn save(&self, state: &SyncState) -> Result<()> {
        let content = serde_json::to_vec_pretty(state)?;
        let temp_path = self.temp_path();
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&content)?;
            file.sync_all()?;
        }
        std::fs::rename(&temp_path, &self.path)?;
        tracing::debug!(
            path = %self.path.display(),
            objects = state.filtered_object_list.len(),
            "Saved checkpoint"
        );
        Ok(())
    }

    /// Read and parse the snapshot, distinguishing absence from corruption
    pub fn read(&self) -> Result<Option<SyncState>> {
        let content = match std::fs::read(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| Error::StateCorruption(format!("{}: {e}", self.path.display())))
    }

    /// Last snapshot, or `None` when absent or unreadable
    pub fn load(&self) -> Option<SyncState> {
        match self.read() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable state snapshot");
                None
            }
        }
    }

    /// Snapshot for exactly this container pair, if any
    pub fn load_for(&self, source: &str, dest: &str) -> Option<SyncState> {
        let state = self.load()?;
        if state.matches(source, dest) {
            Some(state)
        } else {
            tracing::info!(
                saved_source = %state.source_container,
                saved_dest = %state.dest_container,
                "State snapshot belongs to another job, starting fresh"
            );
            None
        }
    }

    /// Remove the snapshot; a missing file is not an error
    pub fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
