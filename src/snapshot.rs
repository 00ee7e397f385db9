//! Snapshot store
//!
//! Atomic load/save of the snapshot JSON document. A run either fully
//! replaces the document or leaves the prior one intact; the write goes
//! through a temp file in the target directory followed by a rename.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::contracts::Snapshot;
use crate::error::{MonitorError, Result};

/// Durable store for one monitor instance's snapshot
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the prior snapshot.
    ///
    /// A missing file is an uninitialized snapshot. A document that fails to
    /// parse is treated the same way, with a warning; the next run then
    /// re-baselines via STARTUP. Only an unreadable file is an error.
    pub fn load(&self) -> Result<Snapshot> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Snapshot::default());
            }
            Err(err) => {
                return Err(MonitorError::store(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    err
                )));
            }
        };

        match serde_json::from_str(&text) {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "snapshot document malformed, treating as uninitialized"
                );
                Ok(Snapshot::default())
            }
        }
    }

    /// Persist the snapshot atomically.
    ///
    /// Serialized pretty-printed UTF-8 with non-ASCII preserved, written to a
    /// temp file in the same directory and renamed over the target path.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir).map_err(|err| {
                    MonitorError::store(format!("cannot create {}: {}", dir.display(), err))
                })?;
                dir
            }
            _ => Path::new("."),
        };

        let json = serde_json::to_string_pretty(snapshot)?;

        let mut tmp = NamedTempFile::new_in(parent)
            .map_err(|err| MonitorError::store(format!("cannot create temp file: {}", err)))?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|err| {
            MonitorError::store(format!("cannot replace {}: {}", self.path.display(), err))
        })?;

        tracing::debug!(path = %self.path.display(), "snapshot persisted");
        Ok(())
    }
}
