//! Run checkpoint on local disk
//!
//! Records progress counters after each committed file so an interrupted run can
//! report cumulative totals when resumed. Which files still need work is always
//! derived from the record store, never from the checkpoint.

use crate::batch_processor::RunStats;
use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Progress of an unfinished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub folder_id: String,
    /// Source id of the last file whose record was written
    pub last_committed: Option<String>,
    pub stats: RunStats,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(folder_id: impl Into<String>, stats: RunStats) -> Self {
        Self {
            folder_id: folder_id.into(),
            last_committed: None,
            stats,
            updated_at: Utc::now(),
        }
    }
}

/// JSON file holding at most one checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint, `None` when no run was interrupted
    pub async fn load(&self) -> Result<Option<Checkpoint>> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io_at(&self.path, e).into()),
        };
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Write the checkpoint through a temporary file so a crash never leaves
    /// a truncated one behind
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io_at(parent, e))?;
        }

        let data = serde_json::to_string_pretty(checkpoint)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)
            .await
            .map_err(|e| StorageError::io_at(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StorageError::io_at(&self.path, e))?;
        Ok(())
    }

    /// Remove the checkpoint after a completed run
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io_at(&self.path, e).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_checkpoint_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("state").join("checkpoint.json"));

        let stats = RunStats {
            seen: 10,
            processed: 4,
            renamed: 3,
            failed: 1,
            ..RunStats::default()
        };
        let mut checkpoint = Checkpoint::new("folder-1", stats);
        checkpoint.last_committed = Some("file-4".to_string());
        store.save(&checkpoint).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
        assert!(!store.path().with_extension("json.tmp").exists());

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(CheckpointStore::new(path).load().await.is_err());
    }
}
