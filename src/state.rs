//! Sync state persistence
//!
//! State is a small checkpoint document: which streams completed in this
//! run and which one is in flight. It exists to let a partially completed
//! run be resumed at stream granularity; there is nothing finer, because
//! full replication has no safe mid-stream restart point.
//!
//! Saves are atomic (write to a temp file, then rename) so an interrupt
//! can never leave a half-written checkpoint behind.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The checkpoint document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub completed_streams: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currently_syncing: Option<String>,
}

impl SyncState {
    /// Whether a stream already completed in this run
    pub fn is_completed(&self, stream_id: &str) -> bool {
        self.completed_streams.iter().any(|s| s == stream_id)
    }

    /// Record a stream as completed and clear the in-flight marker
    pub fn mark_completed(&mut self, stream_id: &str) {
        if !self.is_completed(stream_id) {
            self.completed_streams.push(stream_id.to_string());
        }
        self.currently_syncing = None;
    }

    pub fn set_currently_syncing(&mut self, stream_id: Option<&str>) {
        self.currently_syncing = stream_id.map(str::to_string);
    }

    /// Serialize to a JSON value for a STATE message
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Holds the state and persists it after each completed stream
#[derive(Debug)]
pub struct StateStore {
    path: Option<PathBuf>,
    state: SyncState,
}

impl StateStore {
    /// Load state from a file; a missing file means a fresh run
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)
                .map_err(|e| Error::state(format!("invalid state file {}: {e}", path.display())))?
        } else {
            SyncState::default()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            state,
        })
    }

    /// A store that never touches disk, for runs without a state file
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: SyncState::default(),
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SyncState {
        &mut self.state
    }

    /// Persist the current state atomically
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = serde_json::to_string_pretty(&self.state)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, path)?;
        debug!("Saved state to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mark_completed_is_idempotent() {
        let mut state = SyncState::default();
        state.set_currently_syncing(Some("members"));
        state.mark_completed("members");
        state.mark_completed("members");

        assert_eq!(state.completed_streams, vec!["members".to_string()]);
        assert_eq!(state.currently_syncing, None);
        assert!(state.is_completed("members"));
        assert!(!state.is_completed("pipes"));
    }

    #[test]
    fn test_missing_file_is_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(dir.path().join("state.json")).unwrap();
        assert_eq!(store.state(), &SyncState::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = StateStore::load(&path).unwrap();
        store.state_mut().mark_completed("members");
        store.state_mut().mark_completed("pipes");
        store.save().unwrap();

        let reloaded = StateStore::load(&path).unwrap();
        assert_eq!(
            reloaded.state().completed_streams,
            vec!["members".to_string(), "pipes".to_string()]
        );
        // No leftover temp file
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_state_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = StateStore::load(&path).unwrap_err();
        assert!(matches!(err, Error::State { .. }));
    }

    #[test]
    fn test_in_memory_store_never_writes() {
        let mut store = StateStore::in_memory();
        store.state_mut().mark_completed("members");
        store.save().unwrap();
    }
}
