//! Durable snapshot persistence.
//!
//! The whole matchmaking state is written as one JSON document via a
//! temp file and an atomic rename, so a crash mid-write never corrupts
//! the previously committed snapshot. Loads that fail for any reason
//! fall back to an empty state: losing matchmaking state is preferable
//! to refusing to start.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::state::{Profile, UserId};

/// The full persisted snapshot, written and read as a unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub users: BTreeMap<UserId, Profile>,
    #[serde(default)]
    pub queues: BTreeMap<String, Vec<UserId>>,
    #[serde(default)]
    pub active: BTreeMap<UserId, UserId>,
    #[serde(default)]
    pub last_partner: BTreeMap<UserId, UserId>,
}

/// File-backed snapshot store.
///
/// Writes are serialized through their own lock, independent of the
/// matching lock, so slow storage never blocks pairing.
pub struct Store {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Store {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last committed snapshot.
    ///
    /// A missing file is a normal first start; unreadable or corrupt
    /// data is logged and replaced with an empty state. Never fails.
    pub fn load(&self) -> PersistedState {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No snapshot found, starting empty");
                return PersistedState::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read snapshot, starting empty");
                return PersistedState::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt snapshot, starting empty");
                PersistedState::default()
            }
        }
    }

    /// Write a snapshot via temp file + atomic rename.
    pub async fn save(&self, state: &PersistedState) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(state).map_err(std::io::Error::other)?;

        let _guard = self.write_lock.lock().await;
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &bytes).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Snapshot saved");
        Ok(())
    }
}
