// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash-recovery snapshot of the connection state.
//!
//! Written on every transition, read once at startup. While the process is
//! live the in-memory state is authoritative.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_core::CourierError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::machine::{ConnectionState, Phase};

/// On-disk layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub is_connected: bool,
    pub is_connecting: bool,
    pub reconnect_attempts: u32,
    pub has_client: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl StateSnapshot {
    pub fn capture(state: &ConnectionState, now: DateTime<Utc>) -> Self {
        Self {
            is_connected: state.phase == Phase::Connected,
            is_connecting: matches!(state.phase, Phase::Connecting | Phase::AwaitingPairing),
            reconnect_attempts: state.reconnect_attempts,
            has_client: state.has_session,
            timestamp: now.timestamp_millis(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        let millis = now.timestamp_millis().saturating_sub(self.timestamp);
        Duration::from_millis(u64::try_from(millis).unwrap_or(0))
    }

    /// A `Connecting` snapshot older than `threshold` is left over from a
    /// crash mid-connect.
    pub fn is_stale(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        self.is_connecting && self.age(now) > threshold
    }
}

/// JSON file holding the latest [`StateSnapshot`].
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

    /// Read the snapshot. A missing or unreadable file yields `None`.
    pub fn load(&self) -> Option<StateSnapshot> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read connection snapshot");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed connection snapshot");
                None
            }
        }
    }

    /// Attempt counter to resume with. Stale snapshots are deleted and
    /// resume from zero.
    pub fn recover(&self, stale_after: Duration) -> u32 {
        match self.load() {
            Some(snapshot) if snapshot.is_stale(stale_after, Utc::now()) => {
                warn!(
                    age_secs = snapshot.age(Utc::now()).as_secs(),
                    "discarding stale connecting snapshot"
                );
                if let Err(e) = self.clear() {
                    warn!(error = %e, "failed to delete stale snapshot");
                }
                0
            }
            Some(snapshot) => {
                debug!(attempts = snapshot.reconnect_attempts, "restored reconnect attempts");
                snapshot.reconnect_attempts
            }
            None => 0,
        }
    }

    /// Atomically replace the snapshot file.
    pub async fn save(&self, snapshot: &StateSnapshot) -> Result<(), CourierError> {
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| CourierError::Internal(format!("serialize snapshot: {e}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CourierError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connecting_snapshot(timestamp: i64) -> StateSnapshot {
        StateSnapshot {
            is_connected: false,
            is_connecting: true,
            reconnect_attempts: 2,
            has_client: true,
            timestamp,
        }
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(connecting_snapshot(1)).unwrap();
        for key in ["isConnected", "isConnecting", "reconnectAttempts", "hasClient", "timestamp"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn staleness_applies_only_to_connecting() {
        let now = Utc::now();
        let old = now.timestamp_millis() - 121_000;
        assert!(connecting_snapshot(old).is_stale(Duration::from_secs(120), now));
        assert!(!connecting_snapshot(now.timestamp_millis()).is_stale(Duration::from_secs(120), now));

        let mut idle = connecting_snapshot(old);
        idle.is_connecting = false;
        assert!(!idle.is_stale(Duration::from_secs(120), now));
    }

    #[tokio::test]
    async fn recover_discards_stale_and_keeps_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("state/connection.json"));
        assert_eq!(store.recover(Duration::from_secs(120)), 0);

        store.save(&connecting_snapshot(Utc::now().timestamp_millis())).await.unwrap();
        assert_eq!(store.recover(Duration::from_secs(120)), 2);

        let stale = connecting_snapshot(Utc::now().timestamp_millis() - 600_000);
        store.save(&stale).await.unwrap();
        assert_eq!(store.recover(Duration::from_secs(120)), 0);
        assert!(store.load().is_none(), "stale snapshot should be deleted");
    }

    #[test]
    fn malformed_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(SnapshotStore::new(&path).load().is_none());
    }
}
