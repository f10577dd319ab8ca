// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier reset` command implementation.
//!
//! Offline counterpart of `POST /v1/connection/reset`: deletes the state
//! snapshot and the durable session credentials so the next start pairs
//! from scratch with a zero attempt counter.

use std::path::Path;

use courier_config::CourierConfig;
use courier_core::CourierError;
use courier_session::SnapshotStore;

/// What a reset removed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub snapshot_removed: bool,
    pub session_removed: bool,
}

fn remove_session_dir(path: &Path) -> Result<bool, CourierError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn reset_files(config: &CourierConfig) -> Result<ResetSummary, CourierError> {
    let store = SnapshotStore::new(&config.session.state_file);
    let snapshot_removed = store.path().exists();
    store.clear()?;
    let session_removed = remove_session_dir(Path::new(&config.session.session_path))?;
    Ok(ResetSummary {
        snapshot_removed,
        session_removed,
    })
}

/// Run the `courier reset` command.
pub fn run_reset(config: &CourierConfig) -> Result<(), CourierError> {
    let summary = reset_files(config)?;
    println!(
        "snapshot:  {}",
        if summary.snapshot_removed {
            "deleted"
        } else {
            "none"
        }
    );
    println!(
        "session:   {}",
        if summary.session_removed {
            "deleted"
        } else {
            "none"
        }
    );
    println!("a running server keeps its in-memory session; use POST /v1/connection/reset instead");
    Ok(())
}
