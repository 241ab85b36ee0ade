// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `autoloop_state.json` (spec §3): the supervisor's own record of the
//! last cursor it acted on, so it can tell "cursor advanced" from
//! "nothing changed since last tick" across process restarts.

use std::path::{Path, PathBuf};

use ccb_registry::atomic::write_json_atomic;
use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoloopState {
    #[serde(default)]
    pub last_cursor: Option<Cursor>,
    #[serde(default)]
    pub task_complete: bool,
    #[serde(default)]
    pub last_trigger_ts: u64,
}

impl AutoloopState {
    pub fn load(path: &Path) -> Self {
        std::fs::read(path).ok().and_then(|bytes| serde_json::from_slice(&bytes).ok()).unwrap_or_default()
    }

    pub fn persist(path: &Path, cursor: &Cursor, task_complete: bool, last_trigger_ts: u64) {
        let state = AutoloopState { last_cursor: Some(cursor.clone()), task_complete, last_trigger_ts };
        let _ = write_json_atomic(path, &state);
    }
}

/// The three `.ccb/`-rooted files the supervisor reads/writes/locks, per
/// `--repo-root` (spec §3, §4.6).
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub state_path: PathBuf,
    pub autoloop_state_path: PathBuf,
    pub lock_path: PathBuf,
}

impl StatePaths {
    pub fn under(repo_root: &Path) -> Self {
        let dir = repo_root.join(".ccb");
        Self {
            state_path: dir.join("state.json"),
            autoloop_state_path: dir.join("autoloop_state.json"),
            lock_path: dir.join("autoloop.lock"),
        }
    }
}

/// Seconds since the Unix epoch, saturating to 0 on a clock before 1970.
pub fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_is_default() {
        let state = AutoloopState::load(Path::new("/nonexistent/autoloop_state.json"));
        assert!(state.last_cursor.is_none());
        assert!(!state.task_complete);
        assert_eq!(state.last_trigger_ts, 0);
    }

    #[test]
    fn persist_then_load_round_trips() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("autoloop_state.json");
        let cursor = Cursor { kind: "step".to_owned(), step_index: Some(1), sub_index: Some(2) };
        AutoloopState::persist(&path, &cursor, false, 12345);
        let loaded = AutoloopState::load(&path);
        assert_eq!(loaded.last_cursor, Some(cursor));
        assert_eq!(loaded.last_trigger_ts, 12345);
        assert!(!loaded.task_complete);
        Ok(())
    }
}
