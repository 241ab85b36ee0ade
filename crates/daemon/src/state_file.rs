// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publishing and cleaning up a daemon's own state file (spec §3, §4.4).
//! Grounded on `askd_server.py::_write_state` and `askd/daemon.py`'s
//! `UnifiedAskDaemon._cleanup_state_file`.

use std::path::Path;

use ccb_registry::atomic::write_json_atomic;
use ccb_rpc::state::{normalize_connect_host, DaemonStateFile};

/// Write this daemon's state file atomically, to be called only after
/// `bind()` has reported the actual host/port (spec §4.4, "State file is
/// written atomically only after bind() reports the actual port").
pub fn publish(
    path: &Path,
    host: &str,
    port: u16,
    token: &str,
    parent_pid: Option<u32>,
    managed: bool,
    work_dir: &str,
) -> Result<(), ccb_registry::RegistryError> {
    let state = DaemonStateFile {
        pid: std::process::id(),
        host: host.to_owned(),
        connect_host: normalize_connect_host(host),
        port,
        token: token.to_owned(),
        started_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        parent_pid,
        managed,
        work_dir: work_dir.to_owned(),
    };
    write_json_atomic(path, &state)
}

/// Remove the state file only if its `pid` still matches ours (spec §4.4,
/// "On clean shutdown, the state file is removed only if its pid equals
/// the current pid").
pub fn cleanup(path: &Path) {
    let Some(state) = DaemonStateFile::read(path) else { return };
    if state.pid == std::process::id() {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_removes_only_when_pid_matches() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("askd.json");
        publish(&path, "0.0.0.0", 4000, "tok", None, false, "/work")?;
        assert!(path.exists());
        cleanup(&path);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn cleanup_leaves_file_owned_by_another_pid() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("askd.json");
        let other = DaemonStateFile {
            pid: std::process::id().wrapping_add(1).max(1),
            host: "127.0.0.1".to_owned(),
            connect_host: "127.0.0.1".to_owned(),
            port: 1,
            token: "t".to_owned(),
            started_at: "x".to_owned(),
            parent_pid: None,
            managed: false,
            work_dir: "/work".to_owned(),
        };
        write_json_atomic(&path, &other)?;
        cleanup(&path);
        assert!(path.exists());
        Ok(())
    }
}
