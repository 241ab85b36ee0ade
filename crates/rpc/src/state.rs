// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon state file shape (spec §3): `{pid, host, connect_host, port,
//! token, started_at, parent_pid?, managed, work_dir}`, published
//! atomically once a daemon has bound its listener and read by both the
//! daemon itself (to verify pid ownership on shutdown) and by
//! [`crate::client`] helpers connecting to it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RpcError;

/// `<run_dir>/<daemon>.json` (spec §3), mode 0600 on POSIX.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStateFile {
    pub pid: u32,
    pub host: String,
    pub connect_host: String,
    pub port: u16,
    pub token: String,
    pub started_at: String,
    #[serde(default)]
    pub parent_pid: Option<u32>,
    pub managed: bool,
    pub work_dir: String,
}

impl DaemonStateFile {
    /// Best-effort parse of a daemon's published state file; any read or
    /// parse failure (missing file, daemon mid-startup, corrupt content)
    /// is treated as "no daemon available" rather than an error (mirrors
    /// `askd_rpc.py::read_state`'s blanket `except Exception: return None`).
    pub fn read(path: &Path) -> Option<Self> {
        let raw = std::fs::read(path).ok()?;
        serde_json::from_slice(&raw).ok()
    }

    pub fn read_required(path: &Path) -> Result<Self, RpcError> {
        Self::read(path).ok_or(RpcError::NoState)
    }
}

/// `0.0.0.0`/`::` are bind addresses, not connectable ones; normalize to
/// the loopback address a client should actually dial (spec §4.4).
pub fn normalize_connect_host(host: &str) -> String {
    let host = host.trim();
    match host {
        "" | "0.0.0.0" => "127.0.0.1".to_owned(),
        "::" | "[::]" => "::1".to_owned(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_maps_unspecified_hosts_to_loopback() {
        assert_eq!(normalize_connect_host("0.0.0.0"), "127.0.0.1");
        assert_eq!(normalize_connect_host("::"), "::1");
        assert_eq!(normalize_connect_host("10.0.0.5"), "10.0.0.5");
    }

    #[test]
    fn read_missing_file_is_none() {
        assert!(DaemonStateFile::read(Path::new("/nonexistent/path/askd.json")).is_none());
    }

    #[test]
    fn round_trips_through_json() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("askd.json");
        let state = DaemonStateFile {
            pid: 123,
            host: "127.0.0.1".to_owned(),
            connect_host: "127.0.0.1".to_owned(),
            port: 4000,
            token: "t".repeat(32),
            started_at: "2026-01-01 00:00:00".to_owned(),
            parent_pid: Some(99),
            managed: true,
            work_dir: "/tmp/proj".to_owned(),
        };
        std::fs::write(&path, serde_json::to_vec(&state)?)?;
        assert_eq!(DaemonStateFile::read(&path), Some(state));
        Ok(())
    }
}
