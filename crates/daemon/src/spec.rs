// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-daemon-flavor constants, grounded on
//! `original_source/lib/askd/daemon.py`'s `ProviderDaemonSpec` dataclass —
//! the same shape drives `askd`, `caskd`, `gaskd`, and `oaskd`, differing
//! only in these fields.

/// Identifies one daemon flavor: the unified `askd`, or one of the three
/// single-provider daemons that have their own (spec §4.4/§4.5).
#[derive(Debug, Clone, Copy)]
pub struct DaemonSpec {
    /// Lock name and log/file-name stem (`askd`, `caskd`, `gaskd`, `oaskd`).
    pub daemon_key: &'static str,
    /// Wire message prefix (`ask`, `cask`, `gask`, `oask`).
    pub protocol_prefix: &'static str,
}

impl DaemonSpec {
    pub const ASKD: Self = Self { daemon_key: "askd", protocol_prefix: "ask" };
    pub const CASKD: Self = Self { daemon_key: "caskd", protocol_prefix: "cask" };
    pub const GASKD: Self = Self { daemon_key: "gaskd", protocol_prefix: "gask" };
    pub const OASKD: Self = Self { daemon_key: "oaskd", protocol_prefix: "oask" };

    pub fn state_file_name(&self) -> String {
        format!("{}.json", self.daemon_key)
    }

    pub fn log_file_name(&self) -> String {
        format!("{}.log", self.daemon_key)
    }

    /// `CCB_<DAEMON>_IDLE_TIMEOUT_S` (spec §6), e.g. `CCB_ASKD_IDLE_TIMEOUT_S`.
    pub fn idle_timeout_env(&self) -> String {
        format!("CCB_{}_IDLE_TIMEOUT_S", self.daemon_key.to_uppercase())
    }
}
