// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon process configuration (spec §6, §7.2 **[AMBIENT]**), following
//! the teacher's `coop_mux::config::MuxConfig` pattern: a `clap::Args`
//! struct with `env` fallbacks for every environment input spec.md §6
//! lists for the daemon family.

use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct DaemonConfig {
    /// Host to bind the TCP listener on.
    #[arg(long, default_value = "127.0.0.1", env = "CCB_DAEMON_HOST")]
    pub host: String,

    /// Port to listen on; 0 lets the OS choose (spec §4.4).
    #[arg(long, default_value_t = 0, env = "CCB_DAEMON_PORT")]
    pub port: u16,

    /// Pid of a managing parent process; when set implies `managed`.
    #[arg(long, env = "CCB_PARENT_PID")]
    pub parent_pid: Option<u32>,

    /// Disables the idle-shutdown monitor; implied when `parent_pid` is set.
    #[arg(long, env = "CCB_MANAGED")]
    pub managed: bool,

    /// Idle shutdown timeout in seconds; 0 disables it. Each daemon flavor
    /// additionally honors its own `CCB_<DAEMON>_IDLE_TIMEOUT_S` override,
    /// applied in [`crate::config::DaemonConfig::idle_timeout_s`].
    #[arg(long, default_value_t = 60.0)]
    pub idle_timeout_s: f64,

    /// Request queue backlog size for the TCP listener (spec §4.4).
    #[arg(long, default_value_t = 128)]
    pub request_queue_size: u32,
}

impl DaemonConfig {
    pub fn is_managed(&self) -> bool {
        self.managed || self.parent_pid.is_some()
    }

    /// Effective idle timeout: 0 when managed, else `idle_timeout_s`
    /// overridden by the daemon-specific env var if present.
    pub fn idle_timeout(&self, spec: &crate::spec::DaemonSpec) -> std::time::Duration {
        if self.is_managed() {
            return std::time::Duration::ZERO;
        }
        let secs = std::env::var(spec.idle_timeout_env())
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(self.idle_timeout_s);
        std::time::Duration::from_secs_f64(secs.max(0.0))
    }
}
