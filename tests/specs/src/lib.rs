// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end daemon smoke tests.
//!
//! Spawns a real `ccb-daemon` binary (`askd`, `caskd`, `gaskd`, or
//! `oaskd`) as a subprocess, pointed at an isolated `CCB_RUN_DIR`, and
//! exercises it over its line-JSON TCP protocol.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use ccb_daemon::spec::DaemonSpec;

/// Resolve the path to a compiled daemon binary by name (`askd`, `caskd`,
/// `gaskd`, `oaskd`).
pub fn daemon_binary(name: &str) -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join(name)
}

/// A running daemon process, its isolated run directory, and the spec
/// identifying its flavor. Killed on drop.
pub struct DaemonProcess {
    child: Child,
    pub run_dir: tempfile::TempDir,
    pub spec: DaemonSpec,
}

impl DaemonProcess {
    /// Spawn `spec`'s binary with a fresh, isolated `CCB_RUN_DIR` and a
    /// port of `0` (OS-assigned), matching spec §4.4's startup contract.
    pub fn spawn(spec: DaemonSpec) -> anyhow::Result<Self> {
        let binary = daemon_binary(spec.daemon_key);
        anyhow::ensure!(binary.exists(), "{} binary not found at {}", spec.daemon_key, binary.display());

        let run_dir = tempfile::tempdir()?;
        let child = Command::new(&binary)
            .env("CCB_RUN_DIR", run_dir.path())
            .env("CCB_DAEMON_PORT", "0")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, run_dir, spec })
    }

    pub fn state_path(&self) -> PathBuf {
        self.run_dir.path().join(self.spec.state_file_name())
    }

    /// Poll until the state file is published and the daemon answers its
    /// own ping, or `timeout` elapses.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("{} did not become healthy within {timeout:?}", self.spec.daemon_key);
            }
            if ccb_rpc::client::ping_daemon(self.spec.protocol_prefix, 1.0, &self.state_path()).await {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("{} did not exit within {timeout:?}", self.spec.daemon_key);
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub fn state(&self) -> Option<ccb_rpc::DaemonStateFile> {
        ccb_rpc::DaemonStateFile::read(&self.state_path())
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
