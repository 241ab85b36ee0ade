// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ccbctl`'s three operations: ping, shutdown, status. Each resolves the
//! target daemon's published state file (spec §3) under `ccb_daemon`'s
//! run-directory convention, then delegates to [`ccb_rpc::client`].

use serde_json::json;

use crate::error::CliError;
use crate::target::Target;

/// `true` iff the daemon answered its own ping within `timeout_s`.
pub async fn ping(target: Target, timeout_s: f64) -> Result<bool, CliError> {
    let state_path = ccb_daemon::paths::state_file_path(&target.spec())?;
    Ok(ccb_rpc::client::ping_daemon(target.spec().protocol_prefix, timeout_s, &state_path).await)
}

/// Best-effort shutdown request; `true` iff the request was sent at all.
pub async fn shutdown(target: Target, timeout_s: f64) -> Result<bool, CliError> {
    let state_path = ccb_daemon::paths::state_file_path(&target.spec())?;
    Ok(ccb_rpc::client::shutdown_daemon(target.spec().protocol_prefix, timeout_s, &state_path).await)
}

/// The published state file as JSON, or `null` fields when nothing is
/// published or the daemon isn't answering pings.
pub async fn status(target: Target, timeout_s: f64) -> Result<serde_json::Value, CliError> {
    let state_path = ccb_daemon::paths::state_file_path(&target.spec())?;
    let Some(state) = ccb_rpc::state::DaemonStateFile::read(&state_path) else {
        return Ok(json!({"daemon": target.spec().daemon_key, "running": false}));
    };
    let alive = ccb_rpc::client::ping_daemon(target.spec().protocol_prefix, timeout_s, &state_path).await;
    Ok(json!({
        "daemon": target.spec().daemon_key,
        "running": alive,
        "pid": state.pid,
        "port": state.port,
        "managed": state.managed,
        "work_dir": state.work_dir,
        "started_at": state.started_at,
    }))
}
