// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side RPC helpers (spec §2.8): read a daemon's state file, then
//! ping/shutdown/request it with deadline-bounded reads and the 16 MiB
//! hard cap. Grounded directly on
//! `original_source/lib/askd_rpc.py`'s `ping_daemon`/`shutdown_daemon`.

use std::path::Path;
use std::time::{Duration, Instant};

use ccb_core::wire::{RequestMessage, ResponseMessage};
use serde_json::json;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::RpcError;
use crate::framing::{recv_line, MAX_LINE_BYTES};
use crate::state::DaemonStateFile;

async fn connect(state: &DaemonStateFile, connect_timeout: Duration) -> Result<TcpStream, RpcError> {
    let addr = format!("{}:{}", state.connect_host, state.port);
    Ok(tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await.map_err(|_| RpcError::Timeout)??)
}

/// `true` iff `prefix.ping` got back a `pong`/`response` with `exit_code=0`
/// before `timeout_s` elapses. Any failure (no state file, connect error,
/// timeout, bad reply) is folded into `false`, mirroring the original's
/// blanket `except Exception: return False`.
pub async fn ping_daemon(prefix: &str, timeout_s: f64, state_path: &Path) -> bool {
    ping_daemon_inner(prefix, timeout_s, state_path).await.unwrap_or(false)
}

async fn ping_daemon_inner(prefix: &str, timeout_s: f64, state_path: &Path) -> Result<bool, RpcError> {
    let state = DaemonStateFile::read_required(state_path)?;
    let connect_timeout = Duration::from_secs_f64(timeout_s.min(2.0).max(0.0));
    let mut stream = connect(&state, connect_timeout).await?;
    let req = json!({"type": format!("{prefix}.ping"), "v": 1, "id": "ping", "token": state.token});
    let mut bytes = serde_json::to_vec(&req)?;
    bytes.push(b'\n');
    stream.write_all(&bytes).await?;
    stream.flush().await?;

    let deadline = Instant::now() + Duration::from_secs_f64(timeout_s.max(0.0));
    let mut reader = BufReader::new(stream);
    let resp: serde_json::Value = recv_line(&mut reader, deadline).await?;
    let kind = resp.get("type").and_then(|v| v.as_str()).unwrap_or_default();
    let exit_code = resp.get("exit_code").and_then(|v| v.as_i64()).unwrap_or(-1);
    Ok((kind == format!("{prefix}.pong") || kind == format!("{prefix}.response")) && exit_code == 0)
}

/// Best-effort shutdown request; `true` iff the request was sent at all
/// (the response is read best-effort and its absence is not a failure —
/// the daemon may tear down before flushing a reply).
pub async fn shutdown_daemon(prefix: &str, timeout_s: f64, state_path: &Path) -> bool {
    shutdown_daemon_inner(prefix, timeout_s, state_path).await.unwrap_or(false)
}

async fn shutdown_daemon_inner(prefix: &str, timeout_s: f64, state_path: &Path) -> Result<bool, RpcError> {
    let state = DaemonStateFile::read_required(state_path)?;
    let connect_timeout = Duration::from_secs_f64(timeout_s.min(2.0).max(0.0));
    let mut stream = connect(&state, connect_timeout).await?;
    let req = json!({"type": format!("{prefix}.shutdown"), "v": 1, "id": "shutdown", "token": state.token});
    let mut bytes = serde_json::to_vec(&req)?;
    bytes.push(b'\n');
    stream.write_all(&bytes).await?;
    stream.flush().await?;

    let deadline = Instant::now() + Duration::from_secs_f64(timeout_s.max(0.0));
    let mut reader = BufReader::new(stream);
    let _ = recv_line::<_, serde_json::Value>(&mut reader, deadline).await;
    Ok(true)
}

/// Send a full `<prefix>.request` and wait for its `<prefix>.response`.
pub async fn send_request(
    prefix: &str,
    timeout_s: f64,
    state_path: &Path,
    mut request: RequestMessage,
) -> Result<ResponseMessage, RpcError> {
    let state = DaemonStateFile::read_required(state_path)?;
    request.token = state.token.clone();
    request.kind = format!("{prefix}.request");

    // `timeout_s < 0` means "no bound" (spec §6); give the connect/overall
    // deadline a generous ceiling instead of blocking forever.
    let overall = if timeout_s < 0.0 { Duration::from_secs(24 * 3600) } else { Duration::from_secs_f64(timeout_s) };
    let connect_timeout = overall.min(Duration::from_secs(10));
    let mut stream = connect(&state, connect_timeout).await?;

    let mut bytes = serde_json::to_vec(&request)?;
    bytes.push(b'\n');
    stream.write_all(&bytes).await?;
    stream.flush().await?;

    // Spec §4.2's submitter slack: the worker may legitimately take
    // slightly longer than `timeout_s` to notice its own deadline.
    let deadline = Instant::now() + overall + Duration::from_secs(5);
    let mut reader = BufReader::new(stream);
    let buf = crate::framing::recv_with_deadline(&mut reader, deadline, MAX_LINE_BYTES).await?;
    let line = buf.split(|b| *b == b'\n').next().ok_or(RpcError::ConnectionClosed)?;
    if line.is_empty() {
        return Err(RpcError::ConnectionClosed);
    }
    Ok(serde_json::from_slice(line)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ping_with_no_state_file_is_false() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("askd.json");
        assert!(!ping_daemon("ask", 1.0, &missing).await);
    }

    #[tokio::test]
    async fn shutdown_with_no_state_file_is_false() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("askd.json");
        assert!(!shutdown_daemon("ask", 1.0, &missing).await);
    }
}
