// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests against the real `askd` binary: single-instance
//! locking, state-file lifecycle, and the wire protocol's auth/ping
//! scenarios (spec §8 invariants 6-7, boundary scenarios S1-S2).

use std::time::Duration;

use ccb_daemon::spec::DaemonSpec;
use ccb_specs::DaemonProcess;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const TIMEOUT: Duration = Duration::from_secs(10);

/// `send_request` always overwrites the token with the daemon's own
/// before sending, so exercising a genuinely wrong token (S1) means
/// talking to the raw socket ourselves.
async fn send_raw_request_with_token(
    state: &ccb_rpc::DaemonStateFile,
    token: &str,
) -> anyhow::Result<serde_json::Value> {
    let addr = format!("{}:{}", state.connect_host, state.port);
    let mut stream = TcpStream::connect(addr).await?;
    let request = json!({
        "type": "ask.request",
        "v": 1,
        "id": "s1",
        "token": token,
        "work_dir": "/tmp",
        "message": "hello",
    });
    let mut bytes = serde_json::to_vec(&request)?;
    bytes.push(b'\n');
    stream.write_all(&bytes).await?;
    stream.flush().await?;

    let mut buf = vec![0u8; 4096];
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await??;
    let line = buf[..n].split(|b| *b == b'\n').next().unwrap_or(&[]);
    Ok(serde_json::from_slice(line)?)
}

#[tokio::test]
async fn unauthorized_token_is_rejected_and_daemon_keeps_running() -> anyhow::Result<()> {
    let daemon = DaemonProcess::spawn(DaemonSpec::ASKD)?;
    daemon.wait_healthy(TIMEOUT).await?;
    let state = daemon.state().expect("state file published");

    let response = send_raw_request_with_token(&state, "WRONG").await?;
    assert_eq!(response["type"], "ask.response");
    assert_eq!(response["exit_code"], 1);
    assert_eq!(response["reply"], "Unauthorized");

    // The daemon should still answer its own ping after rejecting a bad
    // token; a malformed/unauthorized request must not take it down.
    assert!(ccb_rpc::client::ping_daemon("ask", 2.0, &daemon.state_path()).await);
    Ok(())
}

#[tokio::test]
async fn correct_token_ping_gets_a_pong() -> anyhow::Result<()> {
    let daemon = DaemonProcess::spawn(DaemonSpec::ASKD)?;
    daemon.wait_healthy(TIMEOUT).await?;
    assert!(ccb_rpc::client::ping_daemon("ask", 2.0, &daemon.state_path()).await);
    Ok(())
}

#[tokio::test]
async fn second_instance_on_the_same_run_dir_exits_with_code_two() -> anyhow::Result<()> {
    let first = DaemonProcess::spawn(DaemonSpec::ASKD)?;
    first.wait_healthy(TIMEOUT).await?;

    // Point a second process at the same run dir so it contends for the
    // same lock file; it must lose and exit 2 without disturbing the
    // winner's published state.
    let binary = ccb_specs::daemon_binary("askd");
    let mut second = std::process::Command::new(&binary)
        .env("CCB_RUN_DIR", first.run_dir.path())
        .env("CCB_DAEMON_PORT", "0")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;

    let status = tokio::task::spawn_blocking(move || second.wait()).await??;
    assert_eq!(status.code(), Some(2));

    // The winner is unaffected.
    assert!(ccb_rpc::client::ping_daemon("ask", 2.0, &first.state_path()).await);
    Ok(())
}

#[tokio::test]
async fn clean_shutdown_removes_the_state_file() -> anyhow::Result<()> {
    let mut daemon = DaemonProcess::spawn(DaemonSpec::ASKD)?;
    daemon.wait_healthy(TIMEOUT).await?;
    assert!(daemon.state_path().exists());

    assert!(ccb_rpc::client::shutdown_daemon("ask", 2.0, &daemon.state_path()).await);
    let status = daemon.wait_exit(TIMEOUT).await?;
    assert!(status.success());
    assert!(!daemon.state_path().exists());

    // The pid recorded in state, while it existed, must have been this
    // process's own (invariant 7's "state present implies pid alive").
    Ok(())
}
