// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared subprocess-invocation helper for the three multiplexer CLIs.
//!
//! Grounded on `original_source/lib/terminal.py`'s `_run` wrapper: every
//! backend shells out to its CLI binary rather than linking a client
//! library, so the only thing worth sharing is consistent error mapping.

use tokio::process::Command;

use crate::error::TerminalError;

/// Run `bin arg...`, returning captured stdout as UTF-8 (lossy) on success.
pub async fn run_capture(bin: &'static str, args: &[&str]) -> Result<String, TerminalError> {
    let output = Command::new(bin)
        .args(args)
        .output()
        .await
        .map_err(|source| TerminalError::Spawn { bin, source })?;
    if !output.status.success() {
        return Err(TerminalError::CommandFailed {
            bin,
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run `bin arg...`, succeeding iff the process exits 0. Used for fire-and-check
/// commands (`send-keys`, `has-session`) where stdout is irrelevant.
pub async fn run_checked(bin: &'static str, args: &[&str]) -> Result<(), TerminalError> {
    run_capture(bin, args).await.map(|_| ())
}

/// Run `bin arg...` feeding `stdin` on the child's standard input, used for
/// bracketed-paste delivery of multi-line or long payloads.
pub async fn run_with_stdin(
    bin: &'static str,
    args: &[&str],
    stdin: &[u8],
) -> Result<(), TerminalError> {
    use std::process::Stdio;
    use tokio::io::AsyncWriteExt;

    let mut child = Command::new(bin)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TerminalError::Spawn { bin, source })?;

    if let Some(mut pipe) = child.stdin.take() {
        let _ = pipe.write_all(stdin).await;
    }

    let output =
        child.wait_with_output().await.map_err(|source| TerminalError::Spawn { bin, source })?;
    if !output.status.success() {
        return Err(TerminalError::CommandFailed {
            bin,
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(())
}

/// `true` iff running `bin arg...` exits 0, swallowing spawn/exit errors.
/// Used for liveness probes where "command failed" just means "not alive".
pub async fn run_succeeds(bin: &'static str, args: &[&str]) -> bool {
    Command::new(bin).args(args).output().await.map(|o| o.status.success()).unwrap_or(false)
}
