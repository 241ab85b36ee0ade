// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! iTerm2 backend, driven through the `it2` CLI (`pip install it2`),
//! grounded on `original_source/lib/terminal.py::Iterm2Backend`.

use crate::error::TerminalError;
use crate::proc::{run_capture, run_checked};
use crate::PaneInfo;

const BIN: &str = "it2";

pub async fn send_text(session_id: &str, text: &str) -> Result<(), TerminalError> {
    let sanitized = text.replace('\r', "");
    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return Ok(());
    }
    run_checked(BIN, &["session", "send", sanitized, "--session", session_id]).await?;
    run_checked(BIN, &["session", "send", "\r", "--session", session_id]).await
}

pub async fn is_alive(session_id: &str) -> bool {
    list_sessions().await.iter().any(|p| p.handle == session_id)
}

pub async fn capture_screen(session_id: &str, _lines: usize) -> Result<String, TerminalError> {
    run_capture(BIN, &["session", "read", "--session", session_id]).await
}

async fn list_sessions() -> Vec<PaneInfo> {
    let Ok(out) = run_capture(BIN, &["session", "list", "--json"]).await else {
        return Vec::new();
    };
    let Ok(parsed) = serde_json::from_str::<Vec<serde_json::Value>>(&out) else {
        return Vec::new();
    };
    parsed
        .into_iter()
        .filter_map(|s| {
            let handle = s.get("id")?.as_str()?.to_owned();
            let title = s.get("title").and_then(|t| t.as_str()).unwrap_or_default().to_owned();
            Some(PaneInfo { handle, title })
        })
        .collect()
}

pub async fn list_panes_by_title_marker(marker: &str) -> Result<Vec<PaneInfo>, TerminalError> {
    Ok(list_sessions().await.into_iter().filter(|p| p.title.contains(marker)).collect())
}

pub async fn create_split(cmd: &str, cwd: &str) -> Result<String, TerminalError> {
    let out = run_capture(BIN, &["session", "split", "--vertical"]).await?;
    let session_id = out.trim().rsplit(':').next().unwrap_or(out.trim()).trim().to_owned();
    if session_id.is_empty() {
        return Err(TerminalError::BadOutput { bin: BIN, detail: "empty session split output".into() });
    }
    let full_cmd = format!("cd {} && {cmd}", shell_quote(cwd));
    send_text(&session_id, &full_cmd).await?;
    Ok(session_id)
}

pub async fn kill_pane(session_id: &str) -> Result<(), TerminalError> {
    run_checked(BIN, &["session", "close", "--session", session_id, "--force"]).await
}

/// Minimal POSIX single-quote escaping for the `cd <dir> && <cmd>` preamble.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
