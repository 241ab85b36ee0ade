// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WezTerm backend, grounded on `original_source/lib/terminal.py::WeztermBackend`.

use crate::error::TerminalError;
use crate::proc::{run_capture, run_checked, run_with_stdin};
use crate::PaneInfo;

const BIN: &str = "wezterm";
const INLINE_THRESHOLD: usize = 200;

pub async fn send_text(pane_id: &str, text: &str) -> Result<(), TerminalError> {
    let sanitized = text.replace('\r', "");
    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return Ok(());
    }

    if !sanitized.contains('\n') && sanitized.len() <= INLINE_THRESHOLD {
        run_checked(BIN, &["cli", "send-text", "--pane-id", pane_id, "--no-paste", sanitized])
            .await?;
    } else if !sanitized.contains('\n') {
        run_with_stdin(
            BIN,
            &["cli", "send-text", "--pane-id", pane_id, "--no-paste"],
            sanitized.as_bytes(),
        )
        .await?;
    } else {
        // Multi-line payloads go through bracketed paste so the TUI sees
        // one paste event instead of per-line keystrokes.
        run_with_stdin(BIN, &["cli", "send-text", "--pane-id", pane_id], sanitized.as_bytes())
            .await?;
    }
    send_enter(pane_id).await
}

async fn send_enter(pane_id: &str) -> Result<(), TerminalError> {
    run_with_stdin(BIN, &["cli", "send-text", "--pane-id", pane_id, "--no-paste"], b"\r").await
}

pub async fn is_alive(pane_id: &str) -> bool {
    list_panes().await.iter().any(|p| p.handle == pane_id)
}

pub async fn capture_screen(pane_id: &str, _lines: usize) -> Result<String, TerminalError> {
    run_capture(BIN, &["cli", "get-text", "--pane-id", pane_id]).await
}

async fn list_panes() -> Vec<PaneInfo> {
    let Ok(out) = run_capture(BIN, &["cli", "list", "--format", "json"]).await else {
        return Vec::new();
    };
    let Ok(parsed) = serde_json::from_str::<Vec<serde_json::Value>>(&out) else {
        return Vec::new();
    };
    parsed
        .into_iter()
        .filter_map(|p| {
            let handle = p.get("pane_id")?.as_u64()?.to_string();
            let title = p.get("title").and_then(|t| t.as_str()).unwrap_or_default().to_owned();
            Some(PaneInfo { handle, title })
        })
        .collect()
}

pub async fn list_panes_by_title_marker(marker: &str) -> Result<Vec<PaneInfo>, TerminalError> {
    Ok(list_panes().await.into_iter().filter(|p| p.title.contains(marker)).collect())
}

pub async fn create_split(cmd: &str, cwd: &str) -> Result<String, TerminalError> {
    let out = run_capture(BIN, &["cli", "split-pane", "--cwd", cwd, "--", "sh", "-c", cmd]).await?;
    let pane_id = out.trim();
    if pane_id.is_empty() {
        return Err(TerminalError::BadOutput { bin: BIN, detail: "empty split-pane output".into() });
    }
    Ok(pane_id.to_owned())
}

pub async fn kill_pane(pane_id: &str) -> Result<(), TerminalError> {
    run_checked(BIN, &["cli", "kill-pane", "--pane-id", pane_id]).await
}
