// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tmux backend, grounded on `original_source/lib/terminal.py::TmuxBackend`.

use crate::error::TerminalError;
use crate::proc::{run_capture, run_checked, run_succeeds, run_with_stdin};
use crate::PaneInfo;

const BIN: &str = "tmux";
/// Below this length and with no embedded newline, `send-keys -l` is used
/// directly; above it (or for multi-line text) a load-buffer/paste-buffer
/// round trip avoids argv length limits and shell-quoting pitfalls.
const INLINE_THRESHOLD: usize = 200;

pub async fn send_text(session: &str, text: &str) -> Result<(), TerminalError> {
    let sanitized = text.replace('\r', "");
    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return Ok(());
    }

    if !sanitized.contains('\n') && sanitized.len() <= INLINE_THRESHOLD {
        run_checked(BIN, &["send-keys", "-t", session, "-l", sanitized]).await?;
        return run_checked(BIN, &["send-keys", "-t", session, "Enter"]).await;
    }

    let buffer_name = format!("ccb-{}-{}", std::process::id(), epoch_ms());
    run_with_stdin(BIN, &["load-buffer", "-b", &buffer_name, "-"], sanitized.as_bytes()).await?;
    let result = match run_checked(BIN, &["paste-buffer", "-t", session, "-b", &buffer_name, "-p"]).await {
        Ok(()) => run_checked(BIN, &["send-keys", "-t", session, "Enter"]).await,
        Err(e) => Err(e),
    };
    let _ = run_checked(BIN, &["delete-buffer", "-b", &buffer_name]).await;
    result
}

pub async fn is_alive(session: &str) -> bool {
    run_succeeds(BIN, &["has-session", "-t", session]).await
}

pub async fn capture_screen(session: &str, lines: usize) -> Result<String, TerminalError> {
    let start = format!("-{lines}");
    run_capture(BIN, &["capture-pane", "-p", "-t", session, "-S", &start]).await
}

pub async fn list_panes_by_title_marker(marker: &str) -> Result<Vec<PaneInfo>, TerminalError> {
    let out = run_capture(BIN, &["list-panes", "-a", "-F", "#{pane_id}\t#{pane_title}"]).await?;
    Ok(out
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .filter(|(_, title)| title.contains(marker))
        .map(|(handle, title)| PaneInfo { handle: handle.to_owned(), title: title.to_owned() })
        .collect())
}

pub async fn create_split(cmd: &str, cwd: &str) -> Result<String, TerminalError> {
    let session_name = format!("ccb-{}-{}", epoch_ms() % 100_000, std::process::id());
    run_checked(BIN, &["new-session", "-d", "-s", &session_name, "-c", cwd, cmd]).await?;
    Ok(session_name)
}

pub async fn kill_pane(session: &str) -> Result<(), TerminalError> {
    run_checked(BIN, &["kill-session", "-t", session]).await
}

fn epoch_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_threshold_matches_teacher_wrap_boundary() {
        assert_eq!(INLINE_THRESHOLD, 200);
    }
}
