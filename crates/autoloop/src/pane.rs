// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolving the caller's own pane, so the supervisor can inject `/clear`
//! and `/tr` directly (spec §4.6). The caller's CLI front-end (`ask`/
//! `pend`) is out of scope, so unlike a delegated provider, there is no
//! `.{provider}-session` record this crate can reuse verbatim; grounded
//! instead on `original_source/claude_skills/tr/scripts/autoloop.py`'s
//! `_get_pane_id`: a `CLAUDE_PANE_ID` env var, else the first of a short
//! list of candidate session files under the repo root carrying a
//! `pane_id` field.

use std::path::{Path, PathBuf};

use ccb_terminal::TerminalKind;
use serde::Deserialize;

/// A resolved pane to inject into, with the terminal backend it lives in.
/// The original tool only ever drives tmux panes for the caller; an
/// explicit `terminal` field in the session file lets a future caller
/// override that without changing this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerPane {
    pub terminal: TerminalKind,
    pub pane_handle: String,
}

#[derive(Debug, Deserialize)]
struct SessionFile {
    #[serde(default)]
    pane_id: Option<String>,
    #[serde(default)]
    terminal: Option<TerminalKind>,
}

fn candidate_session_files(repo: &Path) -> [PathBuf; 3] {
    [repo.join(".ccb").join(".claude-session"), repo.join(".ccb_config").join(".claude-session"), repo.join(".claude-session")]
}

fn load_from_file(path: &Path) -> Option<CallerPane> {
    let raw = std::fs::read(path).ok()?;
    let parsed: SessionFile = serde_json::from_slice(&raw).ok()?;
    let pane_handle = parsed.pane_id?;
    Some(CallerPane { terminal: parsed.terminal.unwrap_or(TerminalKind::Tmux), pane_handle })
}

/// Resolve the caller's pane: `CLAUDE_PANE_ID` env var first (terminal
/// assumed tmux, matching the original), then each candidate session file
/// in order. `None` means the supervisor cannot act this tick.
pub fn resolve_caller_pane(repo: &Path) -> Option<CallerPane> {
    if let Ok(pane_id) = std::env::var("CLAUDE_PANE_ID") {
        if !pane_id.is_empty() {
            return Some(CallerPane { terminal: TerminalKind::Tmux, pane_handle: pane_id });
        }
    }
    candidate_session_files(repo).into_iter().find_map(|path| load_from_file(&path))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial(claude_pane_id_env)]
    fn env_var_takes_priority_over_session_files() {
        std::env::set_var("CLAUDE_PANE_ID", "pane-from-env");
        let dir = tempfile::tempdir().expect("tempdir");
        let result = resolve_caller_pane(dir.path());
        std::env::remove_var("CLAUDE_PANE_ID");
        assert_eq!(result, Some(CallerPane { terminal: TerminalKind::Tmux, pane_handle: "pane-from-env".to_owned() }));
    }

    #[test]
    #[serial(claude_pane_id_env)]
    fn falls_back_to_dot_ccb_session_file() -> anyhow::Result<()> {
        std::env::remove_var("CLAUDE_PANE_ID");
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join(".ccb"))?;
        std::fs::write(dir.path().join(".ccb").join(".claude-session"), r#"{"pane_id": "ccb-3"}"#)?;
        let result = resolve_caller_pane(dir.path());
        assert_eq!(result, Some(CallerPane { terminal: TerminalKind::Tmux, pane_handle: "ccb-3".to_owned() }));
        Ok(())
    }

    #[test]
    #[serial(claude_pane_id_env)]
    fn none_when_nothing_resolves() {
        std::env::remove_var("CLAUDE_PANE_ID");
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(resolve_caller_pane(dir.path()).is_none());
    }
}
