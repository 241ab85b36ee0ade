// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal capability layer (spec §2.1): a uniform set of operations —
//! inject text into a pane, query liveness, capture recent screen text,
//! list panes by title marker, create a split — implemented over the
//! three supported multiplexer CLIs (tmux, WezTerm, iTerm2).
//!
//! Modeled as a closed enum rather than a trait object, matching the
//! design note's instruction for per-provider polymorphism to avoid
//! open-world reflection: there are exactly three backends and none are
//! pluggable from outside this crate.

pub mod error;
mod iterm2;
mod proc;
mod tmux;
mod wezterm;

use serde::{Deserialize, Serialize};

pub use error::TerminalError;

/// The terminal multiplexer a session's pane lives in (spec §3, session
/// record field `terminal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalKind {
    Tmux,
    Wezterm,
    Iterm2,
}

/// A pane discovered via [`Terminal::list_panes_by_title_marker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    /// The multiplexer-native handle (tmux session name, WezTerm pane id,
    /// iTerm2 session id).
    pub handle: String,
    pub title: String,
}

/// Uniform terminal-capability facade, dispatching to one of the three
/// multiplexer CLI backends by [`TerminalKind`].
#[derive(Debug, Clone, Copy)]
pub struct Terminal(TerminalKind);

impl Terminal {
    pub fn new(kind: TerminalKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> TerminalKind {
        self.0
    }

    /// Inject `text` into the pane identified by `handle` and submit it
    /// (trailing Enter). Short single-line payloads are typed directly;
    /// multi-line or long payloads go through each backend's paste mode.
    pub async fn inject_text(&self, handle: &str, text: &str) -> Result<(), TerminalError> {
        match self.0 {
            TerminalKind::Tmux => tmux::send_text(handle, text).await,
            TerminalKind::Wezterm => wezterm::send_text(handle, text).await,
            TerminalKind::Iterm2 => iterm2::send_text(handle, text).await,
        }
    }

    /// `true` iff the pane still exists and is accepting input.
    pub async fn is_alive(&self, handle: &str) -> bool {
        match self.0 {
            TerminalKind::Tmux => tmux::is_alive(handle).await,
            TerminalKind::Wezterm => wezterm::is_alive(handle).await,
            TerminalKind::Iterm2 => iterm2::is_alive(handle).await,
        }
    }

    /// Capture recent screen text from the pane (used by the Codex reader's
    /// `■ Conversation interrupted` cancellation check, spec §4.3).
    pub async fn capture_screen(&self, handle: &str, lines: usize) -> Result<String, TerminalError> {
        match self.0 {
            TerminalKind::Tmux => tmux::capture_screen(handle, lines).await,
            TerminalKind::Wezterm => wezterm::capture_screen(handle, lines).await,
            TerminalKind::Iterm2 => iterm2::capture_screen(handle, lines).await,
        }
    }

    /// List panes whose title contains `marker`, used to rediscover a pane
    /// whose stored handle has gone stale (spec §2.2, "best-effort pane
    /// resolution by title marker").
    pub async fn list_panes_by_title_marker(
        &self,
        marker: &str,
    ) -> Result<Vec<PaneInfo>, TerminalError> {
        match self.0 {
            TerminalKind::Tmux => tmux::list_panes_by_title_marker(marker).await,
            TerminalKind::Wezterm => wezterm::list_panes_by_title_marker(marker).await,
            TerminalKind::Iterm2 => iterm2::list_panes_by_title_marker(marker).await,
        }
    }

    /// Create a new pane running `cmd` in `cwd`, returning its handle.
    pub async fn create_split(&self, cmd: &str, cwd: &str) -> Result<String, TerminalError> {
        match self.0 {
            TerminalKind::Tmux => tmux::create_split(cmd, cwd).await,
            TerminalKind::Wezterm => wezterm::create_split(cmd, cwd).await,
            TerminalKind::Iterm2 => iterm2::create_split(cmd, cwd).await,
        }
    }

    /// Tear down the pane.
    pub async fn kill_pane(&self, handle: &str) -> Result<(), TerminalError> {
        match self.0 {
            TerminalKind::Tmux => tmux::kill_pane(handle).await,
            TerminalKind::Wezterm => wezterm::kill_pane(handle).await,
            TerminalKind::Iterm2 => iterm2::kill_pane(handle).await,
        }
    }

    /// Resolve a pane handle via title marker, falling back to the
    /// previously stored handle if no pane with that title exists, or if
    /// more than one does (ambiguous — stick with the caller's existing
    /// handle rather than guessing).
    pub async fn resolve_pane(
        &self,
        marker: &str,
        fallback_handle: &str,
    ) -> Result<String, TerminalError> {
        let mut matches = self.list_panes_by_title_marker(marker).await?;
        match matches.len() {
            1 => Ok(matches.remove(0).handle),
            _ => Ok(fallback_handle.to_owned()),
        }
    }
}

/// Translate a WSL UNC path (`\\wsl.localhost\Ubuntu\home\...`) into the
/// path a native Windows multiplexer binary can launch via `wsl.exe`, per
/// spec §9's Windows/WSL design note. No-op outside that shape.
pub fn translate_wsl_path(path: &str) -> Option<(String, String)> {
    let rest = path.strip_prefix(r"\\wsl.localhost\").or_else(|| path.strip_prefix(r"\\wsl$\"))?;
    let mut parts = rest.splitn(2, '\\');
    let distro = parts.next()?.to_owned();
    let linux_path = format!("/{}", parts.next().unwrap_or("").replace('\\', "/"));
    Some((distro, linux_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_serde() -> anyhow::Result<()> {
        let json = serde_json::to_string(&TerminalKind::Wezterm)?;
        assert_eq!(json, "\"wezterm\"");
        let back: TerminalKind = serde_json::from_str(&json)?;
        assert_eq!(back, TerminalKind::Wezterm);
        Ok(())
    }

    #[test]
    fn translate_wsl_path_splits_distro_and_linux_path() -> anyhow::Result<()> {
        let (distro, path) = translate_wsl_path(r"\\wsl.localhost\Ubuntu\home\user\proj")
            .ok_or_else(|| anyhow::anyhow!("expected a translation"))?;
        assert_eq!(distro, "Ubuntu");
        assert_eq!(path, "/home/user/proj");
        Ok(())
    }

    #[test]
    fn translate_wsl_path_is_none_for_native_paths() {
        assert!(translate_wsl_path(r"C:\Users\me\proj").is_none());
        assert!(translate_wsl_path("/home/me/proj").is_none());
    }
}
