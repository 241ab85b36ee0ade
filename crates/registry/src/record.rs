// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project session record: `{work_dir}/.{provider}-session` (spec §3).

use std::path::{Path, PathBuf};

use ccb_terminal::{Terminal, TerminalKind};
use serde::{Deserialize, Serialize};

use crate::atomic::{read_json_retrying, write_json_atomic};
use crate::error::RegistryError;

/// Binds a project work-dir to a provider TUI pane and transcript file.
///
/// Field names favor plain Rust naming (`session_id`/`session_path`) over
/// the provider-prefixed JSON keys the table in spec §3 shows
/// (`codex_session_id`, `gemini_session_path`, ...) since the provider is
/// already implied by the record's file name (`.{provider}-session`) and
/// by this crate being the sole reader/writer of these files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub terminal: TerminalKind,
    pub pane_handle: String,
    pub pane_title_marker: String,
    pub work_dir: PathBuf,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub session_path: Option<PathBuf>,
    #[serde(default)]
    pub old_session_id: Option<String>,
    #[serde(default)]
    pub old_session_path: Option<PathBuf>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl SessionRecord {
    pub fn new(
        terminal: TerminalKind,
        pane_handle: impl Into<String>,
        pane_title_marker: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            terminal,
            pane_handle: pane_handle.into(),
            pane_title_marker: pane_title_marker.into(),
            work_dir: work_dir.into(),
            session_id: None,
            session_path: None,
            old_session_id: None,
            old_session_path: None,
            active: true,
        }
    }

    /// File path for a given provider's session record under `work_dir`.
    pub fn path_for(work_dir: &Path, provider: ccb_core::Provider) -> PathBuf {
        work_dir.join(format!(".{provider}-session"))
    }

    /// Load the record for `provider` under `work_dir`, if present.
    pub fn load(
        work_dir: &Path,
        provider: ccb_core::Provider,
    ) -> Result<Option<Self>, RegistryError> {
        read_json_retrying(&Self::path_for(work_dir, provider))
    }

    /// Atomically persist this record to its canonical path.
    pub fn save(&self, provider: ccb_core::Provider) -> Result<(), RegistryError> {
        write_json_atomic(&Self::path_for(&self.work_dir, provider), self)
    }

    /// Record a newly observed provider session id/path, stashing the
    /// previous binding under `old_*` for transfer helpers (spec §3).
    pub fn rebind(&mut self, new_session_id: String, new_session_path: PathBuf) {
        self.old_session_id = self.session_id.take();
        self.old_session_path = self.session_path.take();
        self.session_id = Some(new_session_id);
        self.session_path = Some(new_session_path);
    }

    /// The priority-ordered session key used by the worker pool (spec §4.2):
    /// `pane_title_marker` → `pane_handle` → provider session id → `file:<path>`.
    pub fn session_key(&self) -> String {
        if !self.pane_title_marker.is_empty() {
            return self.pane_title_marker.clone();
        }
        if !self.pane_handle.is_empty() {
            return self.pane_handle.clone();
        }
        if let Some(id) = &self.session_id {
            return id.clone();
        }
        match &self.session_path {
            Some(path) => format!("file:{}", path.display()),
            None => format!("file:{}", self.work_dir.display()),
        }
    }

    /// Re-resolve `pane_handle` by title marker if the stored handle is
    /// stale (the pane no longer exists), updating `self` in place.
    pub async fn reresolve_pane(&mut self, terminal: &Terminal) -> bool {
        if terminal.is_alive(&self.pane_handle).await {
            return false;
        }
        let Ok(resolved) = terminal.resolve_pane(&self.pane_title_marker, &self.pane_handle).await
        else {
            return false;
        };
        let changed = resolved != self.pane_handle;
        self.pane_handle = resolved;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccb_core::Provider;

    fn sample(work_dir: &Path) -> SessionRecord {
        SessionRecord::new(TerminalKind::Tmux, "ccb-1", "CCB-marker-1", work_dir)
    }

    #[test]
    fn session_key_prefers_title_marker() {
        let rec = sample(Path::new("/tmp/proj"));
        assert_eq!(rec.session_key(), "CCB-marker-1");
    }

    #[test]
    fn session_key_falls_back_to_file_path_when_nothing_else_known() {
        let mut rec = sample(Path::new("/tmp/proj"));
        rec.pane_title_marker.clear();
        rec.pane_handle.clear();
        assert_eq!(rec.session_key(), "file:/tmp/proj");
    }

    #[test]
    fn rebind_preserves_previous_binding() {
        let mut rec = sample(Path::new("/tmp/proj"));
        rec.rebind("sess-1".into(), PathBuf::from("/log/1.jsonl"));
        rec.rebind("sess-2".into(), PathBuf::from("/log/2.jsonl"));
        assert_eq!(rec.session_id.as_deref(), Some("sess-2"));
        assert_eq!(rec.old_session_id.as_deref(), Some("sess-1"));
        assert_eq!(rec.old_session_path, Some(PathBuf::from("/log/1.jsonl")));
    }

    #[test]
    fn save_then_load_round_trips() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let rec = sample(dir.path());
        rec.save(Provider::Codex)?;
        let loaded = SessionRecord::load(dir.path(), Provider::Codex)?
            .ok_or_else(|| anyhow::anyhow!("expected a record"))?;
        assert_eq!(loaded, rec);
        Ok(())
    }

    #[test]
    fn load_missing_record_returns_none() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(SessionRecord::load(dir.path(), Provider::Gemini)?.is_none());
        Ok(())
    }
}
