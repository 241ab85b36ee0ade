// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-provider transcript readers (spec §4.3): a uniform
//! capture-state/wait-for-message contract implemented once per provider
//! storage shape (Codex's append-only JSONL, Gemini's in-place-mutated
//! JSON, OpenCode's directory-of-small-files, Droid's per-session JSONL).
//!
//! Claude is read-only caller-side tooling (the autoloop's context-window
//! check) rather than a drivable provider, so it isn't one of the
//! [`Reader`] variants; see [`claude_log`].

pub mod backoff;
mod claude_log;
mod codex;
mod droid;
mod error;
mod gemini;
mod opencode;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use ccb_core::Provider;

pub use claude_log::{context_usage_percent, ClaudeContextUsage};
pub use error::TranscriptError;

/// Who produced a transcript event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One observed transcript event: a role plus its full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub role: Role,
    pub text: String,
}

/// The four provider TUIs CCB can drive and tail a transcript for. A
/// strict subset of [`ccb_core::Provider`] — Claude is excluded (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    Codex,
    Gemini,
    Opencode,
    Droid,
}

impl TryFrom<Provider> for ReaderKind {
    type Error = Provider;

    fn try_from(provider: Provider) -> Result<Self, Provider> {
        match provider {
            Provider::Codex => Ok(Self::Codex),
            Provider::Gemini => Ok(Self::Gemini),
            Provider::Opencode => Ok(Self::Opencode),
            Provider::Droid => Ok(Self::Droid),
            Provider::Claude => Err(provider),
        }
    }
}

/// Opaque "everything up to now" cursor, one variant per reader.
#[derive(Debug, Clone)]
pub enum Cursor {
    Codex(codex::Cursor),
    Gemini(gemini::Cursor),
    Opencode(opencode::Cursor),
    Droid(droid::Cursor),
}

/// Closed per-provider transcript reader (spec §4.3), dispatched by
/// [`ReaderKind`] rather than as a trait object for the same reason
/// [`ccb_terminal::Terminal`] is: exactly four shapes exist and none are
/// pluggable from outside this crate.
pub enum Reader {
    Codex(codex::CodexReader),
    Gemini(gemini::GeminiReader),
    Opencode(opencode::OpencodeReader),
    Droid(droid::DroidReader),
}

impl Reader {
    pub fn new(kind: ReaderKind, work_dir: PathBuf) -> Self {
        match kind {
            ReaderKind::Codex => Self::Codex(codex::CodexReader::new(work_dir)),
            ReaderKind::Gemini => Self::Gemini(gemini::GeminiReader::new(work_dir)),
            ReaderKind::Opencode => Self::Opencode(opencode::OpencodeReader::new(work_dir)),
            ReaderKind::Droid => Self::Droid(droid::DroidReader::new(work_dir)),
        }
    }

    pub fn kind(&self) -> ReaderKind {
        match self {
            Self::Codex(_) => ReaderKind::Codex,
            Self::Gemini(_) => ReaderKind::Gemini,
            Self::Opencode(_) => ReaderKind::Opencode,
            Self::Droid(_) => ReaderKind::Droid,
        }
    }

    pub async fn capture_state(&self) -> Cursor {
        match self {
            Self::Codex(r) => Cursor::Codex(r.capture_state().await),
            Self::Gemini(r) => Cursor::Gemini(r.capture_state().await),
            Self::Opencode(r) => Cursor::Opencode(r.capture_state().await),
            Self::Droid(r) => Cursor::Droid(r.capture_state().await),
        }
    }

    /// Rebind after dropping a session-id filter (the Codex escape hatch,
    /// spec §4.3): seek to `max(0, size - tail_bytes)` rather than EOF, so
    /// a reply that already landed in the file we rebound to isn't lost.
    /// Every other provider has no such filter to drop, so it falls back
    /// to a plain [`Reader::capture_state`].
    pub async fn rebind_near_tail(&self, tail_bytes: u64) -> Cursor {
        match self {
            Self::Codex(r) => Cursor::Codex(r.rebind_near_tail(tail_bytes).await),
            _ => self.capture_state().await,
        }
    }

    /// Block (up to `timeout`) for the next event past `cursor`, returning
    /// the advanced cursor regardless of whether an event was found.
    pub async fn wait_for_message(
        &self,
        cursor: Cursor,
        timeout: Duration,
    ) -> (Option<Event>, Cursor) {
        match (self, cursor) {
            (Self::Codex(r), Cursor::Codex(c)) => {
                let (e, c) = r.wait_for_message(c, timeout).await;
                (e, Cursor::Codex(c))
            }
            (Self::Gemini(r), Cursor::Gemini(c)) => {
                let (e, c) = r.wait_for_message(c, timeout).await;
                (e, Cursor::Gemini(c))
            }
            (Self::Opencode(r), Cursor::Opencode(c)) => {
                let (e, c) = r.wait_for_message(c, timeout).await;
                (e, Cursor::Opencode(c))
            }
            (Self::Droid(r), Cursor::Droid(c)) => {
                let (e, c) = r.wait_for_message(c, timeout).await;
                (e, Cursor::Droid(c))
            }
            (_, mismatched) => (None, mismatched),
        }
    }

    pub async fn current_session_path(&self) -> Option<PathBuf> {
        match self {
            Self::Codex(r) => r.current_session_path().await,
            Self::Gemini(r) => r.current_session_path().await,
            Self::Opencode(r) => r.current_session_path().await,
            Self::Droid(r) => r.current_session_path().await,
        }
    }

    pub fn set_preferred_session(&mut self, path: PathBuf) {
        match self {
            Self::Codex(r) => r.set_preferred_session(path),
            Self::Gemini(r) => r.set_preferred_session(path),
            Self::Opencode(r) => r.set_preferred_session(path),
            Self::Droid(r) => r.set_preferred_session(path),
        }
    }

    pub fn set_session_id_hint(&mut self, id: String) {
        match self {
            Self::Codex(r) => r.set_session_id_hint(id),
            Self::Gemini(_) | Self::Opencode(_) => {}
            Self::Droid(r) => r.set_session_id_hint(id),
        }
    }

    /// Drop a bound session-id filter (the Codex "escape hatch", spec
    /// §4.3: dropped if no event lands within ~1.5 s, rebinding to the
    /// latest file and seeking to `max(0, size - tail_bytes)`). A no-op for
    /// every other provider, which have no such filter to drop.
    pub async fn clear_session_id_filter(&self) {
        if let Self::Codex(r) = self {
            r.clear_session_id_filter().await;
        }
    }

    pub async fn latest_message(&self) -> Option<String> {
        match self {
            Self::Codex(r) => r.latest_message().await,
            Self::Gemini(r) => r.latest_message().await,
            Self::Opencode(r) => r.latest_message().await,
            Self::Droid(r) => r.latest_message().await,
        }
    }

    pub async fn latest_conversations(&self, n: usize) -> Vec<(String, String)> {
        match self {
            Self::Codex(r) => r.latest_conversations(n).await,
            Self::Gemini(r) => r.latest_conversations(n).await,
            Self::Opencode(r) => r.latest_conversations(n).await,
            Self::Droid(r) => r.latest_conversations(n).await,
        }
    }
}

/// Thin dynamic-dispatch facade over [`Reader`], for the daemon's
/// per-provider adapter registry (spec §4.5) where a `Vec<Box<dyn
/// TranscriptReader>>`-shaped lookup is more convenient than matching on
/// [`ReaderKind`] at every call site. [`Reader`] remains the concrete,
/// enum-dispatched implementation; this trait exists only at that seam.
#[async_trait]
pub trait TranscriptReader: Send + Sync {
    async fn capture_state(&self) -> Cursor;
    async fn wait_for_message(&self, cursor: Cursor, timeout: Duration) -> (Option<Event>, Cursor);
    async fn latest_message(&self) -> Option<String>;
}

#[async_trait]
impl TranscriptReader for Reader {
    async fn capture_state(&self) -> Cursor {
        Reader::capture_state(self).await
    }

    async fn wait_for_message(&self, cursor: Cursor, timeout: Duration) -> (Option<Event>, Cursor) {
        Reader::wait_for_message(self, cursor, timeout).await
    }

    async fn latest_message(&self) -> Option<String> {
        Reader::latest_message(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_kind_excludes_claude() {
        assert!(ReaderKind::try_from(Provider::Claude).is_err());
        assert!(ReaderKind::try_from(Provider::Codex).is_ok());
    }
}
