// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini transcript reader: a single JSON file, updated in place, under
//! `~/.gemini/tmp/<hash>/chats/session-*.json` (spec §4.3).
//!
//! Grounded on `original_source/lib/gemini_comm.py`'s `GeminiLogReader`:
//! the project directory name is tried as both `basename(work_dir)`
//! (Gemini CLI >= 0.29) and `sha256(abs(work_dir))` (older CLIs), message
//! count/size/mtime-ns/last-assistant-hash all participate in change
//! detection to cope with size-stable in-place writes, and an "unknown
//! baseline" read (the file didn't parse when `capture_state` ran) is
//! handled specially so a reply that lands on the very first successful
//! read isn't mistaken for pre-existing history.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::backoff::{read_json_default_backoff, ReadOutcome};
use crate::{Event, Role};

fn gemini_root() -> PathBuf {
    std::env::var_os("GEMINI_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".gemini").join("tmp"))
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

fn basename_hash(work_dir: &Path) -> String {
    work_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn sha256_hash(work_dir: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(work_dir.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct SessionFile {
    #[serde(default)]
    messages: Vec<SessionMessage>,
}

#[derive(Debug, Deserialize)]
struct SessionMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

fn last_gemini(data: &SessionFile) -> Option<(Option<String>, String)> {
    data.messages
        .iter()
        .rev()
        .find(|m| m.kind.as_deref() == Some("gemini"))
        .map(|m| (m.id.clone(), m.content.clone().unwrap_or_default().trim().to_owned()))
}

/// Cancellation detection (spec §4.3): Gemini writes a trailing `info`
/// message containing "Request cancelled." rather than rotating the
/// `gemini`-kind reply. `last_gemini` alone would never surface it since
/// it only ever looks at `gemini`-kind entries, so the wait loop checks
/// this separately and reports it as the request's terminal event — the
/// per-session worker lane guarantees only our own in-flight request can
/// produce a fresh trailing `info` cancellation while we're waiting on it.
fn trailing_cancellation(data: &SessionFile) -> Option<String> {
    let last = data.messages.last()?;
    if last.kind.as_deref() != Some("info") {
        return None;
    }
    let content = last.content.as_deref().unwrap_or_default();
    content.contains("Request cancelled.").then(|| content.trim().to_owned())
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Default)]
pub struct Cursor {
    session_path: Option<PathBuf>,
    msg_count: Option<usize>,
    mtime_ns: i128,
    size: u64,
    last_id: Option<String>,
    last_hash: Option<String>,
}

pub struct GeminiReader {
    work_dir: PathBuf,
    root: PathBuf,
    project_hash: RwLock<String>,
    preferred_session: RwLock<Option<PathBuf>>,
    poll_interval: Duration,
    force_read_interval: Duration,
}

impl GeminiReader {
    pub fn new(work_dir: PathBuf) -> Self {
        let project_hash = std::env::var("GEMINI_PROJECT_HASH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| basename_hash(&work_dir));
        Self {
            work_dir,
            root: gemini_root(),
            project_hash: RwLock::new(project_hash),
            preferred_session: RwLock::new(None),
            poll_interval: Duration::from_millis(50),
            force_read_interval: Duration::from_secs(1),
        }
    }

    pub fn set_preferred_session(&mut self, path: PathBuf) {
        *self.preferred_session.get_mut() = Some(path);
    }

    pub async fn current_session_path(&self) -> Option<PathBuf> {
        self.latest_session().await
    }

    /// Picks the chats directory that exists, preferring the basename
    /// form and falling back to the sha256 form (spec §4.3, "the TUI
    /// migrated between schemes").
    async fn scan_latest_session(&self) -> Option<PathBuf> {
        let candidates = [basename_hash(&self.work_dir), sha256_hash(&self.work_dir)];
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
            let mut winning_hash = None;
            for hash in candidates {
                let chats = root.join(&hash).join("chats");
                let Ok(entries) = std::fs::read_dir(&chats) else { continue };
                for entry in entries.flatten() {
                    let path = entry.path();
                    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                    if !(name.starts_with("session-") && name.ends_with(".json")) {
                        continue;
                    }
                    let Ok(meta) = entry.metadata() else { continue };
                    let Ok(mtime) = meta.modified() else { continue };
                    if best.as_ref().is_none_or(|(m, _)| mtime > *m) {
                        best = Some((mtime, path));
                        winning_hash = Some(hash.clone());
                    }
                }
            }
            best.map(|(_, path)| path).map(|path| (path, winning_hash))
        })
        .await
        .ok()
        .flatten()
        .map(|(path, hash)| {
            if let Some(hash) = hash {
                if let Ok(mut guard) = self.project_hash.try_write() {
                    *guard = hash;
                }
            }
            path
        })
    }

    async fn latest_session(&self) -> Option<PathBuf> {
        let preferred = self.preferred_session.read().await.clone();
        let scanned = self.scan_latest_session().await;
        match (preferred, scanned) {
            (Some(p), Some(s)) if p.exists() => {
                let newer = match (mtime(&p).await, mtime(&s).await) {
                    (Some(pm), Some(sm)) => sm > pm,
                    _ => false,
                };
                if newer {
                    *self.preferred_session.write().await = Some(s.clone());
                    Some(s)
                } else {
                    Some(p)
                }
            }
            (Some(p), None) if p.exists() => Some(p),
            (_, Some(s)) => {
                *self.preferred_session.write().await = Some(s.clone());
                Some(s)
            }
            _ => None,
        }
    }

    pub async fn capture_state(&self) -> Cursor {
        let session_path = self.latest_session().await;
        let Some(path) = session_path.clone() else { return Cursor::default() };
        let (mtime_ns, size) = stat(&path).await;
        match read_json_default_backoff::<SessionFile>(&path).await {
            Ok(ReadOutcome::Parsed(data)) => {
                let (last_id, last_hash) = match last_gemini(&data) {
                    Some((id, content)) => (id, Some(content_hash(&content))),
                    None => (None, None),
                };
                Cursor {
                    session_path,
                    msg_count: Some(data.messages.len()),
                    mtime_ns,
                    size,
                    last_id,
                    last_hash,
                }
            }
            // Unparseable-on-capture is the "unknown baseline" case (spec
            // §4.3): leave msg_count unset so the wait loop knows not to
            // treat its first successful read as history.
            _ => Cursor { session_path, msg_count: None, mtime_ns, size, last_id: None, last_hash: None },
        }
    }

    pub async fn wait_for_message(&self, cursor: Cursor, timeout: Duration) -> (Option<Event>, Cursor) {
        let deadline = Instant::now() + timeout;
        let mut cursor = cursor;
        let mut last_forced_read = Instant::now();
        loop {
            let Some(session) = self.latest_session().await else {
                if Instant::now() >= deadline {
                    return (None, cursor);
                }
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };
            if cursor.session_path.as_deref() != Some(session.as_path()) {
                cursor = Cursor { session_path: Some(session.clone()), ..Cursor::default() };
            }

            let (mtime_ns, size) = stat(&session).await;
            let unchanged = mtime_ns <= cursor.mtime_ns && size == cursor.size;
            let force_due = last_forced_read.elapsed() >= self.force_read_interval;
            if unchanged && !force_due {
                if Instant::now() >= deadline {
                    return (None, cursor);
                }
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            match read_json_default_backoff::<SessionFile>(&session).await {
                Ok(ReadOutcome::Parsed(data)) => {
                    last_forced_read = Instant::now();
                    let unknown_baseline = cursor.msg_count.is_none();
                    let current_count = data.messages.len();
                    let last = last_gemini(&data);

                    if !unknown_baseline && current_count > cursor.msg_count.unwrap_or(0) {
                        if let Some(cancel_text) = trailing_cancellation(&data) {
                            return (
                                Some(Event { role: Role::Assistant, text: cancel_text }),
                                Cursor { session_path: Some(session), msg_count: Some(current_count), mtime_ns, size, ..cursor },
                            );
                        }
                    }

                    if unknown_baseline {
                        if let Some((id, content)) = &last {
                            if !content.is_empty() {
                                return (
                                    Some(Event { role: Role::Assistant, text: content.clone() }),
                                    Cursor {
                                        session_path: Some(session),
                                        msg_count: Some(current_count),
                                        mtime_ns,
                                        size,
                                        last_id: id.clone(),
                                        last_hash: Some(content_hash(content)),
                                    },
                                );
                            }
                        }
                        cursor = Cursor {
                            session_path: Some(session),
                            msg_count: Some(current_count),
                            mtime_ns,
                            size,
                            last_id: last.as_ref().and_then(|(id, _)| id.clone()),
                            last_hash: last.as_ref().map(|(_, c)| content_hash(c)),
                        };
                    } else if let Some((id, content)) = last {
                        let changed = id != cursor.last_id
                            || Some(content_hash(&content)) != cursor.last_hash;
                        if changed && !content.is_empty() {
                            return (
                                Some(Event { role: Role::Assistant, text: content.clone() }),
                                Cursor {
                                    session_path: Some(session),
                                    msg_count: Some(current_count),
                                    mtime_ns,
                                    size,
                                    last_id: id,
                                    last_hash: Some(content_hash(&content)),
                                },
                            );
                        }
                        cursor = Cursor {
                            session_path: Some(session),
                            msg_count: Some(current_count),
                            mtime_ns,
                            size,
                            last_id: id,
                            last_hash: Some(content_hash(&content)),
                        };
                    } else {
                        cursor = Cursor {
                            session_path: Some(session),
                            msg_count: Some(current_count),
                            mtime_ns,
                            size,
                            ..cursor
                        };
                    }
                }
                _ => {
                    cursor = Cursor { session_path: Some(session), mtime_ns, size, ..cursor };
                }
            }

            if Instant::now() >= deadline {
                return (None, cursor);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn latest_message(&self) -> Option<String> {
        let session = self.latest_session().await?;
        match read_json_default_backoff::<SessionFile>(&session).await {
            Ok(ReadOutcome::Parsed(data)) => {
                data.messages.iter().rev().find(|m| m.kind.as_deref() == Some("gemini")).and_then(|m| {
                    let text = m.content.clone().unwrap_or_default();
                    let trimmed = text.trim();
                    (!trimmed.is_empty()).then(|| trimmed.to_owned())
                })
            }
            _ => None,
        }
    }

    pub async fn latest_conversations(&self, n: usize) -> Vec<(String, String)> {
        let Some(session) = self.latest_session().await else { return Vec::new() };
        let Ok(ReadOutcome::Parsed(data)) = read_json_default_backoff::<SessionFile>(&session).await
        else {
            return Vec::new();
        };

        let mut pairs = Vec::new();
        let mut pending_user = String::new();
        for msg in &data.messages {
            let content = msg.content.clone().unwrap_or_default();
            let content = content.trim();
            match msg.kind.as_deref() {
                Some("user") => pending_user = content.to_owned(),
                Some("gemini") if !content.is_empty() => {
                    pairs.push((std::mem::take(&mut pending_user), content.to_owned()));
                }
                _ => {}
            }
        }
        let keep = n.max(1);
        let start = pairs.len().saturating_sub(keep);
        pairs.split_off(start)
    }
}

async fn mtime(path: &Path) -> Option<std::time::SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

async fn stat(path: &Path) -> (i128, u64) {
    match tokio::fs::metadata(path).await {
        Ok(meta) => {
            let ns = meta
                .modified()
                .ok()
                .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_nanos() as i128)
                .unwrap_or(0);
            (ns, meta.len())
        }
        Err(_) => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_session(path: &Path, messages: &str) -> anyhow::Result<()> {
        std::fs::write(path, format!(r#"{{"messages": {messages}}}"#))?;
        Ok(())
    }

    #[tokio::test]
    async fn latest_message_returns_last_gemini_content() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let chats = dir.path().join("proj").join("chats");
        tokio::fs::create_dir_all(&chats).await?;
        let session = chats.join("session-1.json");
        write_session(
            &session,
            r#"[{"type":"user","content":"hi"},{"type":"gemini","content":"hello there"}]"#,
        )?;

        let mut reader = GeminiReader::new(PathBuf::from("/irrelevant"));
        reader.root = dir.path().to_owned();
        reader.project_hash = RwLock::new("proj".to_owned());
        assert_eq!(reader.latest_message().await.as_deref(), Some("hello there"));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_baseline_does_not_miss_a_reply_present_on_first_read() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let chats = dir.path().join("proj").join("chats");
        tokio::fs::create_dir_all(&chats).await?;
        let session = chats.join("session-1.json");
        // Capture state before the file exists: msg_count is unknown.
        let cursor = Cursor::default();

        write_session(&session, r#"[{"type":"gemini","content":"already here"}]"#)?;

        let mut reader = GeminiReader::new(PathBuf::from("/irrelevant"));
        reader.root = dir.path().to_owned();
        reader.project_hash = RwLock::new("proj".to_owned());

        let (event, _) = reader.wait_for_message(cursor, Duration::from_millis(300)).await;
        assert_eq!(event.map(|e| e.text), Some("already here".to_owned()));
        Ok(())
    }

    #[tokio::test]
    async fn wait_for_message_surfaces_trailing_cancellation() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let chats = dir.path().join("proj").join("chats");
        tokio::fs::create_dir_all(&chats).await?;
        let session = chats.join("session-1.json");
        write_session(
            &session,
            r#"[{"type":"user","content":"hi"},{"type":"gemini","content":"hello there"}]"#,
        )?;

        let mut reader = GeminiReader::new(PathBuf::from("/irrelevant"));
        reader.root = dir.path().to_owned();
        reader.project_hash = RwLock::new("proj".to_owned());
        let cursor = reader.capture_state().await;

        write_session(
            &session,
            r#"[{"type":"user","content":"hi"},{"type":"gemini","content":"hello there"},{"type":"info","content":"Request cancelled."}]"#,
        )?;

        let (event, _) = reader.wait_for_message(cursor, Duration::from_millis(300)).await;
        let event = event.ok_or_else(|| anyhow::anyhow!("expected a cancellation event"))?;
        assert!(event.text.contains("Request cancelled."));
        Ok(())
    }

    #[tokio::test]
    async fn latest_conversations_pairs_user_and_gemini_messages() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let chats = dir.path().join("proj").join("chats");
        tokio::fs::create_dir_all(&chats).await?;
        let session = chats.join("session-1.json");
        write_session(
            &session,
            r#"[{"type":"user","content":"q1"},{"type":"gemini","content":"a1"},{"type":"user","content":"q2"},{"type":"gemini","content":"a2"}]"#,
        )?;

        let mut reader = GeminiReader::new(PathBuf::from("/irrelevant"));
        reader.root = dir.path().to_owned();
        reader.project_hash = RwLock::new("proj".to_owned());
        let pairs = reader.latest_conversations(1).await;
        assert_eq!(pairs, vec![("q2".to_owned(), "a2".to_owned())]);
        Ok(())
    }
}
