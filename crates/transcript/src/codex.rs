// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex transcript reader: append-only JSONL under `~/.codex/sessions`.
//!
//! `codex_comm.py` (the module `original_source/lib/caskd_daemon.py` calls
//! `CodexLogReader` from) was not retained in the source pack. This reader
//! is reconstructed from `caskd_daemon.py`'s usage of `CodexLogReader`
//! (`capture_state`, `wait_for_event`, `current_log_path`,
//! `_extract_session_id`) and mirrors `droid.rs`'s JSONL-tailing shape,
//! since Codex's storage (append-only JSONL keyed by a `session_meta`
//! entry carrying `cwd`/`id`) is the same family as Droid's.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{Event, Role};

fn sessions_root() -> PathBuf {
    std::env::var_os("CODEX_SESSIONS_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| dirs_home().join(".codex").join("sessions"))
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RolloutLine {
    SessionMeta { payload: SessionMetaPayload },
    ResponseItem { payload: MessagePayload },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct SessionMetaPayload {
    id: String,
    cwd: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

fn extract_text(payload: &MessagePayload) -> Option<String> {
    let joined = payload
        .content
        .iter()
        .filter_map(|c| c.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cursor {
    session_path: Option<PathBuf>,
    offset: u64,
    carry: Vec<u8>,
}

pub struct CodexReader {
    work_dir: PathBuf,
    root: PathBuf,
    preferred_session: RwLock<Option<PathBuf>>,
    session_id_filter: RwLock<Option<String>>,
    poll_interval: Duration,
}

impl CodexReader {
    pub fn new(work_dir: PathBuf) -> Self {
        Self {
            work_dir,
            root: sessions_root(),
            preferred_session: RwLock::new(None),
            session_id_filter: RwLock::new(None),
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn set_preferred_session(&mut self, path: PathBuf) {
        *self.preferred_session.get_mut() = Some(path);
    }

    pub fn set_session_id_hint(&mut self, id: String) {
        *self.session_id_filter.get_mut() = Some(id);
    }

    /// Drop a bound session-id filter (the escape hatch spec §4.3 describes
    /// when no event is observed within ~1.5s of a bound request).
    pub async fn clear_session_id_filter(&self) {
        *self.session_id_filter.write().await = None;
    }

    pub async fn current_session_path(&self) -> Option<PathBuf> {
        self.latest_session().await
    }

    async fn find_session_by_id(&self, session_id: &str) -> Option<PathBuf> {
        let root = self.root.clone();
        let session_id = session_id.to_owned();
        tokio::task::spawn_blocking(move || find_session_by_id_blocking(&root, &session_id))
            .await
            .ok()
            .flatten()
    }

    async fn scan_latest_session(&self) -> Option<PathBuf> {
        let root = self.root.clone();
        let work_dir = self.work_dir.clone();
        tokio::task::spawn_blocking(move || scan_latest_session_blocking(&root, &work_dir))
            .await
            .ok()
            .flatten()
    }

    async fn latest_session(&self) -> Option<PathBuf> {
        if let Some(filter) = self.session_id_filter.read().await.clone() {
            if let Some(found) = self.find_session_by_id(&filter).await {
                *self.preferred_session.write().await = Some(found.clone());
                return Some(found);
            }
        }

        let preferred = self.preferred_session.read().await.clone();
        let scanned = self.scan_latest_session().await;

        match (preferred, scanned) {
            (Some(p), Some(s)) if p.exists() => {
                let p_newer = match (tokio_metadata_mtime(&p).await, tokio_metadata_mtime(&s).await)
                {
                    (Some(pm), Some(sm)) => pm >= sm,
                    _ => true,
                };
                if p_newer {
                    Some(p)
                } else {
                    *self.preferred_session.write().await = Some(s.clone());
                    Some(s)
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
        let offset = match &session_path {
            Some(p) => tokio::fs::metadata(p).await.map(|m| m.len()).unwrap_or(0),
            None => 0,
        };
        Cursor { session_path, offset, carry: Vec::new() }
    }

    /// The escape hatch (spec §4.3): rebind to the latest log for the
    /// work dir and seek to `max(0, size - tail_bytes)` — **never** to
    /// EOF, or a reply that already landed in the file we rotated to is
    /// lost. Grounded on `caskd_daemon.py::_tail_state_for_log`'s
    /// `offset = max(0, size - tail_bytes)`. Bypasses `preferred_session`
    /// (which may still point at the stale, filter-bound log) and
    /// rescans for the latest file directly.
    pub async fn rebind_near_tail(&self, tail_bytes: u64) -> Cursor {
        let session_path = self.scan_latest_session().await;
        *self.preferred_session.write().await = session_path.clone();
        let offset = match &session_path {
            Some(p) => tokio::fs::metadata(p).await.map(|m| m.len()).unwrap_or(0).saturating_sub(tail_bytes),
            None => 0,
        };
        Cursor { session_path, offset, carry: Vec::new() }
    }

    pub async fn wait_for_message(&self, cursor: Cursor, timeout: Duration) -> (Option<Event>, Cursor) {
        let deadline = Instant::now() + timeout;
        let mut cursor = cursor;
        loop {
            let session = self.latest_session().await;
            let Some(session) = session else {
                if Instant::now() >= deadline {
                    return (None, cursor);
                }
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };

            if cursor.session_path.as_deref() != Some(session.as_path()) {
                cursor = Cursor { session_path: Some(session.clone()), offset: 0, carry: Vec::new() };
            }

            let (event, new_cursor) = read_new_lines(&session, cursor).await;
            if let Some(event) = event {
                return (Some(event), new_cursor);
            }
            cursor = new_cursor;

            if Instant::now() >= deadline {
                return (None, cursor);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn latest_message(&self) -> Option<String> {
        let session = self.latest_session().await?;
        let text = tokio::fs::read_to_string(&session).await.ok()?;
        text.lines().filter_map(parse_assistant_line).last()
    }

    pub async fn latest_conversations(&self, n: usize) -> Vec<(String, String)> {
        let Some(session) = self.latest_session().await else { return Vec::new() };
        let Ok(text) = tokio::fs::read_to_string(&session).await else { return Vec::new() };

        let mut pairs = Vec::new();
        let mut pending_user = String::new();
        for line in text.lines() {
            let Ok(parsed) = serde_json::from_str::<RolloutLine>(line) else { continue };
            if let RolloutLine::ResponseItem { payload } = parsed {
                match payload.role.as_deref() {
                    Some("user") => {
                        if let Some(text) = extract_text(&payload) {
                            pending_user = text;
                        }
                    }
                    Some("assistant") => {
                        if let Some(text) = extract_text(&payload) {
                            pairs.push((std::mem::take(&mut pending_user), text));
                        }
                    }
                    _ => {}
                }
            }
        }
        let keep = n.max(1);
        let start = pairs.len().saturating_sub(keep);
        pairs.split_off(start)
    }
}

fn parse_assistant_line(line: &str) -> Option<String> {
    let parsed: RolloutLine = serde_json::from_str(line).ok()?;
    match parsed {
        RolloutLine::ResponseItem { payload } if payload.role.as_deref() == Some("assistant") => {
            extract_text(&payload)
        }
        _ => None,
    }
}

async fn read_new_lines(session: &Path, cursor: Cursor) -> (Option<Event>, Cursor) {
    let Cursor { session_path, offset, carry } = cursor;
    let size = match tokio::fs::metadata(session).await {
        Ok(m) => m.len(),
        Err(_) => return (None, Cursor { session_path, offset, carry }),
    };

    let (offset, carry) = if size < offset { (0, Vec::new()) } else { (offset, carry) };

    let data = match tokio::fs::read(session).await {
        Ok(bytes) => bytes.into_iter().skip(offset as usize).collect::<Vec<u8>>(),
        Err(_) => return (None, Cursor { session_path, offset, carry }),
    };

    let mut buf = carry;
    buf.extend_from_slice(&data);
    let new_offset = offset + data.len() as u64;

    let mut lines: Vec<Vec<u8>> = buf.split(|b| *b == b'\n').map(|s| s.to_vec()).collect();
    let trailing_carry = if buf.ends_with(b"\n") { Vec::new() } else { lines.pop().unwrap_or_default() };

    let mut latest_event = None;
    for raw in lines {
        let Ok(line) = String::from_utf8(raw) else { continue };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(parsed) = serde_json::from_str::<RolloutLine>(line) else { continue };
        if let RolloutLine::ResponseItem { payload } = parsed {
            let role = match payload.role.as_deref() {
                Some("user") => Some(Role::User),
                Some("assistant") => Some(Role::Assistant),
                _ => None,
            };
            if let (Some(role), Some(text)) = (role, extract_text(&payload)) {
                latest_event = Some(Event { role, text });
            }
        }
    }

    (latest_event, Cursor { session_path: Some(session.to_owned()), offset: new_offset, carry: trailing_carry })
}

fn find_session_by_id_blocking(root: &Path, session_id: &str) -> Option<PathBuf> {
    let pattern_name = format!("{session_id}.jsonl");
    let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in walk(root) {
        if entry.file_name().and_then(|n| n.to_str()) != Some(pattern_name.as_str()) {
            continue;
        }
        let Ok(meta) = std::fs::metadata(&entry) else { continue };
        let Ok(mtime) = meta.modified() else { continue };
        if best.as_ref().is_none_or(|(m, _)| mtime >= *m) {
            best = Some((mtime, entry));
        }
    }
    best.map(|(_, path)| path)
}

fn scan_latest_session_blocking(root: &Path, work_dir: &Path) -> Option<PathBuf> {
    let work_dir_str = work_dir.to_string_lossy().into_owned();
    let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = walk(root)
        .into_iter()
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
        .filter_map(|p| std::fs::metadata(&p).ok().and_then(|m| m.modified().ok()).map(|mt| (mt, p)))
        .collect();
    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, path) in candidates {
        if let Some(cwd) = read_session_meta_cwd(&path) {
            if cwd == work_dir_str || work_dir_str.starts_with(&cwd) || cwd.starts_with(&work_dir_str) {
                return Some(path);
            }
        }
    }
    None
}

fn read_session_meta_cwd(path: &Path) -> Option<String> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(file);
    use std::io::BufRead;
    for _ in 0..5 {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            break;
        }
        if let Ok(RolloutLine::SessionMeta { payload }) = serde_json::from_str::<RolloutLine>(line.trim()) {
            return payload.cwd;
        }
    }
    None
}

fn extract_session_id(path: &Path) -> Option<String> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(file);
    use std::io::BufRead;
    for _ in 0..5 {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            break;
        }
        if let Ok(RolloutLine::SessionMeta { payload }) = serde_json::from_str::<RolloutLine>(line.trim()) {
            return Some(payload.id);
        }
    }
    None
}

fn walk(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_owned()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}

async fn tokio_metadata_mtime(path: &Path) -> Option<std::time::SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

/// Extract the `session_meta.id` from a codex log, used after a
/// successful done-detection to rebind the session record (spec §4.3).
pub fn session_id_of(path: &Path) -> Option<String> {
    extract_session_id(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_session(dir: &Path, name: &str, cwd: &str, lines: &[&str]) -> anyhow::Result<PathBuf> {
        let path = dir.join(name);
        let meta = format!(
            "{{\"type\":\"session_meta\",\"payload\":{{\"id\":\"{name}\",\"cwd\":\"{cwd}\"}}}}"
        );
        let mut body = meta;
        for l in lines {
            body.push('\n');
            body.push_str(l);
        }
        body.push('\n');
        std::fs::write(&path, body)?;
        Ok(path)
    }

    #[tokio::test]
    async fn scan_latest_session_matches_work_dir_from_session_meta() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_session(
            dir.path(),
            "a.jsonl",
            "/other",
            &[r#"{"type":"response_item","payload":{"role":"assistant","content":[{"text":"hi"}]}}"#],
        )?;
        let target = write_session(
            dir.path(),
            "b.jsonl",
            "/work",
            &[r#"{"type":"response_item","payload":{"role":"assistant","content":[{"text":"yo"}]}}"#],
        )?;
        // Ensure b.jsonl has a strictly later mtime than a.jsonl.
        tokio::time::sleep(Duration::from_millis(5)).await;
        tokio::fs::write(&target, tokio::fs::read(&target).await?).await?;

        let found = scan_latest_session_blocking(dir.path(), Path::new("/work"));
        assert_eq!(found, Some(target));
        Ok(())
    }

    #[tokio::test]
    async fn latest_message_returns_last_assistant_text() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_session(
            dir.path(),
            "s.jsonl",
            "/work",
            &[
                r#"{"type":"response_item","payload":{"role":"user","content":[{"text":"hello"}]}}"#,
                r#"{"type":"response_item","payload":{"role":"assistant","content":[{"text":"first"}]}}"#,
                r#"{"type":"response_item","payload":{"role":"assistant","content":[{"text":"second"}]}}"#,
            ],
        );
        let mut reader = CodexReader::new(PathBuf::from("/work"));
        reader.root = dir.path().to_owned();
        assert_eq!(reader.latest_message().await.as_deref(), Some("second"));
        Ok(())
    }

    #[tokio::test]
    async fn wait_for_message_observes_appended_line() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_session(dir.path(), "s.jsonl", "/work", &[])?;
        let mut reader = CodexReader::new(PathBuf::from("/work"));
        reader.root = dir.path().to_owned();

        let cursor = reader.capture_state().await;

        let append_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let mut existing = tokio::fs::read(&append_path).await.unwrap_or_default();
            existing.extend_from_slice(
                b"{\"type\":\"response_item\",\"payload\":{\"role\":\"assistant\",\"content\":[{\"text\":\"late reply\"}]}}\n",
            );
            let _ = tokio::fs::write(&append_path, existing).await;
        });

        let (event, _) = reader.wait_for_message(cursor, Duration::from_millis(500)).await;
        assert_eq!(event.map(|e| e.text), Some("late reply".to_owned()));
        Ok(())
    }

    #[test]
    fn session_id_of_reads_meta_line() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_session(dir.path(), "s.jsonl", "/work", &[])?;
        assert_eq!(session_id_of(&path).as_deref(), Some("s.jsonl"));
        Ok(())
    }

    #[tokio::test]
    async fn rebind_near_tail_seeks_behind_eof_not_to_it() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_session(
            dir.path(),
            "s.jsonl",
            "/work",
            &[r#"{"type":"response_item","payload":{"role":"assistant","content":[{"text":"already landed"}]}}"#],
        )?;
        let mut reader = CodexReader::new(PathBuf::from("/work"));
        reader.root = dir.path().to_owned();

        let size = tokio::fs::metadata(&path).await?.len();
        let cursor = reader.rebind_near_tail(8).await;
        assert_eq!(cursor.offset, size - 8);
        assert!(cursor.offset < size, "must seek behind EOF, not to it");
        Ok(())
    }

    #[tokio::test]
    async fn rebind_near_tail_saturates_to_zero_for_small_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_session(dir.path(), "s.jsonl", "/work", &[])?;
        let mut reader = CodexReader::new(PathBuf::from("/work"));
        reader.root = dir.path().to_owned();

        let cursor = reader.rebind_near_tail(1024 * 1024 * 1024).await;
        assert_eq!(cursor.offset, 0);
        Ok(())
    }

    #[tokio::test]
    async fn rebind_near_tail_does_not_lose_a_reply_already_in_the_tail_window() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_session(
            dir.path(),
            "s.jsonl",
            "/work",
            &[r#"{"type":"response_item","payload":{"role":"assistant","content":[{"text":"reply already landed"}]}}"#],
        )?;
        let mut reader = CodexReader::new(PathBuf::from("/work"));
        reader.root = dir.path().to_owned();

        // A generous tail window (default-sized) comfortably covers a
        // single short line, unlike a naive seek-to-EOF rebind which would
        // skip straight past it.
        let cursor = reader.rebind_near_tail(2 * 1024 * 1024).await;
        let (event, _) = reader.wait_for_message(cursor, Duration::from_millis(200)).await;
        assert_eq!(event.map(|e| e.text), Some("reply already landed".to_owned()));
        Ok(())
    }
}
