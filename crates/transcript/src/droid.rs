// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Droid transcript reader: append-only JSONL under
//! `~/.factory/sessions/<slug>/<session-id>.jsonl` (spec §4.3).
//!
//! Grounded on `original_source/lib/droid_comm.py`'s `DroidLogReader`: the
//! active session is resolved by scanning for the most-recently-modified
//! `.jsonl` file whose leading `session_start` line's `cwd` matches the
//! work dir (bounded to the `scan_limit` most recent files, mirroring the
//! Python module's heap-bounded scan), new messages are tailed by
//! byte-offset with a carry buffer for a line split across reads, and
//! `thinking`/`thinking_delta` content blocks are filtered out before text
//! extraction. [`codex.rs`](super::codex) is the same JSONL-tailing family.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{Event, Role};

fn sessions_root() -> PathBuf {
    std::env::var_os("DROID_SESSIONS_ROOT")
        .or_else(|| std::env::var_os("FACTORY_SESSIONS_ROOT"))
        .map(PathBuf::from)
        .unwrap_or_else(|| factory_home().join("sessions"))
}

fn factory_home() -> PathBuf {
    std::env::var_os("FACTORY_HOME")
        .or_else(|| std::env::var_os("FACTORY_ROOT"))
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".factory"))
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

const DEFAULT_SCAN_LIMIT: usize = 200;

fn normalize(value: &str) -> String {
    let mut normalized = value.replace('\\', "/");
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    normalized
}

fn is_same_or_parent(parent: &str, child: &str) -> bool {
    let parent = normalize(parent);
    let child = normalize(child);
    if parent.is_empty() || child.is_empty() {
        return false;
    }
    if parent == child {
        return true;
    }
    if !child.starts_with(&parent) {
        return false;
    }
    child[parent.len()..].starts_with('/')
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DroidLine {
    SessionStart { cwd: Option<String>, id: Option<String> },
    Message { message: MessagePayload },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<ContentValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentValue {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

fn extract_content_text(content: &ContentValue) -> Option<String> {
    match content {
        ContentValue::Text(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        ContentValue::Blocks(blocks) => {
            let joined = blocks
                .iter()
                .filter(|b| !matches!(b.kind.as_deref(), Some("thinking") | Some("thinking_delta")))
                .filter_map(|b| b.text.as_deref())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            let trimmed = joined.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
    }
}

fn extract_message(line: &str, role: &str) -> Option<String> {
    let parsed: DroidLine = serde_json::from_str(line).ok()?;
    match parsed {
        DroidLine::Message { message } if message.role.as_deref() == Some(role) => {
            message.content.as_ref().and_then(extract_content_text)
        }
        _ => None,
    }
}

fn read_session_start(path: &Path, max_lines: usize) -> (Option<String>, Option<String>) {
    let Ok(file) = std::fs::File::open(path) else { return (None, None) };
    let mut reader = std::io::BufReader::new(file);
    use std::io::BufRead;
    for _ in 0..max_lines {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Ok(DroidLine::SessionStart { cwd, id }) = serde_json::from_str::<DroidLine>(trimmed) {
            return (cwd, id);
        }
    }
    (None, None)
}

#[derive(Debug, Clone, Default)]
pub struct Cursor {
    session_path: Option<PathBuf>,
    offset: u64,
    carry: Vec<u8>,
}

pub struct DroidReader {
    work_dir: PathBuf,
    root: PathBuf,
    preferred_session: RwLock<Option<PathBuf>>,
    session_id_hint: RwLock<Option<String>>,
    poll_interval: Duration,
    scan_limit: usize,
}

impl DroidReader {
    pub fn new(work_dir: PathBuf) -> Self {
        Self {
            work_dir,
            root: sessions_root(),
            preferred_session: RwLock::new(None),
            session_id_hint: RwLock::new(None),
            poll_interval: Duration::from_millis(50),
            scan_limit: DEFAULT_SCAN_LIMIT,
        }
    }

    pub fn set_preferred_session(&mut self, path: PathBuf) {
        if path.exists() {
            *self.preferred_session.get_mut() = Some(path);
        }
    }

    pub fn set_session_id_hint(&mut self, id: String) {
        *self.session_id_hint.get_mut() = Some(id);
    }

    pub async fn current_session_path(&self) -> Option<PathBuf> {
        self.latest_session().await
    }

    async fn find_session_by_id(&self, session_id: &str) -> Option<PathBuf> {
        let root = self.root.clone();
        let session_id = session_id.to_owned();
        tokio::task::spawn_blocking(move || {
            let target = format!("{session_id}.jsonl");
            let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
            for path in walk(&root) {
                if path.file_name().and_then(|n| n.to_str()) != Some(target.as_str()) {
                    continue;
                }
                let Ok(meta) = std::fs::metadata(&path) else { continue };
                let Ok(mtime) = meta.modified() else { continue };
                if best.as_ref().is_none_or(|(m, _)| mtime >= *m) {
                    best = Some((mtime, path));
                }
            }
            best.map(|(_, p)| p)
        })
        .await
        .ok()
        .flatten()
    }

    async fn scan_latest_session(&self) -> Option<PathBuf> {
        let root = self.root.clone();
        let work_dir = self.work_dir.to_string_lossy().into_owned();
        let scan_limit = self.scan_limit;
        tokio::task::spawn_blocking(move || {
            let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = walk(&root)
                .into_iter()
                .filter(|p| {
                    p.extension().and_then(|e| e.to_str()) == Some("jsonl")
                        && !p.file_name().and_then(|n| n.to_str()).unwrap_or_default().starts_with('.')
                })
                .filter_map(|p| std::fs::metadata(&p).ok().and_then(|m| m.modified().ok()).map(|mt| (mt, p)))
                .collect();
            candidates.sort_by(|a, b| b.0.cmp(&a.0));
            candidates.truncate(scan_limit);

            for (_, path) in candidates {
                let (cwd, _id) = read_session_start(&path, 30);
                let Some(cwd) = cwd else { continue };
                if is_same_or_parent(&work_dir, &cwd) || is_same_or_parent(&cwd, &work_dir) {
                    return Some(path);
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    async fn latest_session(&self) -> Option<PathBuf> {
        if let Some(preferred) = self.preferred_session.read().await.clone() {
            if preferred.exists() {
                if let Some(scanned) = self.scan_latest_session().await {
                    let scanned_newer = match (mtime(&preferred).await, mtime(&scanned).await) {
                        (Some(pm), Some(sm)) => sm > pm,
                        _ => false,
                    };
                    if scanned_newer {
                        *self.preferred_session.write().await = Some(scanned.clone());
                        return Some(scanned);
                    }
                }
                return Some(preferred);
            }
        }

        if let Some(hint) = self.session_id_hint.read().await.clone() {
            if let Some(found) = self.find_session_by_id(&hint).await {
                *self.preferred_session.write().await = Some(found.clone());
                return Some(found);
            }
        }

        if let Some(scanned) = self.scan_latest_session().await {
            *self.preferred_session.write().await = Some(scanned.clone());
            return Some(scanned);
        }

        None
    }

    pub async fn capture_state(&self) -> Cursor {
        let session_path = self.latest_session().await;
        let offset = match &session_path {
            Some(p) => tokio::fs::metadata(p).await.map(|m| m.len()).unwrap_or(0),
            None => 0,
        };
        Cursor { session_path, offset, carry: Vec::new() }
    }

    pub async fn wait_for_message(&self, cursor: Cursor, timeout: Duration) -> (Option<Event>, Cursor) {
        let deadline = Instant::now() + timeout;
        let mut cursor = cursor;
        loop {
            let Some(session) = self.latest_session().await else {
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
        text.lines().filter_map(|l| extract_message(l.trim(), "assistant")).last()
    }

    pub async fn latest_conversations(&self, n: usize) -> Vec<(String, String)> {
        let Some(session) = self.latest_session().await else { return Vec::new() };
        let Ok(text) = tokio::fs::read_to_string(&session).await else { return Vec::new() };

        let mut pairs = Vec::new();
        let mut pending_user = String::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(user) = extract_message(line, "user") {
                pending_user = user;
                continue;
            }
            if let Some(assistant) = extract_message(line, "assistant") {
                pairs.push((std::mem::take(&mut pending_user), assistant));
            }
        }
        let keep = n.max(1);
        let start = pairs.len().saturating_sub(keep);
        pairs.split_off(start)
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
        if let Some(user) = extract_message(line, "user") {
            latest_event = Some(Event { role: Role::User, text: user });
        } else if let Some(assistant) = extract_message(line, "assistant") {
            latest_event = Some(Event { role: Role::Assistant, text: assistant });
        }
    }

    (latest_event, Cursor { session_path: Some(session.to_owned()), offset: new_offset, carry: trailing_carry })
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

async fn mtime(path: &Path) -> Option<std::time::SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_session(dir: &Path, name: &str, cwd: &str, lines: &[&str]) -> anyhow::Result<PathBuf> {
        let path = dir.join(name);
        let mut body = format!(r#"{{"type":"session_start","cwd":"{cwd}","id":"{name}"}}"#);
        for l in lines {
            body.push('\n');
            body.push_str(l);
        }
        body.push('\n');
        std::fs::write(&path, body)?;
        Ok(path)
    }

    #[tokio::test]
    async fn scan_matches_session_start_cwd() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_session(dir.path(), "a.jsonl", "/other", &[])?;
        let target = write_session(dir.path(), "b.jsonl", "/work", &[])?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        tokio::fs::write(&target, tokio::fs::read(&target).await?).await?;

        let mut reader = DroidReader::new(PathBuf::from("/work"));
        reader.root = dir.path().to_owned();
        assert_eq!(reader.current_session_path().await, Some(target));
        Ok(())
    }

    #[tokio::test]
    async fn latest_message_filters_thinking_blocks() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_session(
            dir.path(),
            "s.jsonl",
            "/work",
            &[
                r#"{"type":"message","message":{"role":"assistant","content":[{"type":"thinking","text":"scratch"},{"type":"text","text":"answer"}]}}"#,
            ],
        )?;
        let mut reader = DroidReader::new(PathBuf::from("/work"));
        reader.root = dir.path().to_owned();
        assert_eq!(reader.latest_message().await.as_deref(), Some("answer"));
        Ok(())
    }

    #[tokio::test]
    async fn wait_for_message_observes_appended_line() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_session(dir.path(), "s.jsonl", "/work", &[])?;
        let mut reader = DroidReader::new(PathBuf::from("/work"));
        reader.root = dir.path().to_owned();

        let cursor = reader.capture_state().await;

        let append_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let mut existing = tokio::fs::read(&append_path).await.unwrap_or_default();
            existing.extend_from_slice(
                b"{\"type\":\"message\",\"message\":{\"role\":\"assistant\",\"content\":\"late reply\"}}\n",
            );
            let _ = tokio::fs::write(&append_path, existing).await;
        });

        let (event, _) = reader.wait_for_message(cursor, Duration::from_millis(500)).await;
        assert_eq!(event.map(|e| e.text), Some("late reply".to_owned()));
        Ok(())
    }
}
