// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenCode transcript reader: a directory-of-small-files layout under
//! `~/.local/share/opencode/storage/{session,message,part}` (spec §4.3).
//!
//! Grounded on `original_source/lib/opencode_comm.py`'s `OpenCodeLogReader`:
//! the active session is the `ses_*.json` file under `session/<project_id>`
//! whose `directory` field matches the work dir (falling back to whatever
//! session was updated most recently if nothing matches), a reply is ready
//! only once the newest assistant message's `time.completed` is set, and
//! its text is the concatenation of that message's `text`-typed parts.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{Event, Role};

fn storage_root() -> PathBuf {
    std::env::var_os("OPENCODE_STORAGE_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".local").join("share").join("opencode").join("storage"))
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

fn normalize_for_match(value: &str) -> String {
    let mut normalized = value.replace('\\', "/");
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    normalized
}

fn is_same_or_parent(parent: &str, child: &str) -> bool {
    let parent = normalize_for_match(parent);
    let child = normalize_for_match(child);
    if parent == child {
        return true;
    }
    if parent.is_empty() || child.is_empty() || !child.starts_with(&parent) {
        return false;
    }
    child[parent.len()..].starts_with('/')
}

#[derive(Debug, Deserialize, Default)]
struct SessionTime {
    #[serde(default)]
    updated: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    directory: Option<String>,
    #[serde(default)]
    time: SessionTime,
}

#[derive(Debug, Deserialize, Default)]
struct MessageTime {
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    completed: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(rename = "sessionID", default)]
    session_id: Option<String>,
    #[serde(default)]
    time: MessageTime,
}

#[derive(Debug, Deserialize)]
struct PartPayload {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(rename = "messageID", default)]
    message_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

struct SessionEntry {
    session_id: String,
    updated: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Cursor {
    session_id: Option<String>,
    session_updated: i64,
    assistant_count: usize,
    last_assistant_id: Option<String>,
    last_assistant_completed: Option<i64>,
}

pub struct OpencodeReader {
    root: PathBuf,
    work_dir: PathBuf,
    project_id: String,
    bound_session: RwLock<Option<String>>,
    poll_interval: Duration,
    force_read_interval: Duration,
}

impl OpencodeReader {
    pub fn new(work_dir: PathBuf) -> Self {
        let project_id = std::env::var("OPENCODE_PROJECT_ID")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "global".to_owned());
        Self {
            root: storage_root(),
            work_dir,
            project_id,
            bound_session: RwLock::new(None),
            poll_interval: Duration::from_millis(50),
            force_read_interval: Duration::from_secs(1),
        }
    }

    pub fn set_preferred_session(&mut self, _path: PathBuf) {
        // OpenCode sessions aren't file-path addressable; nothing to bind.
    }

    pub async fn current_session_path(&self) -> Option<PathBuf> {
        let session_id = self.latest_session().await?.session_id;
        Some(self.root.join("session").join(&self.project_id).join(format!("{session_id}.json")))
    }

    fn work_dir_candidates(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Ok(pwd) = std::env::var("PWD") {
            if !pwd.trim().is_empty() {
                out.push(normalize_for_match(&pwd));
            }
        }
        out.push(normalize_for_match(&self.work_dir.to_string_lossy()));
        if let Ok(resolved) = self.work_dir.canonicalize() {
            out.push(normalize_for_match(&resolved.to_string_lossy()));
        }
        out.sort();
        out.dedup();
        out
    }

    async fn latest_session(&self) -> Option<SessionEntry> {
        let sessions_dir = self.root.join("session").join(&self.project_id);
        let candidates = self.work_dir_candidates();
        tokio::task::spawn_blocking(move || {
            let entries = std::fs::read_dir(&sessions_dir).ok()?;
            let mut best_match: Option<(i64, f64, SessionPayload)> = None;
            let mut best_any: Option<(i64, f64, SessionPayload)> = None;

            for entry in entries.flatten() {
                let path = entry.path();
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                if !(name.starts_with("ses_") && name.ends_with(".json")) {
                    continue;
                }
                let Ok(raw) = std::fs::read(&path) else { continue };
                let Ok(payload) = serde_json::from_slice::<SessionPayload>(&raw) else { continue };
                if payload.id.is_none() {
                    continue;
                }
                let updated = payload.time.updated.unwrap_or(-1);
                let mtime = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);

                let better_any = best_any
                    .as_ref()
                    .is_none_or(|(u, m, _)| updated > *u || (updated == *u && mtime >= *m));
                if better_any {
                    best_any = Some((updated, mtime, payload_clone(&payload)));
                }

                let Some(directory) = payload.directory.as_deref() else { continue };
                let matched = candidates
                    .iter()
                    .any(|cwd| is_same_or_parent(directory, cwd) || is_same_or_parent(cwd, directory));
                if !matched {
                    continue;
                }
                let better_match = best_match
                    .as_ref()
                    .is_none_or(|(u, m, _)| updated > *u || (updated == *u && mtime >= *m));
                if better_match {
                    best_match = Some((updated, mtime, payload));
                }
            }

            best_match.or(best_any).and_then(|(updated, _, payload)| {
                payload.id.map(|session_id| SessionEntry { session_id, updated })
            })
        })
        .await
        .ok()
        .flatten()
    }

    fn message_dir(&self, session_id: &str) -> PathBuf {
        let nested = self.root.join("message").join(session_id);
        if nested.exists() {
            nested
        } else {
            self.root.join("message")
        }
    }

    fn part_dir(&self, message_id: &str) -> PathBuf {
        let nested = self.root.join("part").join(message_id);
        if nested.exists() {
            nested
        } else {
            self.root.join("part")
        }
    }

    async fn read_messages(&self, session_id: &str) -> Vec<MessagePayload> {
        let dir = self.message_dir(session_id);
        let session_id = session_id.to_owned();
        tokio::task::spawn_blocking(move || {
            let Ok(entries) = std::fs::read_dir(&dir) else { return Vec::new() };
            let mut messages: Vec<(i64, f64, MessagePayload)> = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                if !(name.starts_with("msg_") && name.ends_with(".json")) {
                    continue;
                }
                let Ok(raw) = std::fs::read(&path) else { continue };
                let Ok(payload) = serde_json::from_slice::<MessagePayload>(&raw) else { continue };
                if payload.session_id.as_deref() != Some(session_id.as_str()) {
                    continue;
                }
                let created = payload.time.created.unwrap_or(-1);
                let mtime = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                messages.push((created, mtime, payload));
            }
            messages.sort_by(|a, b| {
                a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.id.cmp(&b.2.id))
            });
            messages.into_iter().map(|(_, _, m)| m).collect()
        })
        .await
        .unwrap_or_default()
    }

    async fn read_parts(&self, message_id: &str) -> Vec<PartPayload> {
        let dir = self.part_dir(message_id);
        let message_id = message_id.to_owned();
        tokio::task::spawn_blocking(move || {
            let Ok(entries) = std::fs::read_dir(&dir) else { return Vec::new() };
            let mut parts = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                if !(name.starts_with("prt_") && name.ends_with(".json")) {
                    continue;
                }
                let Ok(raw) = std::fs::read(&path) else { continue };
                let Ok(payload) = serde_json::from_slice::<PartPayload>(&raw) else { continue };
                if payload.message_id.as_deref() != Some(message_id.as_str()) {
                    continue;
                }
                parts.push(payload);
            }
            parts
        })
        .await
        .unwrap_or_default()
    }

    fn extract_text(parts: &[PartPayload]) -> Option<String> {
        let text: String = parts
            .iter()
            .filter(|p| p.kind.as_deref() == Some("text"))
            .filter_map(|p| p.text.as_deref())
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }

    pub async fn capture_state(&self) -> Cursor {
        let Some(session) = self.latest_session().await else { return Cursor::default() };
        let messages = self.read_messages(&session.session_id).await;
        let mut assistant_count = 0;
        let mut last_assistant_id = None;
        let mut last_completed = None;
        for msg in &messages {
            if msg.role.as_deref() == Some("assistant") {
                if let Some(id) = &msg.id {
                    assistant_count += 1;
                    last_assistant_id = Some(id.clone());
                    last_completed = msg.time.completed;
                }
            }
        }
        *self.bound_session.write().await = Some(session.session_id.clone());
        Cursor {
            session_id: Some(session.session_id),
            session_updated: session.updated,
            assistant_count,
            last_assistant_id,
            last_assistant_completed: last_completed,
        }
    }

    async fn find_new_assistant_reply(&self, session_id: &str, cursor: &Cursor) -> Option<String> {
        let messages = self.read_messages(session_id).await;
        let assistants: Vec<&MessagePayload> =
            messages.iter().filter(|m| m.role.as_deref() == Some("assistant") && m.id.is_some()).collect();
        let latest = assistants.last()?;
        let completed = latest.time.completed?;
        let latest_id = latest.id.clone();

        let unchanged = assistants.len() <= cursor.assistant_count
            && latest_id == cursor.last_assistant_id
            && Some(completed) == cursor.last_assistant_completed;
        if unchanged {
            return None;
        }

        let parts = self.read_parts(latest_id.as_deref()?).await;
        Self::extract_text(&parts)
    }

    pub async fn wait_for_message(&self, cursor: Cursor, timeout: Duration) -> (Option<Event>, Cursor) {
        let deadline = Instant::now() + timeout;
        let mut cursor = cursor;
        let mut last_forced_read = Instant::now();
        let mut bound_session_id = cursor.session_id.clone();

        loop {
            let Some(session) = self.latest_session().await else {
                if Instant::now() >= deadline {
                    return (None, cursor);
                }
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };

            let current_session_id = match &bound_session_id {
                Some(bound) => bound.clone(),
                None => {
                    bound_session_id = Some(session.session_id.clone());
                    session.session_id.clone()
                }
            };

            let should_scan = session.updated != cursor.session_updated
                || last_forced_read.elapsed() >= self.force_read_interval;

            if should_scan {
                last_forced_read = Instant::now();
                if let Some(reply) = self.find_new_assistant_reply(&current_session_id, &cursor).await {
                    let mut new_cursor = self.capture_state().await;
                    new_cursor.session_id = bound_session_id;
                    return (Some(Event { role: Role::Assistant, text: reply }), new_cursor);
                }
                cursor.session_updated = session.updated;
            }

            if Instant::now() >= deadline {
                return (None, cursor);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn latest_message(&self) -> Option<String> {
        let session = self.latest_session().await?;
        let messages = self.read_messages(&session.session_id).await;
        let latest = messages.iter().filter(|m| m.role.as_deref() == Some("assistant") && m.id.is_some()).last()?;
        latest.time.completed?;
        let parts = self.read_parts(latest.id.as_deref()?).await;
        Self::extract_text(&parts)
    }

    pub async fn latest_conversations(&self, n: usize) -> Vec<(String, String)> {
        let Some(session) = self.latest_session().await else { return Vec::new() };
        let messages = self.read_messages(&session.session_id).await;
        let mut pairs = Vec::new();
        let mut pending_user = String::new();
        for msg in &messages {
            match msg.role.as_deref() {
                Some("user") => {
                    pending_user = if let Some(id) = &msg.id {
                        let parts = self.read_parts(id).await;
                        Self::extract_text(&parts).unwrap_or_default()
                    } else {
                        String::new()
                    };
                }
                Some("assistant") => {
                    if msg.time.completed.is_none() {
                        continue;
                    }
                    if let Some(id) = &msg.id {
                        let parts = self.read_parts(id).await;
                        if let Some(text) = Self::extract_text(&parts) {
                            pairs.push((std::mem::take(&mut pending_user), text));
                        }
                    }
                }
                _ => {}
            }
        }
        let keep = n.max(1);
        let start = pairs.len().saturating_sub(keep);
        pairs.split_off(start)
    }
}

fn payload_clone(payload: &SessionPayload) -> SessionPayload {
    SessionPayload {
        id: payload.id.clone(),
        directory: payload.directory.clone(),
        time: SessionTime { updated: payload.time.updated },
    }
}
