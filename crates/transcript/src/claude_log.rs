// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude is read-only caller-side tooling rather than a drivable
//! provider (spec §4.3): the only thing CCB needs from its own transcript
//! is an estimate of how full the context window is, to decide whether
//! the autoloop supervisor should `/clear` before re-triggering.
//!
//! Grounded on `original_source/claude_skills/tr/scripts/autoloop.py`'s
//! `get_context_percent`: find the project's `~/.claude/projects/<slug>`
//! directory (trying both the raw and underscore-to-dash path-join forms,
//! falling back to a name-hint scan), take its most recently modified
//! non-agent `*.jsonl`, and scan backward in 64KiB blocks for the last
//! record carrying `message.usage`.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

const BLOCK_SIZE: usize = 64 * 1024;
const DEFAULT_CONTEXT_LIMIT: u64 = 200_000;

/// The token usage backing a single [`context_usage_percent`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeContextUsage {
    pub model: Option<String>,
    pub prompt_tokens: u64,
    pub context_limit: u64,
}

impl ClaudeContextUsage {
    pub fn percent(&self) -> u8 {
        if self.context_limit == 0 {
            return 100;
        }
        let percent = (self.prompt_tokens as f64 / self.context_limit as f64 * 100.0).round();
        percent.clamp(0.0, 100.0) as u8
    }
}

fn claude_projects_root() -> PathBuf {
    std::env::var_os("CLAUDE_PROJECTS_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".claude").join("projects"))
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

fn candidate_project_dirnames(repo: &Path) -> Vec<String> {
    let parts: Vec<String> = repo
        .components()
        .filter_map(|c| {
            let s = c.as_os_str().to_string_lossy().into_owned();
            (!s.is_empty() && s != "/").then_some(s)
        })
        .collect();
    let joined = parts.join("-");
    let joined_dash = joined.replace('_', "-");
    vec![format!("-{joined}"), format!("-{joined_dash}")]
}

fn find_project_dir(repo: &Path) -> Option<PathBuf> {
    let root = claude_projects_root();
    if !root.is_dir() {
        return None;
    }

    for name in candidate_project_dirnames(repo) {
        let candidate = root.join(&name);
        if candidate.is_dir() {
            return Some(candidate);
        }
    }

    let repo_name = repo.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let hints = [repo_name.clone(), repo_name.replace('_', "-")];
    let entries = std::fs::read_dir(&root).ok()?;
    let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if !hints.iter().any(|h| !h.is_empty() && name.contains(h.as_str())) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(mtime) = meta.modified() else { continue };
        if best.as_ref().is_none_or(|(m, _)| mtime > *m) {
            best = Some((mtime, path));
        }
    }
    best.map(|(_, p)| p)
}

fn find_latest_session_jsonl(project_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(project_dir).ok()?;
    let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if !name.ends_with(".jsonl") || name.starts_with("agent-") {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(mtime) = meta.modified() else { continue };
        if best.as_ref().is_none_or(|(m, _)| mtime > *m) {
            best = Some((mtime, path));
        }
    }
    best.map(|(_, p)| p)
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(default)]
    message: Option<MessageObj>,
}

#[derive(Debug, Deserialize)]
struct MessageObj {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<UsageObj>,
}

#[derive(Debug, Deserialize, Default)]
struct UsageObj {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_prompt_tokens: Option<u64>,
    #[serde(default)]
    cache_read_prompt_tokens: Option<u64>,
}

fn prompt_tokens_for_usage(usage: &UsageObj) -> u64 {
    if let Some(prompt_tokens) = usage.prompt_tokens {
        return prompt_tokens;
    }
    usage.input_tokens.unwrap_or(0)
        + usage.cache_creation_input_tokens.unwrap_or(0)
        + usage.cache_read_input_tokens.unwrap_or(0)
        + usage.cache_creation_prompt_tokens.unwrap_or(0)
        + usage.cache_read_prompt_tokens.unwrap_or(0)
}

/// Scans `path` backward in [`BLOCK_SIZE`]-byte blocks for the most recent
/// JSONL record with a `message.usage` object, without reading the whole
/// (potentially multi-GB) transcript from the front.
fn read_last_jsonl_with_usage(path: &Path) -> Option<(Option<String>, UsageObj)> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = std::fs::File::open(path).ok()?;
    let size = file.metadata().ok()?.len();
    let mut carry: Vec<u8> = Vec::new();
    let mut pos = size;

    while pos > 0 {
        let read_size = BLOCK_SIZE.min(pos as usize);
        pos -= read_size as u64;
        file.seek(SeekFrom::Start(pos)).ok()?;
        let mut chunk = vec![0u8; read_size];
        file.read_exact(&mut chunk).ok()?;
        chunk.extend_from_slice(&carry);
        let buf = chunk;

        let mut lines: Vec<&[u8]> = buf.split(|b| *b == b'\n').collect();
        // If we haven't reached the start of the file and the block didn't
        // begin on a line boundary, the first fragment belongs to the
        // previous (earlier) block; carry it forward instead of parsing it.
        carry = if pos > 0 && !buf.starts_with(b"\n") && !lines.is_empty() {
            let first = lines.remove(0);
            first.to_vec()
        } else {
            Vec::new()
        };

        for raw in lines.iter().rev() {
            let trimmed = trim_bytes(raw);
            if trimmed.is_empty() {
                continue;
            }
            let Ok(record) = serde_json::from_slice::<Record>(trimmed) else { continue };
            if let Some(message) = record.message {
                if let Some(usage) = message.usage {
                    return Some((message.model, usage));
                }
            }
        }
    }
    None
}

fn trim_bytes(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !b.is_ascii_whitespace()).map(|i| i + 1).unwrap_or(start);
    &data[start..end]
}

#[derive(Debug, Deserialize)]
struct ModelsConfig {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    pattern: String,
    context_limit: u64,
}

fn context_limit_for_model(model: Option<&str>, default_limit: u64) -> u64 {
    let Some(model) = model else { return default_limit };

    let models_file = home_dir().join(".claude").join("ccline").join("models.toml");
    if let Ok(raw) = std::fs::read_to_string(&models_file) {
        if let Ok(cfg) = toml::from_str::<ModelsConfig>(&raw) {
            for entry in &cfg.models {
                if Regex::new(&entry.pattern).ok().is_some_and(|re| re.is_match(model)) {
                    return entry.context_limit;
                }
            }
        }
    }

    let lowered = model.to_ascii_lowercase();
    if lowered.contains("opus") || lowered.contains("sonnet") || lowered.contains("haiku") {
        return 200_000;
    }
    default_limit
}

/// Reads the most recent token usage recorded in `repo`'s Claude
/// transcript, or `None` if no project directory / session / usage record
/// can be found (the autoloop caller treats that as "100% full").
pub fn context_usage_percent(repo: &Path, default_context_limit: Option<u64>) -> Option<ClaudeContextUsage> {
    let project_dir = find_project_dir(repo)?;
    let session_file = find_latest_session_jsonl(&project_dir)?;
    let (model, usage) = read_last_jsonl_with_usage(&session_file)?;

    let default_limit = default_context_limit.unwrap_or(DEFAULT_CONTEXT_LIMIT);
    let context_limit = context_limit_for_model(model.as_deref(), default_limit);
    let prompt_tokens = prompt_tokens_for_usage(&usage);

    Some(ClaudeContextUsage { model, prompt_tokens, context_limit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_tokens_prefers_explicit_field() {
        let usage = UsageObj { prompt_tokens: Some(42), input_tokens: Some(999), ..Default::default() };
        assert_eq!(prompt_tokens_for_usage(&usage), 42);
    }

    #[test]
    fn prompt_tokens_sums_cache_fields_when_absent() {
        let usage = UsageObj {
            input_tokens: Some(10),
            cache_creation_input_tokens: Some(5),
            cache_read_input_tokens: Some(3),
            ..Default::default()
        };
        assert_eq!(prompt_tokens_for_usage(&usage), 18);
    }

    #[test]
    fn percent_clamps_to_100() {
        let usage = ClaudeContextUsage { model: None, prompt_tokens: 500_000, context_limit: 200_000 };
        assert_eq!(usage.percent(), 100);
    }

    #[test]
    fn candidate_dirnames_include_underscore_dash_variant() {
        let names = candidate_project_dirnames(Path::new("/home/user/my_repo"));
        assert!(names.contains(&"-home-user-my_repo".to_owned()));
        assert!(names.contains(&"-home-user-my-repo".to_owned()));
    }

    #[test]
    fn reads_usage_from_last_line_spanning_multiple_blocks() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.jsonl");
        let mut body = String::new();
        for _ in 0..500 {
            body.push_str(r#"{"message":{"model":"old","usage":{}}}"#);
            body.push('\n');
        }
        body.push_str(r#"{"message":{"model":"claude-sonnet-4","usage":{"input_tokens":100}}}"#);
        body.push('\n');
        std::fs::write(&path, body)?;

        let (model, usage) = read_last_jsonl_with_usage(&path).expect("usage record");
        assert_eq!(model.as_deref(), Some("claude-sonnet-4"));
        assert_eq!(prompt_tokens_for_usage(&usage), 100);
        Ok(())
    }
}
