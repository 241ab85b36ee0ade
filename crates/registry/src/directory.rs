// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide registry directory: one small JSON file per live session
//! under `~/.ccb/run/`, advertising `work_dir` (and the binding that
//! produced it) so a different provider's reader can find a project's
//! sessions by hash of its work-dir without that provider having ever
//! written a session record there itself.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ccb_core::Provider;
use serde::{Deserialize, Serialize};

use crate::atomic::write_json_atomic;
use crate::error::RegistryError;

const ENTRY_GLOB_PREFIX: &str = "ccb-session-";
const ENTRY_GLOB_SUFFIX: &str = ".json";

/// One published entry: `~/.ccb/run/ccb-session-{pid}-{provider}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub pid: u32,
    pub provider: Provider,
    pub work_dir: PathBuf,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Default registry directory, `~/.ccb/run`.
pub fn default_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".ccb").join("run")
}

fn entry_path(dir: &Path, pid: u32, provider: Provider) -> PathBuf {
    dir.join(format!("{ENTRY_GLOB_PREFIX}{pid}-{provider}{ENTRY_GLOB_SUFFIX}"))
}

/// Publish (or refresh) this process's binding so other providers can
/// discover `work_dir` when resolving their own project-hash directories.
pub fn publish(dir: &Path, entry: &DirectoryEntry) -> Result<(), RegistryError> {
    write_json_atomic(&entry_path(dir, entry.pid, entry.provider), entry)
}

/// Remove this process's published entry, best-effort (missing file is
/// not an error; a daemon shutting down uncleanly simply leaves a stale
/// entry for the next reader to skip past).
pub fn remove(dir: &Path, pid: u32, provider: Provider) {
    let _ = std::fs::remove_file(entry_path(dir, pid, provider));
}

/// All distinct work-dirs currently advertised across every entry in
/// `dir`, skipping unreadable or malformed files.
pub fn iter_work_dirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut work_dirs = Vec::new();
    for entry in read_dir.flatten() {
        let path = entry.path();
        let is_entry = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(ENTRY_GLOB_PREFIX) && n.ends_with(ENTRY_GLOB_SUFFIX));
        if !is_entry {
            continue;
        }
        let Ok(bytes) = std::fs::read(&path) else { continue };
        let Ok(parsed) = serde_json::from_slice::<DirectoryEntry>(&bytes) else { continue };
        work_dirs.push(parsed.work_dir);
    }
    work_dirs
}

/// Short-lived cache over [`iter_work_dirs`], mirroring the 5-second
/// refresh window providers use before re-scanning the directory on every
/// transcript-watch event.
pub struct WorkDirCache {
    dir: PathBuf,
    ttl: Duration,
    cached: Vec<PathBuf>,
    last_refresh: Option<Instant>,
}

impl WorkDirCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, ttl: Duration::from_secs(5), cached: Vec::new(), last_refresh: None }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn work_dirs(&mut self) -> &[PathBuf] {
        let stale = match self.last_refresh {
            Some(at) => at.elapsed() >= self.ttl,
            None => true,
        };
        if stale {
            self.cached = iter_work_dirs(&self.dir);
            self.last_refresh = Some(Instant::now());
        }
        &self.cached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pid: u32, provider: Provider, work_dir: &str) -> DirectoryEntry {
        DirectoryEntry { pid, provider, work_dir: PathBuf::from(work_dir), session_id: None }
    }

    #[test]
    fn publish_then_iter_finds_work_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        publish(dir.path(), &sample(111, Provider::Gemini, "/tmp/proj-a"))?;
        publish(dir.path(), &sample(222, Provider::Codex, "/tmp/proj-b"))?;
        let mut found = iter_work_dirs(dir.path());
        found.sort();
        assert_eq!(found, vec![PathBuf::from("/tmp/proj-a"), PathBuf::from("/tmp/proj-b")]);
        Ok(())
    }

    #[test]
    fn remove_drops_the_entry() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let entry = sample(333, Provider::Claude, "/tmp/proj-c");
        publish(dir.path(), &entry)?;
        remove(dir.path(), entry.pid, entry.provider);
        assert!(iter_work_dirs(dir.path()).is_empty());
        Ok(())
    }

    #[test]
    fn iter_work_dirs_on_missing_directory_is_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("does-not-exist");
        assert!(iter_work_dirs(&missing).is_empty());
        Ok(())
    }

    #[test]
    fn work_dir_cache_refreshes_after_ttl() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cache = WorkDirCache::new(dir.path().to_owned()).with_ttl(Duration::from_millis(1));
        assert!(cache.work_dirs().is_empty());
        publish(dir.path(), &sample(444, Provider::Gemini, "/tmp/proj-d"))?;
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.work_dirs(), &[PathBuf::from("/tmp/proj-d")]);
        Ok(())
    }
}
