// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-tick exclusive lock over `.ccb/autoloop.lock`, so a `--once`
//! invocation racing a running `daemon` tick (or two overlapping polls)
//! never evaluate the same cursor concurrently. Grounded on
//! `original_source/claude_skills/tr/scripts/autoloop.py`'s `_acquire_lock`
//! (`fcntl.flock(..., LOCK_EX | LOCK_NB)`), adapted to this workspace's
//! `fs2::FileExt` convention already used by `ccb_daemon::lock`.

use std::fs::File;
use std::path::Path;

use fs2::FileExt;

/// Held for one evaluation tick; dropping it releases the lock.
pub struct TickLock(#[allow(dead_code)] File);

impl TickLock {
    /// `Ok(None)` means another process is mid-tick; skip this one rather
    /// than blocking, matching the original's non-blocking acquire.
    pub fn try_acquire(path: &Path) -> std::io::Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
        if file.try_lock_exclusive().is_err() {
            return Ok(None);
        }
        Ok(Some(Self(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_acquire_is_refused() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("autoloop.lock");
        let first = TickLock::try_acquire(&path)?;
        assert!(first.is_some());
        assert!(TickLock::try_acquire(&path)?.is_none());
        drop(first);
        assert!(TickLock::try_acquire(&path)?.is_some());
        Ok(())
    }
}
