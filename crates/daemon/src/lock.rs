// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-instance file lock (spec §4.4: "at server start the daemon
//! acquires a non-blocking file lock named after its key — global, not
//! per-cwd. If the lock is held, the daemon exits with code 2 and does not
//! touch state"). Grounded on
//! `examples/groblegark-oddjobs/crates/daemon/src/lifecycle.rs`'s
//! `OpenOptions::new().write(true).create(true).truncate(false)` +
//! `try_lock_exclusive` pattern — truncating before the lock is held would
//! let two racing processes both wipe and rewrite the file.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use fs2::FileExt;

/// Held for the daemon process's lifetime; dropping it releases the lock.
pub struct InstanceLock(#[allow(dead_code)] File);

/// Exit code spec §4.4 mandates when the lock is already held.
pub const LOCK_HELD_EXIT_CODE: i32 = 2;

impl InstanceLock {
    /// Attempt to acquire the lock at `path`, writing this process's pid
    /// once acquired. `Ok(None)` means another instance already holds it.
    pub fn try_acquire(path: &Path) -> std::io::Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
        if file.try_lock_exclusive().is_err() {
            return Ok(None);
        }
        let mut file = file;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Some(Self(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_same_path_fails() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("askd.lock");
        let first = InstanceLock::try_acquire(&path)?;
        assert!(first.is_some());
        let second = InstanceLock::try_acquire(&path)?;
        assert!(second.is_none());
        drop(first);
        let third = InstanceLock::try_acquire(&path)?;
        assert!(third.is_some());
        Ok(())
    }
}
