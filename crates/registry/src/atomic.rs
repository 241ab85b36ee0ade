// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic, mode-0600 JSON file writes shared by session records, daemon
//! state files, and autoloop state (spec §3, "file writes are atomic
//! (tmp + rename)").

use std::path::Path;

use crate::error::RegistryError;

/// Serialize `value` to pretty JSON and write it to `path` via a
/// same-directory temp file + rename, so readers never observe a
/// partially-written file. Sets mode 0600 on POSIX.
pub fn write_json_atomic<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), RegistryError> {
    let io_err = |source: std::io::Error| RegistryError::Io { path: path.to_owned(), source };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut body = serde_json::to_vec_pretty(value)
        .map_err(|source| RegistryError::Parse { path: path.to_owned(), source })?;
    body.push(b'\n');

    let tmp_path = path.with_extension(format!(
        "{}.tmp-{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or("json"),
        std::process::id()
    ));
    std::fs::write(&tmp_path, &body).map_err(io_err)?;
    set_owner_only_permissions(&tmp_path).map_err(io_err)?;
    std::fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

/// Read and parse a JSON file, tolerating the brief partial-read window
/// right after another process's tmp+rename by retrying a handful of
/// times (spec §3, "readers tolerate partial reads by retrying briefly").
pub fn read_json_retrying<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, RegistryError> {
    const ATTEMPTS: u32 = 5;
    const BACKOFF: std::time::Duration = std::time::Duration::from_millis(20);

    for attempt in 0..ATTEMPTS {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RegistryError::Io { path: path.to_owned(), source }),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => return Ok(Some(value)),
            Err(source) => {
                if attempt + 1 == ATTEMPTS {
                    return Err(RegistryError::Parse { path: path.to_owned(), source });
                }
                std::thread::sleep(BACKOFF);
            }
        }
    }
    unreachable!("loop always returns on its final iteration")
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
    }

    #[test]
    fn round_trips_and_sets_owner_only_mode() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sub/record.json");
        write_json_atomic(&path, &Sample { a: 7 })?;
        let read_back: Sample =
            read_json_retrying(&path)?.ok_or_else(|| anyhow::anyhow!("expected a value"))?;
        assert_eq!(read_back, Sample { a: 7 });

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path)?.permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
        Ok(())
    }

    #[test]
    fn missing_file_reads_as_none() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing.json");
        let read_back: Option<Sample> = read_json_retrying(&path)?;
        assert!(read_back.is_none());
        Ok(())
    }
}
