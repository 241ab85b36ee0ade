// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `read_json_with_backoff`: the generic form of the retry-on-partial-write
//! primitive `original_source/lib/gemini_comm.py`'s `_read_session_json`
//! applies around every read of a JSON file a provider TUI mutates in
//! place. Every reader that reads such a file (today: Gemini, OpenCode)
//! goes through this instead of repeating the retry loop locally.

use std::path::Path;
use std::time::Duration;

use crate::error::TranscriptError;

const DEFAULT_ATTEMPTS: u32 = 10;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(50);

/// Outcome of a backoff read: a file that doesn't exist is not an error
/// (the caller decides what "no session yet" means), but one that exists
/// and never parses cleanly within `attempts` is.
pub enum ReadOutcome<T> {
    Missing,
    Parsed(T),
}

/// Read and parse `path` as JSON, retrying on `serde_json::Error` up to
/// `attempts` times with `backoff` between tries. A missing file returns
/// `Missing` immediately rather than retrying.
pub async fn read_json_with_backoff<T: serde::de::DeserializeOwned>(
    path: &Path,
    attempts: u32,
    backoff: Duration,
) -> Result<ReadOutcome<T>, TranscriptError> {
    for attempt in 0..attempts {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ReadOutcome::Missing),
            Err(source) => return Err(TranscriptError::Io { path: path.to_owned(), source }),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => return Ok(ReadOutcome::Parsed(value)),
            Err(source) => {
                if attempt + 1 == attempts {
                    return Err(TranscriptError::Unparseable { path: path.to_owned(), source });
                }
                tokio::time::sleep(backoff).await;
            }
        }
    }
    unreachable!("loop always returns on its final iteration")
}

/// [`read_json_with_backoff`] with the defaults every reader in this
/// crate uses (10 attempts, 50ms backoff), matching the Gemini reader's
/// original tuning.
pub async fn read_json_default_backoff<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<ReadOutcome<T>, TranscriptError> {
    read_json_with_backoff(path, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
    }

    #[tokio::test]
    async fn missing_file_is_reported_as_missing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing.json");
        let outcome = read_json_default_backoff::<Sample>(&path).await?;
        assert!(matches!(outcome, ReadOutcome::Missing));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_file_retries_then_succeeds_once_fixed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"{\"a\": 1").await?;

        let write_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            let _ = tokio::fs::write(&write_path, b"{\"a\": 1}").await;
        });

        let outcome =
            read_json_with_backoff::<Sample>(&path, 10, Duration::from_millis(20)).await?;
        match outcome {
            ReadOutcome::Parsed(sample) => assert_eq!(sample, Sample { a: 1 }),
            ReadOutcome::Missing => anyhow::bail!("expected a parsed value"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn permanently_malformed_file_errors_after_exhausting_attempts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, b"not json").await?;
        let result = read_json_with_backoff::<Sample>(&path, 3, Duration::from_millis(1)).await;
        assert!(matches!(result, Err(TranscriptError::Unparseable { .. })));
        Ok(())
    }
}
