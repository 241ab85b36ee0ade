// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("io error reading {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("{path} did not parse as valid JSON after retrying: {source}")]
    Unparseable { path: PathBuf, #[source] source: serde_json::Error },
}
