// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error at {path}: {source}")]
    Io { path: std::path::PathBuf, #[source] source: std::io::Error },
    #[error("malformed session record at {path}: {source}")]
    Parse { path: std::path::PathBuf, #[source] source: serde_json::Error },
}
