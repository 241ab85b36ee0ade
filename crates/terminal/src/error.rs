// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Failures surfaced by the terminal capability layer (spec §2.1).
#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("failed to launch {bin}: {source}")]
    Spawn { bin: &'static str, #[source] source: std::io::Error },
    #[error("{bin} exited with status {status}: {stderr}")]
    CommandFailed { bin: &'static str, status: i32, stderr: String },
    #[error("pane {0} not found")]
    PaneNotFound(String),
    #[error("could not parse {bin} output: {detail}")]
    BadOutput { bin: &'static str, detail: String },
}
