// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors from the line-JSON TCP framing kernel (spec §2.9, §6) and its
/// client helpers (spec §2.8), grounded on
/// `original_source/lib/askd_rpc.py`'s `CCBTimeoutError`/`ValueError`
/// pair (deadline exceeded vs. `max_bytes` exceeded).
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("recv deadline exceeded")]
    Timeout,
    #[error("recv exceeded max_bytes ({0})")]
    MaxBytesExceeded(usize),
    #[error("connection closed before a complete line was received")]
    ConnectionClosed,
    #[error("no daemon state file found or it was unreadable")]
    NoState,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}
