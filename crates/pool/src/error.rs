// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker for session key {0:?} is no longer running")]
    WorkerGone(String),
}
