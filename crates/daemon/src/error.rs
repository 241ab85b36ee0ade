// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Startup/lifecycle failures specific to running a daemon process itself
/// (as opposed to [`ccb_core::CcbError`], which is a per-request domain
/// error surfaced in a response body). Mirrors the teacher's
/// `oj-daemon::lifecycle::LifecycleError` split between "could not come up
/// at all" and "one request failed".
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("another {0} is already running (single-instance lock held)")]
    AlreadyRunning(&'static str),
    #[error("could not determine a run directory")]
    NoRunDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry error: {0}")]
    Registry(#[from] ccb_registry::RegistryError),
    #[error("invalid bind address {0}:{1}")]
    InvalidBindAddress(String, u16),
}
