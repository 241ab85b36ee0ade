// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ccbctl`'s own error kind, mapped onto process exit codes the same way
//! [`ccb_core::error::CcbError`] maps onto `exit_code` in a response —
//! this binary has no wire protocol of its own, just a process exit
//! status for scripts to check.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot resolve run directory: {0}")]
    Daemon(#[from] ccb_daemon::DaemonError),
    #[error("daemon not running or unreachable")]
    Unreachable,
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Daemon(_) => 1,
            Self::Unreachable => 2,
        }
    }
}
