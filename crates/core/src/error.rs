// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain error kinds (spec §7), mirroring the teacher's
//! `crates/cli/src/error.rs::ErrorCode` pattern but mapped onto CCB's
//! `exit_code` (0/1/2) instead of HTTP/gRPC status codes, since the only
//! transport here is the line-JSON TCP protocol.

use thiserror::Error;

/// Error kinds a daemon can surface in a `<prefix>.response`.
#[derive(Debug, Clone, Error)]
pub enum CcbError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("No session for work_dir")]
    NoSession,
    #[error("Pane unavailable: {0}")]
    PaneUnavailable(String),
    #[error("Pane died mid-request")]
    PaneDiedMidRequest,
    #[error("Cancelled by user: {0}")]
    UserCancelled(String),
    #[error("Timed out waiting for done sentinel")]
    Timeout,
    #[error("Handler error: {0}")]
    HandlerException(String),
}

impl CcbError {
    /// The wire `exit_code` this error maps to: `0` never appears here
    /// (that's reserved for success), `1` = hard error, `2` = timeout.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Timeout => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_exit_code_2() {
        assert_eq!(CcbError::Timeout.exit_code(), 2);
    }

    #[test]
    fn other_errors_map_to_exit_code_1() {
        assert_eq!(CcbError::Unauthorized.exit_code(), 1);
        assert_eq!(CcbError::NoSession.exit_code(), 1);
        assert_eq!(CcbError::PaneDiedMidRequest.exit_code(), 1);
    }
}
