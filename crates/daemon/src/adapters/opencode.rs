// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The OpenCode adapter: drives a terminal pane running the OpenCode TUI
//! and tails its directory-of-small-files session store. Grounded on
//! `original_source/lib/oaskd_daemon.py`.
//!
//! Cancellation detection is off by default (spec §4.3: "session-scoped
//! abort is prone to false positives") — set `CCB_OASKD_CANCEL_DETECT` to
//! a truthy value to enable it.

use ccb_core::Provider;
use ccb_transcript::ReaderKind;

use super::common::{DriveAdapter, TranscriptCancelMarker};

pub fn adapter() -> DriveAdapter {
    DriveAdapter {
        provider: Provider::Opencode,
        reader_kind: ReaderKind::Opencode,
        pane_check_interval_env: "CCB_OASKD_PANE_CHECK_INTERVAL",
        default_pane_check_interval_s: 2.0,
        screen_cancel: None,
        transcript_cancel: Some(TranscriptCancelMarker {
            text: "MessageAbortedError",
            env_gate: Some("CCB_OASKD_CANCEL_DETECT"),
        }),
        rebind_tail_bytes_env: None,
    }
}
