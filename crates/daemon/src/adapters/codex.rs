// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Codex adapter: drives a WezTerm/iTerm2 pane running the Codex TUI
//! and tails its append-only JSONL rollout log. Grounded on
//! `original_source/lib/caskd_daemon.py`.

use ccb_core::Provider;
use ccb_transcript::ReaderKind;

use super::common::{DriveAdapter, ScreenCancelMarker};

pub fn adapter() -> DriveAdapter {
    DriveAdapter {
        provider: Provider::Codex,
        reader_kind: ReaderKind::Codex,
        pane_check_interval_env: "CCB_CASKD_PANE_CHECK_INTERVAL",
        default_pane_check_interval_s: 2.0,
        screen_cancel: Some(ScreenCancelMarker { text: "■ Conversation interrupted" }),
        transcript_cancel: None,
        rebind_tail_bytes_env: Some("CCB_CASKD_REBIND_TAIL_BYTES"),
    }
}
