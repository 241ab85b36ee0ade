// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Gemini adapter: drives a terminal pane running the Gemini CLI and
//! tails its in-place-mutated session JSON. Grounded on
//! `original_source/lib/gaskd_daemon.py`.

use ccb_core::Provider;
use ccb_transcript::ReaderKind;

use super::common::{DriveAdapter, TranscriptCancelMarker};

pub fn adapter() -> DriveAdapter {
    DriveAdapter {
        provider: Provider::Gemini,
        reader_kind: ReaderKind::Gemini,
        pane_check_interval_env: "CCB_GASKD_PANE_CHECK_INTERVAL",
        default_pane_check_interval_s: 2.0,
        screen_cancel: None,
        transcript_cancel: Some(TranscriptCancelMarker { text: "Request cancelled.", env_gate: None }),
        rebind_tail_bytes_env: None,
    }
}
