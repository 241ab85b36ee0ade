// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Droid adapter: drives a terminal pane running the Factory Droid
//! CLI and tails its per-session JSONL. Droid has no single-provider
//! daemon of its own (`Provider::daemon_key` returns `None` for it) — it
//! is served only through the unified `askd` (spec §4.5), and the source
//! pack carries no dedicated `droidd_daemon.py` to ground a
//! cancellation-detection scheme on, so none is implemented here.

use ccb_core::Provider;
use ccb_transcript::ReaderKind;

use super::common::DriveAdapter;

pub fn adapter() -> DriveAdapter {
    DriveAdapter {
        provider: Provider::Droid,
        reader_kind: ReaderKind::Droid,
        pane_check_interval_env: "CCB_ASKD_DROID_PANE_CHECK_INTERVAL",
        default_pane_check_interval_s: 2.0,
        screen_cancel: None,
        transcript_cancel: None,
        rebind_tail_bytes_env: None,
    }
}
