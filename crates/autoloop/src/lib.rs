// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Autoloop supervisor (spec §4.6): watches the caller's own `state.json`
//! cursor and Claude's context-window usage, and re-injects `/tr` (with
//! an optional `/clear`) into the caller's pane when the cursor advances
//! or context usage crosses a threshold. Grounded on
//! `original_source/claude_skills/tr/scripts/autoloop.py`, rewritten as
//! an async tokio supervisor in the style of `ccb_daemon`'s supervision
//! tasks rather than a synchronous polling script.

pub mod config;
pub mod cursor;
pub mod lock;
pub mod pane;
pub mod state;
pub mod supervisor;
pub mod trigger;

pub use config::AutoloopConfig;
pub use supervisor::{evaluate_once, run_daemon, TickOutcome};
