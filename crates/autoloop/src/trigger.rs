// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pane-injection sequence fired once a trigger is decided (spec
//! §4.6 step 4). Grounded on
//! `original_source/claude_skills/tr/scripts/autoloop.py`'s `_trigger`:
//! a settle delay, an optional `/clear` with its own settle delay, then
//! `/tr` to resume the caller's task loop.

use std::time::Duration;

use ccb_terminal::{Terminal, TerminalError};

use crate::pane::CallerPane;

const PRE_DELAY: Duration = Duration::from_secs(5);
const POST_CLEAR_DELAY: Duration = Duration::from_secs(2);

/// Inject `/clear` (when `clear_first`) then `/tr` into the caller's pane,
/// with the same settle delays the original tool used to give Claude's
/// REPL time to redraw before the next command lands.
pub async fn fire(pane: &CallerPane, clear_first: bool) -> Result<(), TerminalError> {
    tokio::time::sleep(PRE_DELAY).await;
    let terminal = Terminal::new(pane.terminal);
    if clear_first {
        terminal.inject_text(&pane.pane_handle, "/clear").await?;
        tokio::time::sleep(POST_CLEAR_DELAY).await;
    }
    terminal.inject_text(&pane.pane_handle, "/tr").await?;
    Ok(())
}
