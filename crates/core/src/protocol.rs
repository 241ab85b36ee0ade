// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The anchor/done sentinel protocol (spec §4.1) used to correlate a
//! delegated prompt with the provider's reply over the shared TUI medium.
//!
//! Grounded on `original_source/lib/ccb_protocol.py`'s `wrap_codex_prompt`,
//! `is_done_text`, and `strip_done_text`, generalized here to
//! `wrap_request_prompt` since every provider driver (not just Codex) wraps
//! outbound prompts the same way.

/// Prefix of the line placed at the top of every wrapped prompt.
pub const REQ_ID_PREFIX: &str = "CCB_REQ_ID:";
/// Prefix of the line the provider is instructed to end its reply with.
pub const DONE_PREFIX: &str = "CCB_DONE:";
/// A trailing marker some harnesses append after their own turn ends;
/// stripped before we look at the final line for the done sentinel.
pub const HARNESS_DONE_MARKER: &str = "HARNESS_DONE";

/// Wrap a user message with the `CCB_REQ_ID` anchor and instructions to
/// end the reply with `CCB_DONE: <req_id>` verbatim, on its own final line.
pub fn wrap_request_prompt(message: &str, req_id: &str) -> String {
    let message = message.trim_end();
    format!(
        "{REQ_ID_PREFIX} {req_id}\n\n{message}\n\nIMPORTANT:\n\
         - Reply normally.\n\
         - End your reply with this exact final line (verbatim, on its own line):\n\
         {DONE_PREFIX} {req_id}\n"
    )
}

/// Lines of `text`, with trailing blank lines and (if present) a trailing
/// bare `HARNESS_DONE` line stripped. Returns the remaining lines in order.
fn strip_trailing_noise(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.lines().collect();
    trim_trailing_blank(&mut lines);
    if let Some(&last) = lines.last() {
        if last.trim() == HARNESS_DONE_MARKER {
            lines.pop();
            trim_trailing_blank(&mut lines);
        }
    }
    lines
}

fn trim_trailing_blank<'a>(lines: &mut Vec<&'a str>) {
    while matches!(lines.last(), Some(l) if l.trim().is_empty()) {
        lines.pop();
    }
}

fn is_done_line(line: &str, req_id: &str) -> bool {
    let line = line.trim();
    match line.strip_prefix(DONE_PREFIX) {
        Some(rest) => rest.trim() == req_id,
        None => false,
    }
}

/// True iff the last non-empty line of `text` (after stripping a trailing
/// harness marker) is exactly `CCB_DONE: <req_id>`.
pub fn is_done_text(text: &str, req_id: &str) -> bool {
    match strip_trailing_noise(text).last() {
        Some(line) => is_done_line(line, req_id),
        None => false,
    }
}

/// Strip, from the tail of `text`: trailing blank lines, the trailing
/// harness marker, and the final `CCB_DONE` line for `req_id` if present.
/// The remainder is the extracted reply.
pub fn strip_done_text(text: &str, req_id: &str) -> String {
    let mut lines = strip_trailing_noise(text);
    if matches!(lines.last(), Some(line) if is_done_line(line, req_id)) {
        lines.pop();
        trim_trailing_blank(&mut lines);
    }
    lines.join("\n").trim_end().to_owned()
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
