// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-tick decision algorithm (spec §4.6) and the daemon polling
//! loop built on top of it. Grounded on
//! `original_source/claude_skills/tr/scripts/autoloop.py`'s
//! `_run_once_locked` (single evaluation, lock held) and `daemon` (polling
//! loop with a special-cased unconditional trigger on first detection).

use std::time::Duration;

use crate::config::AutoloopConfig;
use crate::cursor::CallerState;
use crate::lock::TickLock;
use crate::pane::resolve_caller_pane;
use crate::state::{now_epoch_secs, AutoloopState, StatePaths};
use crate::trigger;

/// What happened on one evaluation, returned for logging and for the
/// daemon loop to decide whether to keep polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No `state.json` yet; nothing to evaluate.
    NoStateFile,
    /// The caller's task has no remaining steps; stop polling.
    Complete,
    /// A trigger fired; `cleared` is whether `/clear` preceded `/tr`.
    Triggered { cleared: bool },
    /// A trigger condition held but the cooldown window hasn't elapsed.
    SkippedCooldown,
    /// The cursor hasn't advanced since the last tick.
    SkippedNoSignal,
    /// A trigger was warranted but no caller pane could be resolved.
    NoCallerPane,
}

/// Run one evaluation against `paths`, taking the tick lock for its
/// duration so a racing `--once` and daemon poll never double-fire.
///
/// `trigger_on_missing_state` controls what happens when no prior cursor
/// has been recorded at all: `--once` always passes `true` (fire
/// immediately so the caller sees *something* happen); the daemon loop
/// passes `true` only for its very first tick, then `false` for every
/// tick after, so restarting the daemon doesn't re-trigger on every poll
/// before a baseline cursor exists.
pub async fn evaluate_once(
    repo_root: &std::path::Path,
    config: &AutoloopConfig,
    trigger_on_missing_state: bool,
) -> TickOutcome {
    let paths = StatePaths::under(repo_root);
    let Some(_lock) = TickLock::try_acquire(&paths.lock_path).ok().flatten() else {
        return TickOutcome::SkippedCooldown;
    };

    let Some(caller_state) = CallerState::load(&paths.state_path) else {
        return TickOutcome::NoStateFile;
    };

    if !caller_state.has_remaining_work() {
        return TickOutcome::Complete;
    }

    let cursor = caller_state.cursor();
    let autoloop_state = AutoloopState::load(&paths.autoloop_state_path);
    let now = now_epoch_secs();

    // Unconditional cooldown gate (spec §4.6 step 3; `autoloop.py:360`:
    // `if now - last_ts < cooldown_s: return noop`) — applied before any
    // trigger decision, not just when the cursor hasn't moved.
    if now.saturating_sub(autoloop_state.last_trigger_ts) < config.cooldown_s {
        return TickOutcome::SkippedCooldown;
    }

    let had_prior_cursor = autoloop_state.last_cursor.is_some();
    let cursor_advanced = autoloop_state.last_cursor.as_ref() != Some(&cursor);

    // Triggering is driven by cursor advance alone; context usage only
    // decides `cleared` below (`autoloop.py:374`: `do_clear = usage >
    // threshold`), it is never itself a trigger condition.
    let should_trigger = if !had_prior_cursor { trigger_on_missing_state } else { cursor_advanced };

    if !should_trigger {
        AutoloopState::persist(&paths.autoloop_state_path, &cursor, false, autoloop_state.last_trigger_ts);
        return TickOutcome::SkippedNoSignal;
    }

    let Some(pane) = resolve_caller_pane(repo_root) else {
        return TickOutcome::NoCallerPane;
    };

    let context_percent = ccb_transcript::context_usage_percent(repo_root, Some(config.context_limit))
        .map(|usage| usage.percent())
        .unwrap_or(0);
    let cleared = f64::from(context_percent) > config.threshold;

    if trigger::fire(&pane, cleared).await.is_err() {
        return TickOutcome::SkippedNoSignal;
    }

    AutoloopState::persist(&paths.autoloop_state_path, &cursor, false, now);
    TickOutcome::Triggered { cleared }
}

/// Poll forever at `config.poll_s` until the caller's task completes.
/// The first tick is allowed to trigger unconditionally on a missing
/// baseline cursor; every tick after that is not.
pub async fn run_daemon(repo_root: std::path::PathBuf, config: AutoloopConfig) {
    let mut first_tick = true;
    loop {
        let outcome = evaluate_once(&repo_root, &config, first_tick).await;
        first_tick = false;
        tracing::info!(?outcome, "autoloop tick");
        if matches!(outcome, TickOutcome::Complete) {
            break;
        }
        tokio::time::sleep(Duration::from_secs_f64(config.poll_s.max(0.05))).await;
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn config(threshold: f64) -> AutoloopConfig {
        AutoloopConfig {
            repo_root: None,
            once: false,
            threshold,
            context_limit: 200_000,
            cooldown_s: 20,
            poll_s: 0.5,
        }
    }

    fn write_state_json(repo: &std::path::Path, body: &str) {
        std::fs::create_dir_all(repo.join(".ccb")).expect("mkdir");
        std::fs::write(repo.join(".ccb").join("state.json"), body).expect("write state.json");
    }

    #[tokio::test]
    #[serial(claude_pane_id_env)]
    async fn no_state_file_returns_no_state_file() {
        std::env::remove_var("CLAUDE_PANE_ID");
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = evaluate_once(dir.path(), &config(70.0), true).await;
        assert_eq!(outcome, TickOutcome::NoStateFile);
    }

    #[tokio::test]
    #[serial(claude_pane_id_env)]
    async fn no_remaining_work_returns_complete() {
        std::env::remove_var("CLAUDE_PANE_ID");
        let dir = tempfile::tempdir().expect("tempdir");
        write_state_json(dir.path(), r#"{"current": {"type": "none"}}"#);
        let outcome = evaluate_once(dir.path(), &config(70.0), true).await;
        assert_eq!(outcome, TickOutcome::Complete);
    }

    #[tokio::test]
    #[serial(claude_pane_id_env)]
    async fn missing_baseline_with_trigger_on_missing_state_attempts_trigger() {
        std::env::remove_var("CLAUDE_PANE_ID");
        let dir = tempfile::tempdir().expect("tempdir");
        write_state_json(dir.path(), r#"{"current": {"type": "step", "stepIndex": 0, "subIndex": 0}}"#);
        let outcome = evaluate_once(dir.path(), &config(70.0), true).await;
        assert_eq!(outcome, TickOutcome::NoCallerPane);
    }

    #[tokio::test]
    #[serial(claude_pane_id_env)]
    async fn missing_baseline_without_trigger_on_missing_state_just_records_cursor() {
        std::env::remove_var("CLAUDE_PANE_ID");
        let dir = tempfile::tempdir().expect("tempdir");
        write_state_json(dir.path(), r#"{"current": {"type": "step", "stepIndex": 0, "subIndex": 0}}"#);
        let outcome = evaluate_once(dir.path(), &config(70.0), false).await;
        assert_eq!(outcome, TickOutcome::SkippedNoSignal);

        let paths = StatePaths::under(dir.path());
        let persisted = AutoloopState::load(&paths.autoloop_state_path);
        assert_eq!(
            persisted.last_cursor,
            Some(crate::cursor::Cursor { kind: "step".to_owned(), step_index: Some(0), sub_index: Some(0) })
        );
    }

    #[tokio::test]
    #[serial(claude_pane_id_env)]
    async fn cursor_advance_without_resolvable_pane_is_reported() {
        std::env::remove_var("CLAUDE_PANE_ID");
        let dir = tempfile::tempdir().expect("tempdir");
        write_state_json(dir.path(), r#"{"current": {"type": "step", "stepIndex": 1, "subIndex": 0}}"#);
        let paths = StatePaths::under(dir.path());
        let prior = crate::cursor::Cursor { kind: "step".to_owned(), step_index: Some(0), sub_index: Some(0) };
        AutoloopState::persist(&paths.autoloop_state_path, &prior, false, 0);

        let outcome = evaluate_once(dir.path(), &config(70.0), false).await;
        assert_eq!(outcome, TickOutcome::NoCallerPane);
    }

    #[tokio::test]
    #[serial(claude_pane_id_env)]
    async fn cooldown_blocks_repeated_threshold_trigger_without_cursor_advance() {
        std::env::remove_var("CLAUDE_PANE_ID");
        let dir = tempfile::tempdir().expect("tempdir");
        write_state_json(dir.path(), r#"{"current": {"type": "step", "stepIndex": 0, "subIndex": 0}}"#);
        let paths = StatePaths::under(dir.path());
        let cursor = crate::cursor::Cursor { kind: "step".to_owned(), step_index: Some(0), sub_index: Some(0) };
        AutoloopState::persist(&paths.autoloop_state_path, &cursor, false, now_epoch_secs());

        // threshold 0.0 makes context usage always "cross" it, even with no
        // transcript on disk, isolating the cooldown gate from the
        // transcript-reading path.
        let outcome = evaluate_once(dir.path(), &config(0.0), false).await;
        assert_eq!(outcome, TickOutcome::SkippedCooldown);
    }

    #[tokio::test]
    #[serial(claude_pane_id_env)]
    async fn threshold_crossed_without_cursor_advance_does_not_trigger() {
        std::env::remove_var("CLAUDE_PANE_ID");
        let dir = tempfile::tempdir().expect("tempdir");
        write_state_json(dir.path(), r#"{"current": {"type": "step", "stepIndex": 0, "subIndex": 0}}"#);
        let paths = StatePaths::under(dir.path());
        let cursor = crate::cursor::Cursor { kind: "step".to_owned(), step_index: Some(0), sub_index: Some(0) };
        // Last trigger was well outside the cooldown window, so only the
        // cursor-advance check (not the threshold) should decide this tick.
        AutoloopState::persist(&paths.autoloop_state_path, &cursor, false, 0);

        // threshold 0.0 would "cross" on any context usage at all, but the
        // cursor hasn't moved, so this must never reach a trigger.
        let outcome = evaluate_once(dir.path(), &config(0.0), false).await;
        assert_eq!(outcome, TickOutcome::SkippedNoSignal);
    }

    #[tokio::test]
    #[serial(claude_pane_id_env)]
    async fn cursor_advance_inside_cooldown_window_is_suppressed() {
        std::env::remove_var("CLAUDE_PANE_ID");
        let dir = tempfile::tempdir().expect("tempdir");
        write_state_json(dir.path(), r#"{"current": {"type": "step", "stepIndex": 1, "subIndex": 0}}"#);
        let paths = StatePaths::under(dir.path());
        let prior = crate::cursor::Cursor { kind: "step".to_owned(), step_index: Some(0), sub_index: Some(0) };
        // A trigger just fired, so the unconditional cooldown gate must
        // suppress this tick even though the cursor genuinely advanced.
        AutoloopState::persist(&paths.autoloop_state_path, &prior, false, now_epoch_secs());

        let outcome = evaluate_once(dir.path(), &config(70.0), false).await;
        assert_eq!(outcome, TickOutcome::SkippedCooldown);
    }
}
