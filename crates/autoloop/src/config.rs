// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration (spec §4.6 **[AMBIENT]**), following
//! `ccb_daemon::config::DaemonConfig`'s `clap::Args` + `env` fallback
//! pattern. Defaults match
//! `original_source/claude_skills/tr/scripts/autoloop.py`'s argparse
//! defaults (`--threshold 70`, `--context-limit 200000`, `--cooldown 20`,
//! `--poll 0.5`).

use std::path::PathBuf;

use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct AutoloopConfig {
    /// Repository root containing `.ccb/state.json`; defaults to cwd.
    #[arg(long, env = "CCB_AUTOLOOP_REPO_ROOT")]
    pub repo_root: Option<PathBuf>,

    /// Evaluate once and exit, instead of polling forever.
    #[arg(long)]
    pub once: bool,

    /// Claude context-window usage percent (0-100) above which a trigger
    /// fires even without a cursor advance.
    #[arg(long, default_value_t = 70.0, env = "CCB_AUTOLOOP_THRESHOLD")]
    pub threshold: f64,

    /// Fallback context window size in tokens, used when the model in the
    /// transcript has no known entry (spec §4.6, `ccb_transcript::claude_log`).
    #[arg(long, default_value_t = 200_000, env = "CCB_AUTOLOOP_CONTEXT_LIMIT")]
    pub context_limit: u64,

    /// Minimum seconds between two triggers, regardless of cause.
    #[arg(long, default_value_t = 20, env = "CCB_AUTOLOOP_COOLDOWN_S")]
    pub cooldown_s: u64,

    /// Poll interval in seconds for daemon mode.
    #[arg(long, default_value_t = 0.5, env = "CCB_AUTOLOOP_POLL_S")]
    pub poll_s: f64,
}

impl AutoloopConfig {
    pub fn resolved_repo_root(&self) -> std::io::Result<PathBuf> {
        match &self.repo_root {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir(),
        }
    }
}
