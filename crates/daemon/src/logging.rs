// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured logging (spec §7.1 **[AMBIENT]**): appends to
//! `<run_dir>/<daemon>.log` through a non-blocking file appender. Grounded
//! on `examples/groblegark-oddjobs/crates/daemon/src/main.rs::setup_logging`.

use std::path::Path;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber. The returned guard must be
/// held for the process's lifetime — dropping it stops the background
/// flush thread and can silently truncate the tail of the log.
pub fn init(log_path: &Path) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("daemon.log"));

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
