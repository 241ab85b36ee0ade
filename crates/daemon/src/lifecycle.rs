// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the pieces every `src/bin/*.rs` entry point needs in the same
//! order, for one daemon flavor (spec §4.4): acquire the single-instance
//! lock, bind the listener, publish the state file, start the idle/parent
//! monitors, then serve until cancelled. Grounded on
//! `examples/groblegark-oddjobs/crates/daemon/src/main.rs`'s
//! lock-then-bind-then-serve startup sequence, adapted from its Unix
//! socket + WAL/event-bus engine to CCB's TCP + per-session worker pool.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::activity::Activity;
use crate::config::DaemonConfig;
use crate::lock::{InstanceLock, LOCK_HELD_EXIT_CODE};
use crate::registry::ProviderRegistry;
use crate::server::Server;
use crate::spec::DaemonSpec;
use crate::{paths, state_file, supervision, token, DaemonError};
use ccb_core::Provider;

/// Binds the TCP listener through `socket2` rather than
/// `TcpListener::bind` directly, so `config.request_queue_size` (spec
/// §4.4: "request queue size typically 128") actually governs the
/// kernel-level accept backlog instead of being an inert config field.
fn bind_listener(config: &DaemonConfig) -> Result<TcpListener, DaemonError> {
    use socket2::{Domain, Socket, Type};
    use std::net::SocketAddr;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| DaemonError::InvalidBindAddress(config.host.clone(), config.port))?;
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(config.request_queue_size as i32)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into()).map_err(DaemonError::from)
}

/// `Ok(0)` on a clean shutdown, `Ok(LOCK_HELD_EXIT_CODE)` if another
/// instance already owns the lock (spec §4.4: "exits with code 2 and does
/// not touch state"), `Err` for any other startup failure.
pub async fn run(
    spec: DaemonSpec,
    config: DaemonConfig,
    fixed_provider: Option<Provider>,
    registry: ProviderRegistry,
) -> Result<i32, DaemonError> {
    let run_dir = paths::run_dir()?;
    std::fs::create_dir_all(&run_dir)?;

    let log_path = paths::log_file_path(&spec)?;
    let _log_guard = crate::logging::init(&log_path)?;

    let lock_path = paths::lock_file_path(&spec)?;
    let Some(lock) = InstanceLock::try_acquire(&lock_path)? else {
        tracing::warn!(daemon = spec.daemon_key, "another instance already running; exiting");
        return Ok(LOCK_HELD_EXIT_CODE);
    };

    let listener = bind_listener(&config)?;
    let bound_addr = listener.local_addr()?;

    let auth_token = token::random_token();
    let state_path = paths::state_file_path(&spec)?;
    let work_dir = std::env::current_dir().unwrap_or_default();
    state_file::publish(
        &state_path,
        &config.host,
        bound_addr.port(),
        &auth_token,
        config.parent_pid,
        config.is_managed(),
        &work_dir.display().to_string(),
    )?;

    let activity = Arc::new(Activity::default());
    let cancel = CancellationToken::new();

    let server = Arc::new(Server::new(
        spec.protocol_prefix,
        auth_token,
        registry,
        fixed_provider,
        Arc::clone(&activity),
        cancel.clone(),
    ));

    let idle_timeout = config.idle_timeout(&spec);
    tokio::spawn(supervision::idle_monitor(Arc::clone(&activity), idle_timeout, cancel.clone()));
    if let Some(parent_pid) = config.parent_pid {
        tokio::spawn(supervision::parent_monitor(parent_pid, cancel.clone()));
    }

    tracing::info!(
        daemon = spec.daemon_key,
        port = bound_addr.port(),
        managed = config.is_managed(),
        "daemon listening"
    );

    server.serve(listener).await;

    tracing::info!(daemon = spec.daemon_key, "daemon shutting down");
    state_file::cleanup(&state_path);
    drop(lock);
    Ok(0)
}
