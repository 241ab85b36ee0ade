// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session serial worker pool (spec §4.2): a map from session key to a
//! single-FIFO-queue worker, guaranteeing at most one in-flight delegation
//! per provider TUI. Grounded on the teacher's `WsBridge` in
//! `examples/groblegark-coop/crates/mux/src/upstream/bridge.rs` — a
//! per-client `mpsc` lane behind a shared `RwLock<HashMap<_, _>>`, a
//! dedicated task draining each lane in order — generalized from "one
//! lane per downstream client" to "one lane per session key", and from a
//! WebSocket bridge to an arbitrary async [`TaskHandler`].
//!
//! The actual work a task performs (inject a wrapped prompt, tail a
//! transcript reader for the done sentinel) is provider-specific and lives
//! in `ccb-daemon`'s adapters; this crate only owns the FIFO-per-key
//! scheduling and the submit/await-with-timeout contract.

mod error;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock};

pub use error::PoolError;

/// What a worker does with a dequeued task. The worker pool never
/// interprets the request or response types; a task's failure path (spec's
/// `HandlerException`) must be folded into `Response` by the implementor,
/// since "task failures never abort the worker; every path sets a result"
/// (spec §4.2).
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    async fn handle(&self, req_id: &str, request: Self::Request) -> Self::Response;
}

struct Job<H: TaskHandler> {
    req_id: String,
    request: H::Request,
    reply: oneshot::Sender<H::Response>,
}

/// Result of [`WorkerPool::submit`].
#[derive(Debug)]
pub enum SubmitOutcome<R> {
    /// The worker produced a response before the deadline.
    Completed(R),
    /// No response arrived within the submitter's timeout. The task keeps
    /// running on the worker; the submitter must not assume it was
    /// cancelled (spec §4.2's "task failures never abort the worker").
    TimedOut,
    /// The worker's lane is gone (e.g. dropped mid-shutdown).
    WorkerGone,
}

/// Map of `session_key -> single-FIFO-queue worker`.
pub struct WorkerPool<H: TaskHandler> {
    handler: Arc<H>,
    lanes: RwLock<HashMap<String, mpsc::UnboundedSender<Job<H>>>>,
}

impl<H: TaskHandler> WorkerPool<H> {
    pub fn new(handler: H) -> Self {
        Self { handler: Arc::new(handler), lanes: RwLock::new(HashMap::new()) }
    }

    /// Enqueue `request` onto the lane for `session_key`, spawning a new
    /// worker if none exists yet, then wait up to `timeout` for its
    /// result. A timed-out submit does not cancel the in-flight task —
    /// only the wait gives up.
    pub async fn submit(
        &self,
        session_key: impl Into<String>,
        req_id: impl Into<String>,
        request: H::Request,
        timeout: Duration,
    ) -> SubmitOutcome<H::Response> {
        let session_key = session_key.into();
        let req_id = req_id.into();
        let lane = self.lane_for(&session_key).await;

        let (reply_tx, reply_rx) = oneshot::channel();
        if lane.send(Job { req_id, request, reply: reply_tx }).is_err() {
            return SubmitOutcome::WorkerGone;
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(response)) => SubmitOutcome::Completed(response),
            Ok(Err(_)) => SubmitOutcome::WorkerGone,
            Err(_) => SubmitOutcome::TimedOut,
        }
    }

    /// Number of live worker lanes, for daemon diagnostics/health endpoints.
    pub async fn active_lanes(&self) -> usize {
        self.lanes.read().await.len()
    }

    async fn lane_for(&self, session_key: &str) -> mpsc::UnboundedSender<Job<H>> {
        if let Some(tx) = self.lanes.read().await.get(session_key) {
            if !tx.is_closed() {
                return tx.clone();
            }
        }

        let mut lanes = self.lanes.write().await;
        if let Some(tx) = lanes.get(session_key) {
            if !tx.is_closed() {
                return tx.clone();
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handler = Arc::clone(&self.handler);
        let key = session_key.to_owned();
        tokio::spawn(worker_loop(handler, key, rx));
        lanes.insert(session_key.to_owned(), tx.clone());
        tx
    }
}

async fn worker_loop<H: TaskHandler>(
    handler: Arc<H>,
    session_key: String,
    mut rx: mpsc::UnboundedReceiver<Job<H>>,
) {
    while let Some(job) = rx.recv().await {
        tracing::info!(session_key = %session_key, req_id = %job.req_id, "task start");
        let response = handler.handle(&job.req_id, job.request).await;
        tracing::info!(session_key = %session_key, req_id = %job.req_id, "task done");
        let _ = job.reply.send(response);
    }
}
