// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-provider adapter seam (spec §4.5): `load_session` /
//! `compute_session_key` / `handle_task` / `handle_exception`, bridged into
//! [`ccb_pool::TaskHandler`] so the same [`ccb_pool::WorkerPool`] that
//! guards the per-session FIFO lane can drive any of the four provider
//! backends uniformly.

use std::sync::Arc;

use async_trait::async_trait;
use ccb_core::{CcbError, Provider};

use crate::task::{ProviderRequest, ProviderResult};

/// One provider's terminal/transcript driving logic (spec §4.2, §4.3).
/// `ccb-daemon`'s adapters module provides the four concrete
/// implementations (Codex, Gemini, OpenCode, Droid); Claude has none,
/// consistent with [`Provider::daemon_key`] returning `None` for it and
/// `ccb_transcript::ReaderKind` excluding it entirely.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// The worker-pool lane key for this request (spec §4.2's priority
    /// order), resolved from the project's session record. Returns
    /// `CcbError::NoSession` if `work_dir` has no active binding — this is
    /// checked *before* the request is queued so a caller with no bound
    /// session fails fast rather than occupying a lane.
    async fn compute_session_key(&self, request: &ProviderRequest) -> Result<String, CcbError>;

    /// Inject the wrapped prompt and wait for the done sentinel, per
    /// §4.1/§4.3. Never panics; every failure path is folded into a
    /// `ProviderResult` with an appropriate `exit_code` before this
    /// returns, matching the worker pool's "task failures never abort the
    /// worker" contract (spec §4.2).
    async fn handle_task(&self, req_id: &str, request: ProviderRequest) -> ProviderResult;
}

/// Folds an adapter-internal `CcbError` into the response shape a
/// `<prefix>.response` carries, used by every adapter's `handle_task` on
/// its error paths (spec §7's "HandlerException: caught inside the
/// worker; the worker logs and returns a synthetic failure result").
pub fn error_result(req_id: &str, session_key: impl Into<String>, err: CcbError) -> ProviderResult {
    ProviderResult {
        req_id: req_id.to_owned(),
        exit_code: err.exit_code(),
        reply: err.to_string(),
        session_key: session_key.into(),
        done_seen: false,
        done_ms: None,
        anchor_seen: false,
        anchor_ms: None,
        fallback_scan: false,
        log_path: None,
    }
}

/// Bridges an `Arc<dyn ProviderAdapter>` into [`ccb_pool::TaskHandler`] so
/// it can back a [`ccb_pool::WorkerPool`].
pub struct AdapterHandler(pub Arc<dyn ProviderAdapter>);

#[async_trait]
impl ccb_pool::TaskHandler for AdapterHandler {
    type Request = ProviderRequest;
    type Response = ProviderResult;

    async fn handle(&self, req_id: &str, request: Self::Request) -> Self::Response {
        self.0.handle_task(req_id, request).await
    }
}
