// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The request/result shapes a [`crate::adapter::ProviderAdapter`] consumes
//! and produces, reconstructed from `original_source/lib/askd/daemon.py`'s
//! use of `ProviderRequest`/`ProviderResult` (the `askd.adapters.base`
//! module itself was not retained in the source pack) and cross-checked
//! against `caskd_daemon.py`'s per-provider `CaskdRequest`/`CaskdResult`
//! dataclasses, which carry the same fields.

use ccb_core::wire::{RequestMessage, ResponseMeta};
use ccb_core::Provider;

/// A delegation request bound for one provider adapter, independent of the
/// wire's `<prefix>.request` envelope (`ccb_core::wire::RequestMessage`)
/// that produced it.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub client_id: String,
    pub work_dir: String,
    pub timeout_s: f64,
    pub quiet: bool,
    pub message: String,
    pub caller: Option<String>,
    pub output_path: Option<String>,
    pub req_id_override: Option<String>,
    pub no_wrap: bool,
}

impl ProviderRequest {
    pub fn from_wire(msg: &RequestMessage) -> Self {
        Self {
            client_id: msg.id.clone(),
            work_dir: msg.work_dir.clone(),
            timeout_s: msg.timeout_s,
            quiet: msg.quiet,
            message: msg.message.clone(),
            caller: msg.caller.clone(),
            output_path: msg.output_path.clone(),
            req_id_override: msg.req_id.clone(),
            no_wrap: msg.no_wrap,
        }
    }
}

/// What an adapter hands back to the worker pool (spec §6's response body,
/// minus the wire envelope fields `type`/`v`/`id`).
#[derive(Debug, Clone)]
pub struct ProviderResult {
    pub req_id: String,
    pub exit_code: i32,
    pub reply: String,
    pub session_key: String,
    pub done_seen: bool,
    pub done_ms: Option<i64>,
    pub anchor_seen: bool,
    pub anchor_ms: Option<i64>,
    pub fallback_scan: bool,
    pub log_path: Option<String>,
}

impl ProviderResult {
    pub fn into_meta(self) -> (String, i32, String, ResponseMeta) {
        (
            self.req_id,
            self.exit_code,
            self.reply,
            ResponseMeta {
                session_key: self.session_key,
                done_seen: self.done_seen,
                done_ms: self.done_ms,
                anchor_seen: self.anchor_seen,
                anchor_ms: self.anchor_ms,
                fallback_scan: self.fallback_scan,
                log_path: self.log_path,
            },
        )
    }
}

/// A handle on a submitted task, bundled with the provider it was
/// submitted to for response-shaping in the unified daemon (spec §4.5).
pub struct SubmittedTask {
    pub provider: Provider,
    pub outcome: ccb_pool::SubmitOutcome<ProviderResult>,
}
