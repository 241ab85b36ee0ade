// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared `_handle_task` wait loop (spec §4.2, §4.3, §4.5), generalized
//! from `original_source/lib/caskd_daemon.py::_SessionWorker._handle_task`
//! across all four drivable providers. Each concrete adapter in this
//! module only supplies: which [`ReaderKind`] to tail, the pane-liveness
//! poll interval, and how (if at all) it detects provider-side
//! cancellation — the anchor/done bookkeeping, pane-death checks, and
//! result shaping live here once.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use ccb_core::protocol::{is_done_text, strip_done_text, wrap_request_prompt, REQ_ID_PREFIX};
use ccb_core::{CcbError, Provider};
use ccb_registry::SessionRecord;
use ccb_terminal::Terminal;
use ccb_transcript::{Event, Reader, ReaderKind, Role};

use crate::adapter::{error_result, ProviderAdapter};
use crate::task::{ProviderRequest, ProviderResult};

fn elapsed_ms(since: Instant) -> i64 {
    since.elapsed().as_millis() as i64
}

/// How a provider's screen (not transcript) signals that the provider
/// itself aborted the in-flight turn (spec §4.3, Codex's `■ Conversation
/// interrupted`). Checked on the same cadence as the pane-liveness probe.
pub struct ScreenCancelMarker {
    pub text: &'static str,
}

/// How a provider's transcript signals user-initiated cancellation (spec
/// §4.3: Gemini's "Request cancelled." info message, surfaced by
/// `ccb_transcript::gemini` as an ordinary event whose text contains this
/// marker; OpenCode's `MessageAbortedError` assistant text, gated by an
/// env var since "session-scoped abort is prone to false positives").
pub struct TranscriptCancelMarker {
    pub text: &'static str,
    pub env_gate: Option<&'static str>,
}

impl TranscriptCancelMarker {
    fn active(&self) -> bool {
        match self.env_gate {
            None => true,
            Some(var) => std::env::var(var).map(|v| is_truthy(&v)).unwrap_or(false),
        }
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Default width of the escape-hatch rebind window (spec §4.3, `caskd`'s
/// `REBIND_TAIL_BYTES`): 2 MiB back from EOF of the log we rebind to.
const DEFAULT_REBIND_TAIL_BYTES: u64 = 2 * 1024 * 1024;

/// A generic driver for one provider TUI, parameterized by the bits that
/// actually differ between Codex/Gemini/OpenCode/Droid.
pub struct DriveAdapter {
    pub provider: Provider,
    pub reader_kind: ReaderKind,
    pub pane_check_interval_env: &'static str,
    pub default_pane_check_interval_s: f64,
    pub screen_cancel: Option<ScreenCancelMarker>,
    pub transcript_cancel: Option<TranscriptCancelMarker>,
    /// Env var naming the escape-hatch rebind tail width in bytes (Codex
    /// only: `CCB_CASKD_REBIND_TAIL_BYTES`, spec §6). `None` for providers
    /// with no session-id filter to drop.
    pub rebind_tail_bytes_env: Option<&'static str>,
}

impl DriveAdapter {
    fn pane_check_interval(&self) -> Duration {
        let secs = std::env::var(self.pane_check_interval_env)
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| *v > 0.0)
            .unwrap_or(self.default_pane_check_interval_s);
        Duration::from_secs_f64(secs)
    }

    fn rebind_tail_bytes(&self) -> u64 {
        let Some(var) = self.rebind_tail_bytes_env else { return DEFAULT_REBIND_TAIL_BYTES };
        std::env::var(var)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_REBIND_TAIL_BYTES)
    }

    fn load_active_session(&self, work_dir: &std::path::Path) -> Result<SessionRecord, CcbError> {
        let record = SessionRecord::load(work_dir, self.provider)
            .map_err(|e| CcbError::HandlerException(e.to_string()))?
            .ok_or(CcbError::NoSession)?;
        if !record.active {
            return Err(CcbError::NoSession);
        }
        Ok(record)
    }

    async fn resolve_pane(&self, record: &mut SessionRecord, terminal: &Terminal) -> Result<(), CcbError> {
        if terminal.is_alive(&record.pane_handle).await {
            return Ok(());
        }
        record.reresolve_pane(terminal).await;
        if !terminal.is_alive(&record.pane_handle).await {
            return Err(CcbError::PaneUnavailable(record.pane_handle.clone()));
        }
        let _ = record.save(self.provider);
        Ok(())
    }

    async fn drive(&self, req_id: &str, request: ProviderRequest) -> Result<ProviderResult, CcbError> {
        let started = Instant::now();
        let work_dir = PathBuf::from(&request.work_dir);
        let mut record = self.load_active_session(&work_dir)?;
        let session_key = record.session_key();
        let terminal = Terminal::new(record.terminal);
        self.resolve_pane(&mut record, &terminal).await?;

        let mut reader = Reader::new(self.reader_kind, work_dir.clone());
        if let Some(path) = record.session_path.clone() {
            reader.set_preferred_session(path);
        }
        if let Some(id) = record.session_id.clone() {
            reader.set_session_id_hint(id);
        }

        let mut cursor = reader.capture_state().await;

        let prompt = if request.no_wrap {
            request.message.clone()
        } else {
            wrap_request_prompt(&request.message, req_id)
        };
        terminal
            .inject_text(&record.pane_handle, &prompt)
            .await
            .map_err(|e| CcbError::PaneUnavailable(e.to_string()))?;

        let deadline =
            if request.timeout_s < 0.0 { started + Duration::from_secs(24 * 3600) } else { started + Duration::from_secs_f64(request.timeout_s) };
        let anchor_grace_deadline = deadline.min(Instant::now() + Duration::from_millis(1500));
        let anchor_collect_grace = deadline.min(Instant::now() + Duration::from_secs(2));
        let pane_check_interval = self.pane_check_interval();

        let mut chunks: Vec<String> = Vec::new();
        let mut anchor_seen = false;
        let mut anchor_ms: Option<i64> = None;
        let mut done_seen = false;
        let mut done_ms: Option<i64> = None;
        let mut fallback_scan = false;
        let mut rebounded = false;
        let mut last_pane_check = Instant::now();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            if last_pane_check.elapsed() >= pane_check_interval {
                last_pane_check = Instant::now();
                if !terminal.is_alive(&record.pane_handle).await {
                    return Err(CcbError::PaneDiedMidRequest);
                }
                if let Some(marker) = &self.screen_cancel {
                    if let Ok(text) = terminal.capture_screen(&record.pane_handle, 15).await {
                        let req_id_pos = text.find(req_id);
                        let interrupt_pos = text.find(marker.text);
                        let is_current = match (req_id_pos, interrupt_pos) {
                            (Some(r), Some(i)) => i > r,
                            (None, Some(_)) => true,
                            _ => false,
                        };
                        if is_current {
                            return Err(CcbError::UserCancelled(format!("{} detected on screen", marker.text)));
                        }
                    }
                }
            }

            let wait_slice = remaining.min(Duration::from_millis(500));
            let (event, new_cursor) = reader.wait_for_message(cursor, wait_slice).await;
            cursor = new_cursor;

            let Some(Event { role, text }) = event else {
                if !rebounded && !anchor_seen && Instant::now() >= anchor_grace_deadline {
                    reader.clear_session_id_filter().await;
                    rebounded = true;
                    fallback_scan = true;
                    cursor = reader.rebind_near_tail(self.rebind_tail_bytes()).await;
                }
                continue;
            };

            if role == Role::User {
                if text.contains(&format!("{REQ_ID_PREFIX} {req_id}")) {
                    anchor_seen = true;
                    anchor_ms.get_or_insert_with(|| elapsed_ms(started));
                }
                continue;
            }

            if !anchor_seen && Instant::now() < anchor_collect_grace {
                continue;
            }

            if let Some(marker) = &self.transcript_cancel {
                if marker.active() && text.contains(marker.text) {
                    return Err(CcbError::UserCancelled(format!("{} detected in transcript", marker.text)));
                }
            }

            chunks.push(text);
            let combined = chunks.join("\n");
            if is_done_text(&combined, req_id) {
                done_seen = true;
                done_ms = Some(elapsed_ms(started));
                break;
            }
        }

        let combined = chunks.join("\n");
        let reply = strip_done_text(&combined, req_id);

        if done_seen {
            if let Some(path) = reader.current_session_path().await {
                let id = record.session_id.clone().unwrap_or_default();
                record.rebind(id, path);
                let _ = record.save(self.provider);
            }
        }

        Ok(ProviderResult {
            req_id: req_id.to_owned(),
            exit_code: if done_seen { 0 } else { 2 },
            reply,
            session_key,
            done_seen,
            done_ms,
            anchor_seen,
            anchor_ms,
            fallback_scan,
            log_path: reader.current_session_path().await.map(|p| p.display().to_string()),
        })
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for DriveAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn compute_session_key(&self, request: &ProviderRequest) -> Result<String, CcbError> {
        let work_dir = PathBuf::from(&request.work_dir);
        Ok(self.load_active_session(&work_dir)?.session_key())
    }

    async fn handle_task(&self, req_id: &str, request: ProviderRequest) -> ProviderResult {
        let session_key_hint = self.compute_session_key(&request).await.unwrap_or_default();
        match self.drive(req_id, request).await {
            Ok(result) => result,
            Err(err) => error_result(req_id, session_key_hint, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_cancel_marker_requires_gate_when_configured() {
        let marker = TranscriptCancelMarker { text: "MessageAbortedError", env_gate: Some("CCB_TEST_CANCEL_GATE_UNSET") };
        std::env::remove_var("CCB_TEST_CANCEL_GATE_UNSET");
        assert!(!marker.active());
    }

    #[test]
    fn transcript_cancel_marker_with_no_gate_is_always_active() {
        let marker = TranscriptCancelMarker { text: "Request cancelled.", env_gate: None };
        assert!(marker.active());
    }

    #[test]
    fn is_truthy_accepts_common_spellings() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("Yes"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }
}
