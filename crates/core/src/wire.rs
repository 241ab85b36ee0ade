// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire message shapes for the line-JSON TCP protocol (spec §6).
//!
//! Every message is `{"type": "<prefix>.<kind>", ...}`; `<prefix>` is
//! `ask`/`cask`/`gask`/`oask` (or a daemon-specific prefix) and `<kind>` is
//! one of `ping`/`pong`/`shutdown`/`request`/`response`.

use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// Minimal fields needed to route an inbound line before its full shape
/// (ping/shutdown/request) is known — mirrors the teacher's pattern of
/// peeking at a discriminant before deserializing the full payload.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// A `<prefix>.request` message body (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub v: u32,
    pub id: String,
    pub token: String,
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub caller: Option<String>,
    pub work_dir: String,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: f64,
    #[serde(default)]
    pub quiet: bool,
    pub message: String,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub no_wrap: bool,
    #[serde(default)]
    pub req_id: Option<String>,
    #[serde(default)]
    pub email_req_id: Option<String>,
    #[serde(default)]
    pub email_msg_id: Option<String>,
    #[serde(default)]
    pub email_from: Option<String>,
}

fn default_timeout_s() -> f64 {
    300.0
}

/// Extra diagnostic fields reported alongside a response's `reply`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub session_key: String,
    pub done_seen: bool,
    pub done_ms: Option<i64>,
    pub anchor_seen: bool,
    pub anchor_ms: Option<i64>,
    pub fallback_scan: bool,
    pub log_path: Option<String>,
}

/// A `<prefix>.response` / `<prefix>.pong` message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub v: u32,
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
    pub exit_code: i32,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

impl ResponseMessage {
    /// `{prefix}.pong` for a successful ping (spec S2).
    pub fn pong(prefix: &str, id: Option<String>) -> Self {
        Self {
            kind: format!("{prefix}.pong"),
            v: 1,
            id,
            req_id: None,
            exit_code: 0,
            reply: "OK".to_owned(),
            provider: None,
            meta: None,
        }
    }

    /// `{prefix}.response` acking a shutdown request before the server
    /// actually tears down asynchronously.
    pub fn shutdown_ack(prefix: &str, id: Option<String>) -> Self {
        Self {
            kind: format!("{prefix}.response"),
            v: 1,
            id,
            req_id: None,
            exit_code: 0,
            reply: "OK".to_owned(),
            provider: None,
            meta: None,
        }
    }

    /// `{prefix}.response` for a token mismatch (spec S1).
    pub fn unauthorized(prefix: &str, id: Option<String>) -> Self {
        Self {
            kind: format!("{prefix}.response"),
            v: 1,
            id,
            req_id: None,
            exit_code: 1,
            reply: "Unauthorized".to_owned(),
            provider: None,
            meta: None,
        }
    }

    /// A generic `{prefix}.response` error with `exit_code=1`.
    pub fn error(prefix: &str, id: Option<String>, reply: impl Into<String>) -> Self {
        Self {
            kind: format!("{prefix}.response"),
            v: 1,
            id,
            req_id: None,
            exit_code: 1,
            reply: reply.into(),
            provider: None,
            meta: None,
        }
    }

    /// A timed-out `{prefix}.response` (`exit_code=2`) carrying whatever
    /// partial text had already accumulated.
    pub fn timeout(prefix: &str, id: Option<String>, partial_reply: impl Into<String>) -> Self {
        Self {
            kind: format!("{prefix}.response"),
            v: 1,
            id,
            req_id: None,
            exit_code: 2,
            reply: partial_reply.into(),
            provider: None,
            meta: None,
        }
    }

    /// A successful `{prefix}.response` (`exit_code=0`) carrying the
    /// completed reply and diagnostic metadata.
    pub fn success(
        prefix: &str,
        id: Option<String>,
        req_id: String,
        reply: impl Into<String>,
        provider: Option<Provider>,
        meta: ResponseMeta,
    ) -> Self {
        Self {
            kind: format!("{prefix}.response"),
            v: 1,
            id,
            req_id: Some(req_id),
            exit_code: 0,
            reply: reply.into(),
            provider,
            meta: Some(meta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_unauthorized_shape() -> anyhow::Result<()> {
        let msg = ResponseMessage::unauthorized("ask", Some("x".to_owned()));
        let json = serde_json::to_value(&msg)?;
        assert_eq!(json["type"], "ask.response");
        assert_eq!(json["exit_code"], 1);
        assert_eq!(json["reply"], "Unauthorized");
        Ok(())
    }

    #[test]
    fn s2_pong_shape() -> anyhow::Result<()> {
        let msg = ResponseMessage::pong("ask", Some("ping".to_owned()));
        let json = serde_json::to_value(&msg)?;
        assert_eq!(json["type"], "ask.pong");
        assert_eq!(json["exit_code"], 0);
        assert_eq!(json["reply"], "OK");
        Ok(())
    }

    #[test]
    fn envelope_parses_discriminant_without_full_payload() -> anyhow::Result<()> {
        let line = r#"{"type":"ask.ping","id":"p1","token":"t"}"#;
        let env: Envelope = serde_json::from_str(line)?;
        assert_eq!(env.kind, "ask.ping");
        assert_eq!(env.token.as_deref(), Some("t"));
        Ok(())
    }

    #[test]
    fn request_message_defaults_timeout() -> anyhow::Result<()> {
        let line = r#"{"type":"ask.request","v":1,"id":"a","token":"t","work_dir":"/x","message":"hi"}"#;
        let req: RequestMessage = serde_json::from_str(line)?;
        assert_eq!(req.timeout_s, 300.0);
        assert!(!req.quiet);
        Ok(())
    }
}
