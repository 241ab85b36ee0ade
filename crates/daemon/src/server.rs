// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The TCP accept loop (spec §4.4, §6): one task per connection, each
//! connection carrying exactly one `ping`/`shutdown`/`request` line and its
//! reply, mirroring `askd_server.py`'s `StreamRequestHandler` subclass —
//! a fresh connection per call, not a persistent multiplexed session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ccb_core::wire::{Envelope, RequestMessage, ResponseMessage};
use ccb_core::{CcbError, Provider, ReqId};
use ccb_pool::SubmitOutcome;
use ccb_rpc::framing::{recv_with_deadline, send_line, MAX_LINE_BYTES};
use ccb_rpc::RpcError;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::activity::Activity;
use crate::registry::ProviderRegistry;
use crate::task::ProviderRequest;

/// How long a connection is given to deliver its one request line. Generous
/// since a well-behaved client writes it immediately after connecting; this
/// is not the request's own `timeout_s`, which is honored separately once
/// the request reaches [`ProviderRegistry::submit`].
const INITIAL_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra slack added to a request's own `timeout_s` before the submitter
/// gives up waiting on the worker (spec §4.2: the worker may legitimately
/// notice its own deadline slightly late).
const SUBMIT_SLACK: Duration = Duration::from_secs(5);

pub struct Server {
    /// Wire message prefix (`ask`, `cask`, `gask`, `oask`).
    prefix: String,
    token: String,
    registry: ProviderRegistry,
    /// `Some` for a single-provider daemon, whose requests never carry
    /// their own `provider` field; `None` for the unified `askd`, which
    /// requires the field and routes on it.
    fixed_provider: Option<Provider>,
    activity: Arc<Activity>,
    cancel: CancellationToken,
}

impl Server {
    pub fn new(
        prefix: impl Into<String>,
        token: impl Into<String>,
        registry: ProviderRegistry,
        fixed_provider: Option<Provider>,
        activity: Arc<Activity>,
        cancel: CancellationToken,
    ) -> Self {
        Self { prefix: prefix.into(), token: token.into(), registry, fixed_provider, activity, cancel }
    }

    /// Accept connections until `cancel` fires or the listener errors out.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let this = Arc::clone(&self);
                            tokio::spawn(async move { this.handle_connection(stream).await });
                        }
                        Err(err) => tracing::warn!(error = %err, "accept failed"),
                    }
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream) {
        self.activity.enter();
        if let Err(err) = self.handle_connection_inner(stream).await {
            tracing::debug!(error = %err, "connection closed with error");
        }
        self.activity.exit();
    }

    async fn handle_connection_inner(&self, stream: TcpStream) -> Result<(), RpcError> {
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let deadline = Instant::now() + INITIAL_READ_TIMEOUT;
        let buf = recv_with_deadline(&mut reader, deadline, MAX_LINE_BYTES).await?;
        let line = buf.split(|b| *b == b'\n').next().ok_or(RpcError::ConnectionClosed)?;
        if line.is_empty() {
            return Err(RpcError::ConnectionClosed);
        }
        let envelope: Envelope = serde_json::from_slice(line)?;
        self.activity.touch();

        if envelope.token.as_deref() != Some(self.token.as_str()) {
            send_line(&mut writer, &ResponseMessage::unauthorized(&self.prefix, envelope.id)).await?;
            return Ok(());
        }

        let ping_kind = format!("{}.ping", self.prefix);
        let shutdown_kind = format!("{}.shutdown", self.prefix);
        let request_kind = format!("{}.request", self.prefix);

        if envelope.kind == ping_kind {
            send_line(&mut writer, &ResponseMessage::pong(&self.prefix, envelope.id)).await?;
        } else if envelope.kind == shutdown_kind {
            send_line(&mut writer, &ResponseMessage::shutdown_ack(&self.prefix, envelope.id)).await?;
            tracing::info!("shutdown requested over rpc");
            self.cancel.cancel();
        } else if envelope.kind == request_kind {
            let request: RequestMessage = serde_json::from_slice(line)?;
            let response = self.handle_request(envelope.id, request).await;
            send_line(&mut writer, &response).await?;
        } else {
            let reply = format!("unknown message type: {}", envelope.kind);
            send_line(&mut writer, &ResponseMessage::error(&self.prefix, envelope.id, reply)).await?;
        }
        Ok(())
    }

    async fn handle_request(&self, id: Option<String>, msg: RequestMessage) -> ResponseMessage {
        let provider = match self.fixed_provider.or(msg.provider) {
            Some(provider) => provider,
            None => return ResponseMessage::error(&self.prefix, id, CcbError::BadRequest("missing provider".to_owned()).to_string()),
        };

        let req_id = match &msg.req_id {
            Some(s) => match ReqId::parse(s) {
                Ok(r) => r,
                Err(err) => return ResponseMessage::error(&self.prefix, id, err.to_string()),
            },
            None => ReqId::generate(),
        };

        let timeout = Duration::from_secs_f64(msg.timeout_s.max(0.0)) + SUBMIT_SLACK;
        let request = ProviderRequest::from_wire(&msg);

        match self.registry.submit(provider, req_id.as_str(), request, timeout).await {
            Ok(SubmitOutcome::Completed(result)) => {
                let (req_id, exit_code, reply, meta) = result.into_meta();
                let mut response = ResponseMessage::success(&self.prefix, id, req_id, reply, Some(provider), meta);
                response.exit_code = exit_code;
                response
            }
            Ok(SubmitOutcome::TimedOut) => ResponseMessage::timeout(&self.prefix, id, ""),
            Ok(SubmitOutcome::WorkerGone) => {
                ResponseMessage::error(&self.prefix, id, CcbError::HandlerException("worker lane gone".to_owned()).to_string())
            }
            Err(err) => ResponseMessage::error(&self.prefix, id, err.to_string()),
        }
    }
}
