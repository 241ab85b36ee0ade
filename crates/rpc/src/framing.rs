// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-JSON TCP framing kernel (spec §2.9, §6): one JSON object per line
//! terminated by `\n`, at most 16 MiB per message, deadlines applied per
//! recv iteration. Grounded directly on
//! `original_source/lib/askd_rpc.py`'s `_recv_with_deadline`: each
//! iteration's socket timeout is `min(remaining, 1.0)` seconds so a
//! cancelled wait is noticed at least once per second, rather than
//! blocking for the whole deadline in one shot.

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::RpcError;

/// Maximum bytes accepted for a single line (spec §6, "Maximum response
/// size 16 MiB").
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Read bytes from `reader` until a `\n` is seen, the connection closes,
/// or `deadline` passes — whichever comes first. Returns the bytes read
/// (which may lack a trailing newline if the peer closed first).
pub async fn recv_with_deadline<R>(
    reader: &mut R,
    deadline: Instant,
    max_bytes: usize,
) -> Result<Vec<u8>, RpcError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if buf.contains(&b'\n') {
            break;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(RpcError::Timeout);
        }
        let per_iter = remaining.min(Duration::from_secs(1));
        match tokio::time::timeout(per_iter, reader.read(&mut chunk)).await {
            Ok(Ok(0)) => break, // peer closed
            Ok(Ok(n)) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > max_bytes {
                    return Err(RpcError::MaxBytesExceeded(max_bytes));
                }
            }
            Ok(Err(e)) => return Err(RpcError::Io(e)),
            Err(_elapsed) => continue, // check the outer deadline and retry
        }
    }
    Ok(buf)
}

/// Read exactly one line (request or response), parsed as `T`.
pub async fn recv_line<R, T>(reader: &mut R, deadline: Instant) -> Result<T, RpcError>
where
    R: tokio::io::AsyncRead + Unpin,
    T: serde::de::DeserializeOwned,
{
    let buf = recv_with_deadline(reader, deadline, MAX_LINE_BYTES).await?;
    let line = buf.split(|b| *b == b'\n').next().ok_or(RpcError::ConnectionClosed)?;
    if line.is_empty() {
        return Err(RpcError::ConnectionClosed);
    }
    Ok(serde_json::from_slice(line)?)
}

/// Serialize `value` and write it as one `\n`-terminated line, flushing
/// immediately (each wire message is a standalone frame, spec §6).
pub async fn send_line<W, T>(writer: &mut W, value: &T) -> Result<(), RpcError>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn round_trips_a_single_line() -> anyhow::Result<()> {
        let mut buf: Vec<u8> = Vec::new();
        send_line(&mut buf, &json!({"type": "ask.ping"})).await?;
        assert_eq!(buf, b"{\"type\":\"ask.ping\"}\n");

        let mut cursor = std::io::Cursor::new(buf);
        let deadline = Instant::now() + Duration::from_secs(1);
        let value: serde_json::Value = recv_line(&mut cursor, deadline).await?;
        assert_eq!(value["type"], "ask.ping");
        Ok(())
    }

    #[tokio::test]
    async fn empty_stream_is_connection_closed() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let deadline = Instant::now() + Duration::from_millis(50);
        let err = recv_line::<_, serde_json::Value>(&mut cursor, deadline).await.unwrap_err();
        assert!(matches!(err, RpcError::ConnectionClosed));
    }

    #[tokio::test]
    async fn past_deadline_with_no_data_times_out() {
        // A reader that never produces data and never closes.
        struct Hang;
        impl tokio::io::AsyncRead for Hang {
            fn poll_read(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                std::task::Poll::Pending
            }
        }
        let mut hang = Hang;
        let deadline = Instant::now() + Duration::from_millis(50);
        let err = recv_with_deadline(&mut hang, deadline, MAX_LINE_BYTES).await.unwrap_err();
        assert!(matches!(err, RpcError::Timeout));
    }
}
