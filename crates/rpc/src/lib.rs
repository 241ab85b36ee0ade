// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-JSON-over-TCP-loopback RPC kernel and client helpers (spec §2.8,
//! §2.9, §6): the wire framing both `ccb-daemon`'s server and any client
//! (`ccbctl`, a caller's own `ask`) build on top of.

pub mod client;
pub mod error;
pub mod framing;
pub mod state;

pub use client::{ping_daemon, send_request, shutdown_daemon};
pub use error::RpcError;
pub use framing::{recv_line, recv_with_deadline, send_line, MAX_LINE_BYTES};
pub use state::{normalize_connect_host, DaemonStateFile};
