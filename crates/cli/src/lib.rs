// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ccbctl`: a thin control binary over the daemon family's RPC surface
//! (spec §2.8) — ping, shutdown, status — not the caller's own `ask`/
//! `pend` front-end, which is out of scope.

pub mod command;
pub mod error;
pub mod target;

pub use error::CliError;
pub use target::Target;
