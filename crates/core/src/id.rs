// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The 128-bit request identifier used to correlate a delegated prompt
//! with its reply (spec §3, "Request identifier").

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::CcbError;

/// A 128-bit opaque request token, rendered as 32 lowercase hex characters.
///
/// Uniqueness across the process is required for correlation; callers
/// should always obtain one via [`ReqId::generate`] rather than
/// constructing one by hand, except when parsing a peer-supplied
/// `req_id` override (`ReqId::parse`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReqId(String);

impl ReqId {
    /// Generate a fresh 128-bit id from the process-wide CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(to_hex32(&bytes))
    }

    /// Parse and validate a caller-supplied id (must be exactly 32 lowercase
    /// hex characters). Used for the wire protocol's optional `req_id`
    /// override field.
    pub fn parse(s: &str) -> Result<Self, CcbError> {
        if s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(CcbError::BadRequest(format!("invalid req_id: {s:?}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_hex32(bytes: &[u8; 16]) -> String {
    let mut out = String::with_capacity(32);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
