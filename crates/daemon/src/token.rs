// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth token generation (spec §4.4: "token is 128 random bits at
//! startup"). Grounded on `caskd_daemon.py::_random_token`
//! (`os.urandom(16).hex()`).

use rand::RngCore;

pub fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    let mut out = String::with_capacity(32);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_32_lowercase_hex_chars() {
        let tok = random_token();
        assert_eq!(tok.len(), 32);
        assert!(tok.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn successive_tokens_differ() {
        assert_ne!(random_token(), random_token());
    }
}
