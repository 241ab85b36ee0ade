// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashSet;

use super::*;

#[test]
fn generated_id_is_32_lowercase_hex_chars() {
    let id = ReqId::generate();
    assert_eq!(id.as_str().len(), 32);
    assert!(id.as_str().bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
}

#[test]
fn ten_thousand_generated_ids_never_collide() {
    let mut seen = HashSet::with_capacity(10_000);
    for _ in 0..10_000 {
        let id = ReqId::generate();
        assert!(seen.insert(id.as_str().to_owned()), "req_id collision");
    }
}

#[test]
fn parse_rejects_uppercase_and_wrong_length() {
    assert!(ReqId::parse("0123456789abcdef0123456789abcdef").is_ok());
    assert!(ReqId::parse("0123456789ABCDEF0123456789abcdef").is_err());
    assert!(ReqId::parse("short").is_err());
    assert!(ReqId::parse("").is_err());
}

#[test]
fn display_matches_as_str() {
    let id = ReqId::generate();
    assert_eq!(id.to_string(), id.as_str());
}
