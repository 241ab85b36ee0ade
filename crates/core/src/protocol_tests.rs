// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::*;
use crate::id::ReqId;

const REQ_ID: &str = "00000000000000000000000000000001";

#[test]
fn s3_wrap_request_prompt_shape() {
    let wrapped = wrap_request_prompt("hello\nworld", REQ_ID);
    assert!(wrapped.contains(&format!("CCB_REQ_ID: {REQ_ID}")));
    assert!(wrapped.contains("\n\nhello\nworld\n\n"));
    assert!(wrapped.contains("IMPORTANT:"));
    assert!(wrapped.ends_with(&format!("CCB_DONE: {REQ_ID}\n")));
}

#[test]
fn invariant4_wrap_then_strip_round_trips() {
    let wrapped = wrap_request_prompt("hello\nworld", REQ_ID);
    let simulated_reply = format!("{wrapped}some reply\nCCB_DONE: {REQ_ID}\n");
    assert_eq!(strip_done_text(&simulated_reply, REQ_ID), "some reply");
}

#[parameterized(
    s4_done_with_blank_lines = {"answer\n\nCCB_DONE: abc\n\n\n", "abc", true, "answer"},
    s5_done_for_other_id_is_ignored = {"answer\nCCB_DONE: otherid\n", "abc", false, "answer\nCCB_DONE: otherid"},
    done_for_exact_id = {"reply body\nCCB_DONE: req1\n", "req1", true, "reply body"},
    done_not_last_line_is_ignored = {"CCB_DONE: req1\nmore text after\n", "req1", false, "CCB_DONE: req1\nmore text after"},
)]
fn done_detection_boundary_scenarios(text: &str, req_id: &str, expect_done: bool, expect_reply: &str) {
    assert_eq!(is_done_text(text, req_id), expect_done);
    assert_eq!(strip_done_text(text, req_id), expect_reply);
}

#[test]
fn harness_marker_is_stripped_before_checking_done() {
    let text = "reply\nCCB_DONE: req1\n\nHARNESS_DONE\n";
    assert!(is_done_text(text, "req1"));
    assert_eq!(strip_done_text(text, "req1"), "reply");
}

proptest::proptest! {
    #[test]
    fn invariant5_is_done_text_matches_last_nonblank_line(
        body in "[a-zA-Z0-9 ]{0,40}",
        req in "[0-9a-f]{32}",
        other in "[0-9a-f]{32}",
    ) {
        proptest::prop_assume!(req != other);
        let text = format!("{body}\nCCB_DONE: {req}\n");
        proptest::prop_assert!(is_done_text(&text, &req));
        proptest::prop_assert!(!is_done_text(&text, &other));
    }
}

#[test]
fn req_id_generate_is_usable_as_protocol_arg() {
    let id = ReqId::generate();
    let wrapped = wrap_request_prompt("hi", id.as_str());
    assert!(wrapped.contains(id.as_str()));
}
