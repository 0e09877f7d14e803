//! The invalid-continuation scenario.
//!
//! A peer sends a CONTINUATION that continues nothing, then (after the
//! connection has begun closing) a well-formed TEXT frame. A conforming
//! endpoint must never surface either payload to the application.

use crate::websocket_e2e::util::{Harness, init_ws_test};
use hybi::net::websocket::{
    CloseCode, CloseReason, ConnectionState, Opcode, RejectionPolicy, WebSocketConfig,
};

const INVALID_CONTINUATION: &[u8] = b"Invalid continuation frame to be ignored.";
const AFTER_CLOSE: &[u8] = b"Valid frame after closing should be disposed.";

#[test]
fn ws_fixture_lenient_ignores_orphan_and_disposes_post_close_frame() {
    init_ws_test("ws_fixture_lenient_ignores_orphan_and_disposes_post_close_frame");
    let mut h = Harness::server(WebSocketConfig::server().policy(RejectionPolicy::Lenient));

    crate::common::test_section!("orphaned continuation");
    h.peer_send(Opcode::Continuation, INVALID_CONTINUATION, true);
    h.pump().unwrap();
    assert_eq!(h.ws.state(), ConnectionState::Open);
    assert!(h.handler.events().is_empty());
    assert!(h.peer_frames().is_empty());
    assert!(!h.ws.connection().assembler().is_in_progress());

    crate::common::test_section!("peer closes, then sends text");
    h.peer_send(Opcode::Close, &CloseReason::normal().encode(), true);
    h.peer_send(Opcode::Text, AFTER_CLOSE, true);
    h.pump().unwrap();

    assert_eq!(h.handler.messages(), vec![]);
    assert_eq!(h.handler.closes(), vec![(CloseCode::Normal, String::new())]);
    assert_eq!(h.ws.state(), ConnectionState::Closed);
    let stats = h.ws.connection().stats();
    assert_eq!(stats.frames_rejected, 1);
    assert_eq!(stats.messages_dispatched, 0);

    crate::common::test_complete!("ws_fixture_lenient_ignores_orphan_and_disposes_post_close_frame");
}

#[test]
fn ws_fixture_lenient_single_write_scenario() {
    init_ws_test("ws_fixture_lenient_single_write_scenario");
    let mut h = Harness::server(WebSocketConfig::server().lenient());

    // Both frames arrive in one read, as the fixture writes them back to back.
    h.peer_send(Opcode::Continuation, INVALID_CONTINUATION, true);
    h.peer_send(Opcode::Text, b"independent message", true);
    h.pump().unwrap();

    assert_eq!(h.handler.texts(), vec!["independent message".to_owned()]);
    assert_eq!(h.ws.state(), ConnectionState::Open);
}

#[test]
fn ws_fixture_strict_closes_and_disposes_following_text() {
    init_ws_test("ws_fixture_strict_closes_and_disposes_following_text");
    let mut h = Harness::server(WebSocketConfig::server());

    h.peer_send(Opcode::Continuation, INVALID_CONTINUATION, true);
    h.peer_send(Opcode::Text, AFTER_CLOSE, true);
    h.pump().unwrap();

    let frames = h.peer_frames();
    assert_eq!(frames.len(), 1);
    let close = CloseReason::parse(&frames[0].payload).unwrap().unwrap();
    assert_eq!(close.code, CloseCode::ProtocolError);

    assert!(h.handler.messages().is_empty());
    assert_eq!(h.handler.errors(), vec!["protocol violation: orphaned continuation".to_owned()]);
    assert_eq!(h.ws.state(), ConnectionState::Closing);
    assert_eq!(h.ws.connection().stats().frames_discarded, 1);

    h.peer_send(Opcode::Close, &CloseReason::new(CloseCode::ProtocolError, "").encode(), true);
    h.pump().unwrap();
    assert_eq!(h.ws.state(), ConnectionState::Closed);
}

#[test]
fn ws_fixture_client_receives_unmasked_scenario_from_server() {
    init_ws_test("ws_fixture_client_receives_unmasked_scenario_from_server");
    let mut h = Harness::client(WebSocketConfig::client().lenient());

    h.peer_send(Opcode::Continuation, INVALID_CONTINUATION, true);
    h.pump().unwrap();
    assert_eq!(h.ws.state(), ConnectionState::Open);
    assert!(h.handler.events().is_empty());

    h.peer_send(Opcode::Close, &CloseReason::normal().encode(), true);
    h.peer_send(Opcode::Text, AFTER_CLOSE, true);
    h.pump().unwrap();

    // The echoed CLOSE is masked, as every client frame must be.
    let frames = h.peer_frames();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_masked());
    let echo = CloseReason::parse(&frames[0].payload).unwrap().unwrap();
    assert_eq!(echo.code, CloseCode::Normal);

    assert!(h.handler.messages().is_empty());
    assert_eq!(h.handler.closes(), vec![(CloseCode::Normal, String::new())]);
    assert_eq!(h.ws.state(), ConnectionState::Closed);
    assert_eq!(h.ws.connection().stats().frames_discarded, 1);
}
