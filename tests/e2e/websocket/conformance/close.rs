use crate::websocket_e2e::util::{Harness, init_ws_test};
use futures_lite::future::block_on;
use hybi::net::websocket::{
    CloseCode, CloseReason, ConnectionState, Opcode, WebSocketConfig, WsError,
};
use hybi::test_utils::HandlerEvent;
use std::time::Duration;

#[test]
fn ws_close_peer_initiated_is_echoed() {
    init_ws_test("ws_close_peer_initiated_is_echoed");
    let mut h = Harness::server(WebSocketConfig::server());

    let reason = CloseReason::new(CloseCode::GoingAway, "server restart");
    h.peer_send(Opcode::Close, &reason.encode(), true);
    h.pump().unwrap();

    let frames = h.peer_frames();
    assert_eq!(frames.len(), 1);
    let echo = CloseReason::parse(&frames[0].payload).unwrap().unwrap();
    assert_eq!(echo.code, CloseCode::GoingAway);
    assert_eq!(h.ws.state(), ConnectionState::Closed);
    assert_eq!(
        h.handler.events(),
        vec![HandlerEvent::Close {
            code: CloseCode::GoingAway,
            reason: "server restart".to_owned(),
        }]
    );
}

#[test]
fn ws_close_application_initiated_handshake() {
    init_ws_test("ws_close_application_initiated_handshake");
    let mut h = Harness::server(WebSocketConfig::server());

    block_on(h.ws.close(CloseReason::new(CloseCode::Normal, "done"))).unwrap();
    assert_eq!(h.ws.state(), ConnectionState::Closing);
    let frames = h.peer_frames();
    let sent = CloseReason::parse(&frames[0].payload).unwrap().unwrap();
    assert_eq!(sent.reason, "done");

    assert!(matches!(
        block_on(h.ws.send_text("too late")),
        Err(WsError::ConnectionClosed)
    ));

    h.peer_send(Opcode::Close, &CloseReason::normal().encode(), true);
    block_on(h.ws.run()).unwrap();
    assert_eq!(h.ws.state(), ConnectionState::Closed);
    assert!(h.peer_frames().is_empty(), "no second CLOSE");
    assert_eq!(h.handler.closes(), vec![(CloseCode::Normal, String::new())]);
}

#[test]
fn ws_close_malformed_payloads() {
    init_ws_test("ws_close_malformed_payloads");
    let cases: [(&[u8], CloseCode); 3] = [
        (b"\x03", CloseCode::ProtocolError),
        (b"\x03\xed", CloseCode::ProtocolError),
        (b"\x03\xe8\xc3\x28", CloseCode::InvalidPayload),
    ];
    for (payload, expected) in cases {
        let mut h = Harness::server(WebSocketConfig::server());
        h.peer_send(Opcode::Close, payload, true);
        h.pump().unwrap();
        let frames = h.peer_frames();
        let close = CloseReason::parse(&frames[0].payload).unwrap().unwrap();
        assert_eq!(close.code, expected, "payload {payload:?}");
        assert_eq!(h.handler.errors().len(), 1);
        assert_eq!(h.ws.state(), ConnectionState::Closed);
    }
}

#[test]
fn ws_close_timeout_forces_closed() {
    init_ws_test("ws_close_timeout_forces_closed");
    let mut h = Harness::server(WebSocketConfig::server().close_timeout(Duration::from_millis(5)));

    block_on(h.ws.close(CloseReason::normal())).unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let err = block_on(h.ws.run()).unwrap_err();
    assert!(matches!(err, WsError::CloseTimeout));
    assert_eq!(h.ws.state(), ConnectionState::Closed);
}

#[test]
fn ws_close_peer_eof_closes_without_callbacks() {
    init_ws_test("ws_close_peer_eof_closes_without_callbacks");
    let h = Harness::server(WebSocketConfig::server());
    let Harness {
        mut ws,
        handler,
        peer,
        ..
    } = h;

    drop(peer);
    block_on(ws.run()).unwrap();
    assert_eq!(ws.state(), ConnectionState::Closed);
    assert!(handler.events().is_empty());
}
