//! Cancel-correctness: dropped futures and lost transports must neither lose
//! nor duplicate bytes, and must never surface a partial message.

use crate::common::poll_once;
use crate::websocket_e2e::util::{Harness, init_ws_test};
use futures_lite::future::block_on;
use hybi::io::{AsyncReadExt, DuplexStream, duplex};
use hybi::net::websocket::{ConnectionState, Opcode, WebSocket, WebSocketConfig, WsError, encode};
use hybi::test_utils::RecordingHandler;
use std::pin::pin;

fn drain(peer: &mut DuplexStream, wire: &mut Vec<u8>) {
    let pending = peer.pending_read();
    if pending > 0 {
        let mut buf = vec![0u8; pending];
        block_on(peer.read_exact(&mut buf)).unwrap();
        wire.extend_from_slice(&buf);
    }
}

#[test]
fn ws_cancel_dropped_read_loses_nothing() {
    init_ws_test("ws_cancel_dropped_read_loses_nothing");
    let mut h = Harness::server(WebSocketConfig::server());

    {
        let mut fut = pin!(h.ws.process_available());
        assert!(poll_once(&mut fut).is_pending(), "nothing to read yet");
    }

    h.peer_send(Opcode::Text, b"after cancelled read", true);
    h.pump().unwrap();
    assert_eq!(h.handler.texts(), vec!["after cancelled read".to_owned()]);
}

#[test]
fn ws_cancel_dropped_write_resumes_exactly() {
    init_ws_test("ws_cancel_dropped_write_resumes_exactly");
    let (io, mut peer) = duplex(8);
    let mut ws = WebSocket::new(io, RecordingHandler::new(), WebSocketConfig::server());
    let text = "a message much longer than the pipe";

    {
        let mut fut = pin!(ws.send_text(text));
        assert!(poll_once(&mut fut).is_pending(), "pipe holds only 8 bytes");
    }

    let mut wire = Vec::new();
    loop {
        drain(&mut peer, &mut wire);
        let done = {
            let mut fut = pin!(ws.flush());
            poll_once(&mut fut).is_ready()
        };
        if done {
            drain(&mut peer, &mut wire);
            break;
        }
    }

    assert_eq!(wire, encode(Opcode::Text, text.as_bytes(), true, None).to_vec());
}

#[test]
fn ws_cancel_transport_loss_mid_fragment_is_silent() {
    init_ws_test("ws_cancel_transport_loss_mid_fragment_is_silent");
    let mut h = Harness::server(WebSocketConfig::server());

    h.peer_send(Opcode::Binary, b"first half", false);
    h.pump().unwrap();
    assert!(h.ws.connection().assembler().is_in_progress());

    let Harness {
        mut ws,
        handler,
        peer,
        ..
    } = h;
    drop(peer);
    block_on(ws.run()).unwrap();

    assert_eq!(ws.state(), ConnectionState::Closed);
    assert!(!ws.connection().assembler().is_in_progress());
    assert!(handler.events().is_empty());
}

#[test]
fn ws_cancel_transport_closed_by_owner() {
    init_ws_test("ws_cancel_transport_closed_by_owner");
    let mut h = Harness::server(WebSocketConfig::server());

    h.peer_send(Opcode::Text, b"par", false);
    h.pump().unwrap();
    h.ws.connection_mut().transport_closed();

    assert_eq!(h.ws.state(), ConnectionState::Closed);
    assert!(matches!(
        block_on(h.ws.process_available()),
        Err(WsError::ConnectionClosed)
    ));
    assert!(h.handler.events().is_empty());
}

#[test]
fn ws_cancel_truncated_frame_at_eof() {
    init_ws_test("ws_cancel_truncated_frame_at_eof");
    let mut h = Harness::server(WebSocketConfig::server());

    let wire = encode(Opcode::Text, b"cut short", true, Some([9, 9, 9, 9]));
    h.peer_send_raw(&wire[..wire.len() - 3]);
    h.pump().unwrap();
    assert!(h.handler.events().is_empty());

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
