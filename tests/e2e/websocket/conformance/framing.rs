use crate::websocket_e2e::util::{CLIENT_KEY, Harness, init_ws_test};
use futures_lite::future::block_on;
use hybi::io::{AsyncReadExt, duplex};
use hybi::net::websocket::{
    CloseCode, CloseReason, ConnectionState, Opcode, WebSocket, WebSocketConfig, encode,
};
use hybi::test_utils::{RawFrame, RecordingHandler, raw_frame};
use hybi::util::{DetEntropy, EntropySource};
use std::sync::Arc;

fn close_code(h: &mut Harness) -> CloseCode {
    let frames = h.peer_frames();
    let close = frames
        .iter()
        .find(|frame| frame.opcode == Opcode::Close)
        .expect("engine should have sent CLOSE");
    CloseReason::parse(&close.payload)
        .expect("well-formed close")
        .expect("close carries a status")
        .code
}

#[test]
fn ws_framing_all_length_tiers_reach_handler() {
    init_ws_test("ws_framing_all_length_tiers_reach_handler");
    let mut h = Harness::server(WebSocketConfig::server());

    let sizes = [0usize, 125, 126, 65_535, 65_536, 100_000];
    for &size in &sizes {
        let payload: Vec<u8> = (0..size).map(|i| (i % 241) as u8).collect();
        h.peer_send(Opcode::Binary, &payload, true);
    }
    assert_eq!(h.pump().unwrap(), sizes.len());

    let messages = h.handler.messages();
    assert_eq!(messages.len(), sizes.len());
    for (message, &size) in messages.iter().zip(&sizes) {
        assert_eq!(message.1.len(), size);
        assert!(message.1.iter().enumerate().all(|(i, b)| *b == (i % 241) as u8));
    }
}

#[test]
fn ws_framing_server_output_is_unmasked_and_bit_exact() {
    init_ws_test("ws_framing_server_output_is_unmasked_and_bit_exact");
    let mut h = Harness::server(WebSocketConfig::server());

    block_on(h.ws.send_text("Hello")).unwrap();
    let mut raw = [0u8; 7];
    block_on(h.peer.read_exact(&mut raw)).unwrap();
    assert_eq!(&raw, b"\x81\x05Hello");
}

#[test]
fn ws_framing_client_output_is_masked_with_fresh_key() {
    init_ws_test("ws_framing_client_output_is_masked_with_fresh_key");
    let (io, mut peer) = duplex(4096);
    let mut ws = WebSocket::new(io, RecordingHandler::new(), WebSocketConfig::client())
        .with_entropy(Arc::new(DetEntropy::new(7)));

    let keys = DetEntropy::new(7);
    let first_key = keys.mask_key().unwrap();
    let second_key = keys.mask_key().unwrap();

    block_on(ws.send_text("Hello")).unwrap();
    block_on(ws.send_text("Hello")).unwrap();

    let first = encode(Opcode::Text, b"Hello", true, Some(first_key));
    let second = encode(Opcode::Text, b"Hello", true, Some(second_key));
    let mut raw = vec![0u8; first.len() + second.len()];
    block_on(peer.read_exact(&mut raw)).unwrap();
    assert_eq!(&raw[..first.len()], &first[..]);
    assert_eq!(&raw[first.len()..], &second[..]);
    assert_ne!(first_key, second_key);
}

#[test]
fn ws_framing_unmasked_client_frame_fails_connection() {
    init_ws_test("ws_framing_unmasked_client_frame_fails_connection");
    let mut h = Harness::server(WebSocketConfig::server());

    h.peer_send_raw(&encode(Opcode::Text, b"naked", true, None));
    h.pump().unwrap();

    assert_eq!(close_code(&mut h), CloseCode::ProtocolError);
    assert!(h.handler.messages().is_empty());
    assert_eq!(h.handler.errors(), vec!["unmasked frame from client".to_owned()]);
}

#[test]
fn ws_framing_reserved_bits_strict_and_lenient() {
    init_ws_test("ws_framing_reserved_bits_strict_and_lenient");
    let bad = raw_frame(
        RawFrame {
            rsv2: true,
            mask: Some(CLIENT_KEY),
            ..RawFrame::new(0x1)
        },
        b"extension data",
    );

    let mut strict = Harness::server(WebSocketConfig::server());
    strict.peer_send_raw(&bad);
    strict.pump().unwrap();
    assert_eq!(close_code(&mut strict), CloseCode::ProtocolError);

    let mut lenient = Harness::server(WebSocketConfig::server().lenient());
    lenient.peer_send_raw(&bad);
    lenient.peer_send(Opcode::Text, b"plain", true);
    lenient.pump().unwrap();
    assert_eq!(lenient.handler.texts(), vec!["plain".to_owned()]);
    assert!(lenient.peer_frames().is_empty());
    assert_eq!(lenient.ws.state(), ConnectionState::Open);
}

#[test]
fn ws_framing_negotiated_rsv1_accepted() {
    init_ws_test("ws_framing_negotiated_rsv1_accepted");
    let mut h = Harness::server(WebSocketConfig::server().negotiated_rsv_bits(0b100));
    h.peer_send_raw(&raw_frame(
        RawFrame {
            rsv1: true,
            mask: Some(CLIENT_KEY),
            ..RawFrame::new(0x2)
        },
        b"opaque",
    ));
    h.pump().unwrap();
    assert_eq!(h.handler.messages().len(), 1);
}

#[test]
fn ws_framing_invalid_opcode_lenient_resyncs() {
    init_ws_test("ws_framing_invalid_opcode_lenient_resyncs");
    let mut h = Harness::server(WebSocketConfig::server().lenient());
    h.peer_send_raw(&raw_frame(
        RawFrame {
            mask: Some(CLIENT_KEY),
            ..RawFrame::new(0x3)
        },
        &[0xaa; 300],
    ));
    h.peer_send(Opcode::Text, b"after", true);
    h.pump().unwrap();
    assert_eq!(h.handler.texts(), vec!["after".to_owned()]);
    assert_eq!(h.ws.connection().stats().frames_rejected, 1);
}

#[test]
fn ws_framing_length_overflow_closes_under_any_policy() {
    init_ws_test("ws_framing_length_overflow_closes_under_any_policy");
    let mut h = Harness::server(WebSocketConfig::server().lenient());
    let mut raw = vec![0x82u8, 0xff];
    raw.extend_from_slice(&[0x80, 0, 0, 0, 0, 0, 0, 0]);
    raw.extend_from_slice(&CLIENT_KEY);
    h.peer_send_raw(&raw);
    h.pump().unwrap();

    assert_eq!(close_code(&mut h), CloseCode::ProtocolError);
    assert_eq!(h.ws.state(), ConnectionState::Closed);
}

#[test]
fn ws_framing_length_overflow_on_rejected_header_closes_under_any_policy() {
    init_ws_test("ws_framing_length_overflow_on_rejected_header_closes_under_any_policy");
    for config in [WebSocketConfig::server(), WebSocketConfig::server().lenient()] {
        let mut h = Harness::server(config);
        let mut raw = vec![0x83u8, 0xff];
        raw.extend_from_slice(&[0x80, 0, 0, 0, 0, 0, 0, 0]);
        raw.extend_from_slice(&CLIENT_KEY);
        h.peer_send_raw(&raw);
        h.peer_send(Opcode::Close, &CloseReason::normal().encode(), true);
        h.pump().unwrap();

        assert_eq!(close_code(&mut h), CloseCode::ProtocolError);
        assert_eq!(h.ws.state(), ConnectionState::Closed);
        assert_eq!(h.handler.errors().len(), 1);
    }
}

#[test]
fn ws_framing_random_read_boundaries() {
    init_ws_test("ws_framing_random_read_boundaries");
    let mut rng = fastrand::Rng::with_seed(0x6455);
    let mut h = Harness::server(WebSocketConfig::server());

    let mut wire = Vec::new();
    let mut expected = Vec::new();
    for _ in 0..64 {
        let len = rng.usize(0..300);
        let text: String = (0..len).map(|_| rng.alphanumeric()).collect();
        wire.extend_from_slice(&encode(Opcode::Text, text.as_bytes(), true, Some(CLIENT_KEY)));
        expected.push(text);
    }

    let mut offset = 0;
    while offset < wire.len() {
        let step = rng.usize(1..=97).min(wire.len() - offset);
        h.peer_send_raw(&wire[offset..offset + step]);
        h.pump().unwrap();
        offset += step;
    }

    assert_eq!(h.handler.texts(), expected);
    assert_eq!(h.ws.state(), ConnectionState::Open);
}
