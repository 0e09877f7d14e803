use crate::websocket_e2e::util::{Harness, init_ws_test};
use bytes::BytesMut;
use hybi::codec::Decoder;
use hybi::net::websocket::{
    CloseCode, CloseReason, ConnectionState, FrameCodec, Opcode, WebSocketConfig, WsError,
};

#[test]
fn ws_conformance_rejects_fragmented_control_frame_on_decode() {
    init_ws_test("ws_conformance_rejects_fragmented_control_frame_on_decode");

    // FIN=0, opcode=Ping (0x9), MASK=1, len=0.
    // Decoder validates FIN/opcode before consuming further bytes.
    let mut raw = BytesMut::from(&b"\x09\x80"[..]);
    let mut codec = FrameCodec::server();
    let err = codec
        .decode(&mut raw)
        .expect_err("fragmented control frame must be rejected");
    assert!(matches!(err, WsError::FragmentedControlFrame));
}

#[test]
fn ws_conformance_reassembles_fragments_in_order() {
    init_ws_test("ws_conformance_reassembles_fragments_in_order");
    let mut h = Harness::server(WebSocketConfig::server());

    h.peer_send(Opcode::Text, b"frag", false);
    h.peer_send(Opcode::Continuation, b"men", false);
    h.peer_send(Opcode::Continuation, b"ted", true);
    assert_eq!(h.pump().unwrap(), 3);

    assert_eq!(h.handler.texts(), vec!["fragmented".to_owned()]);
    assert_eq!(h.ws.state(), ConnectionState::Open);
}

#[test]
fn ws_conformance_fragments_split_across_reads() {
    init_ws_test("ws_conformance_fragments_split_across_reads");
    let mut h = Harness::server(WebSocketConfig::server());

    h.peer_send(Opcode::Binary, &[1, 2, 3], false);
    h.pump().unwrap();
    assert!(h.handler.messages().is_empty());
    assert!(h.ws.connection().assembler().is_in_progress());

    h.peer_send(Opcode::Continuation, &[4, 5], true);
    h.pump().unwrap();
    let messages = h.handler.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, Opcode::Binary);
    assert_eq!(&messages[0].1[..], &[1, 2, 3, 4, 5]);
}

#[test]
fn ws_conformance_new_message_while_fragmenting_fails_strict() {
    init_ws_test("ws_conformance_new_message_while_fragmenting_fails_strict");
    let mut h = Harness::server(WebSocketConfig::server());

    h.peer_send(Opcode::Text, b"open", false);
    h.peer_send(Opcode::Text, b"intruder", true);
    h.pump().unwrap();

    let frames = h.peer_frames();
    assert_eq!(frames.len(), 1);
    let close = CloseReason::parse(&frames[0].payload).unwrap().unwrap();
    assert_eq!(close.code, CloseCode::ProtocolError);
    assert_eq!(h.ws.state(), ConnectionState::Closing);
    assert!(h.handler.messages().is_empty());
}

#[test]
fn ws_conformance_new_message_while_fragmenting_dropped_lenient() {
    init_ws_test("ws_conformance_new_message_while_fragmenting_dropped_lenient");
    let mut h = Harness::server(WebSocketConfig::server().lenient());

    h.peer_send(Opcode::Text, b"open", false);
    h.peer_send(Opcode::Text, b"intruder", true);
    h.peer_send(Opcode::Continuation, b"ed", true);
    h.pump().unwrap();

    assert_eq!(h.handler.texts(), vec!["opened".to_owned()]);
    assert!(h.peer_frames().is_empty());
    assert_eq!(h.ws.connection().stats().frames_rejected, 1);
}

#[test]
fn ws_conformance_message_size_limit() {
    init_ws_test("ws_conformance_message_size_limit");
    let config = WebSocketConfig::server()
        .max_frame_size(1024)
        .max_message_size(1024);
    let mut h = Harness::server(config);

    h.peer_send(Opcode::Binary, &[0u8; 800], false);
    h.peer_send(Opcode::Continuation, &[0u8; 800], true);
    h.pump().unwrap();

    let frames = h.peer_frames();
    let close = CloseReason::parse(&frames[0].payload).unwrap().unwrap();
    assert_eq!(close.code, CloseCode::MessageTooBig);
    assert!(h.handler.messages().is_empty());
}
