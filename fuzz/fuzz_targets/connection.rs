//! Fuzz target: `Connection::receive_frame` / `receive_error`
//!
//! Decodes arbitrary bytes with a server codec and drives the results
//! through the connection state machine. Nothing may reach the handler once
//! the connection has left OPEN, and a failed strict connection must have
//! queued exactly one CLOSE.
//!
//! cargo fuzz run connection

#![no_main]

use bytes::{Bytes, BytesMut};
use hybi::codec::Decoder;
use hybi::net::websocket::{
    ConnectionState, Connection, FrameCodec, MessageHandler, Opcode, RejectionPolicy,
    WebSocketConfig, WsError,
};
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct Counter {
    messages: usize,
    after_open: usize,
    open: bool,
}

impl MessageHandler for Counter {
    fn on_message(&mut self, _opcode: Opcode, _payload: Bytes) {
        self.messages += 1;
        if !self.open {
            self.after_open += 1;
        }
    }

    fn on_error(&mut self, _error: &WsError) {}
}

fuzz_target!(|input: (bool, &[u8])| {
    let (lenient, data) = input;
    let policy = if lenient {
        RejectionPolicy::Lenient
    } else {
        RejectionPolicy::Strict
    };
    let config = WebSocketConfig::server()
        .policy(policy)
        .max_frame_size(64 * 1024)
        .max_message_size(256 * 1024);
    let mut codec = FrameCodec::server().max_frame_size(64 * 1024);
    let mut conn = Connection::new(config, Counter::default());
    let mut buf = BytesMut::from(data);

    loop {
        conn.handler_mut().open = conn.state() == ConnectionState::Open;
        match codec.decode(&mut buf) {
            Ok(Some(frame)) => {
                conn.receive_frame(frame);
            }
            Ok(None) => break,
            Err(err) => {
                let fatal = err.is_fatal();
                conn.receive_error(err);
                if fatal {
                    break;
                }
            }
        }
    }

    assert_eq!(conn.handler().after_open, 0, "dispatch after leaving OPEN");

    let mut closes = 0;
    while let Some(frame) = conn.next_frame() {
        assert!(frame.payload.len() <= 125 || !frame.opcode.is_control());
        if frame.opcode == Opcode::Close {
            closes += 1;
        }
    }
    assert!(closes <= 1, "at most one CLOSE is ever sent");
    if conn.state() != ConnectionState::Open {
        assert!(!conn.assembler().is_in_progress());
    }
});
