//! Fuzz target: `FrameCodec::decode`
//!
//! Feeds arbitrary bytes, split at an arbitrary point, into the streaming
//! decoder. The decoder must never panic, never yield a frame that breaks
//! the control-frame rules, and must yield the same frames as a single-shot
//! decode of the same bytes.
//!
//! cargo fuzz run frame_decoder

#![no_main]

use bytes::BytesMut;
use hybi::codec::Decoder;
use hybi::net::websocket::{FrameCodec, MAX_CONTROL_PAYLOAD, Role};
use libfuzzer_sys::fuzz_target;

const MAX_FRAME: usize = 64 * 1024;

fn decode_all(role: Role, chunks: &[&[u8]]) -> Vec<Result<(u8, usize), String>> {
    let mut codec = FrameCodec::new(role).max_frame_size(MAX_FRAME);
    let mut buf = BytesMut::new();
    let mut out = Vec::new();
    for chunk in chunks {
        buf.extend_from_slice(chunk);
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(frame)) => {
                    assert!(frame.payload.len() <= MAX_FRAME);
                    if frame.is_control() {
                        assert!(frame.fin);
                        assert!(frame.payload.len() <= MAX_CONTROL_PAYLOAD);
                    }
                    out.push(Ok((frame.opcode.as_u8(), frame.payload.len())));
                }
                Ok(None) => break,
                Err(err) => {
                    let fatal = err.is_fatal();
                    out.push(Err(err.to_string()));
                    if fatal {
                        return out;
                    }
                }
            }
        }
    }
    out
}

fuzz_target!(|input: (u16, bool, &[u8])| {
    let (split, client, data) = input;
    let role = if client { Role::Client } else { Role::Server };
    let split = usize::from(split) % (data.len() + 1);

    let whole = decode_all(role, &[data]);
    let split_up = decode_all(role, &[&data[..split], &data[split..]]);
    // A rejected header split before its length may report the early
    // rejection before a fatal length; decoded frames must still agree.
    let frames = |out: &[Result<(u8, usize), String>]| {
        out.iter().filter_map(|r| r.clone().ok()).collect::<Vec<_>>()
    };
    assert_eq!(frames(&whole), frames(&split_up), "read boundaries must not change decoding");
});
