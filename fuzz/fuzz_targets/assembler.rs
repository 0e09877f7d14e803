//! Fuzz target: `FragmentAssembler::feed`
//!
//! Drives arbitrary frame sequences through the assembler and checks that
//! completed messages are exactly the concatenation of the fragments that
//! built them, and that a rejected frame never disturbs an open message.
//!
//! cargo fuzz run assembler

#![no_main]

use arbitrary::Arbitrary;
use hybi::net::websocket::{FeedResult, Frame, FragmentAssembler, Opcode, RejectReason};
use libfuzzer_sys::fuzz_target;

const LIMIT: usize = 1024;

#[derive(Debug, Arbitrary)]
enum Kind {
    Continuation,
    Text,
    Binary,
    Ping,
}

#[derive(Debug, Arbitrary)]
struct Step {
    kind: Kind,
    fin: bool,
    payload: Vec<u8>,
}

fuzz_target!(|steps: Vec<Step>| {
    let mut assembler = FragmentAssembler::with_max_message_size(LIMIT);
    let mut expected: Option<(Opcode, Vec<u8>)> = None;

    for step in steps {
        let opcode = match step.kind {
            Kind::Continuation => Opcode::Continuation,
            Kind::Text => Opcode::Text,
            Kind::Binary => Opcode::Binary,
            Kind::Ping => Opcode::Ping,
        };
        let fin = step.fin || opcode.is_control();
        let before = assembler.context().clone();

        match assembler.feed(Frame::new(opcode, fin, step.payload.clone())) {
            FeedResult::Control(frame) => assert_eq!(frame.opcode, Opcode::Ping),
            FeedResult::Pending => {
                let (_, buf) = expected.get_or_insert_with(|| (opcode, Vec::new()));
                buf.extend_from_slice(&step.payload);
                assert!(assembler.is_in_progress());
            }
            FeedResult::Complete(message) => {
                let (first, mut buf) = expected.take().unwrap_or((opcode, Vec::new()));
                buf.extend_from_slice(&step.payload);
                assert_eq!(message.opcode, first);
                assert_eq!(&message.payload[..], &buf[..]);
                assert!(message.payload.len() <= LIMIT);
                assert!(!assembler.is_in_progress());
            }
            FeedResult::Reject(RejectReason::MessageTooLarge { size, limit }) => {
                assert!(size > limit);
                expected = None;
                assert!(!assembler.is_in_progress());
            }
            FeedResult::Reject(_) => assert_eq!(assembler.context(), &before),
        }
    }
});
