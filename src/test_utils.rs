//! Helpers for unit and integration tests.
//!
//! - [`RecordingHandler`]: a [`MessageHandler`] that records every callback
//!   and can be cloned so the test keeps a view after handing it over.
//! - [`raw_frame`]: writes arbitrary, possibly invalid, frame bytes.

use crate::net::websocket::{CloseCode, FrameHeader, MessageHandler, Opcode, WsError, apply_mask};
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::Arc;

/// One recorded callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerEvent {
    /// `on_message`.
    Message {
        /// Message opcode.
        opcode: Opcode,
        /// Message payload.
        payload: Bytes,
    },
    /// `on_close`.
    Close {
        /// Status code.
        code: CloseCode,
        /// Reason text.
        reason: String,
    },
    /// `on_error`, with the error's display form.
    Error(String),
}

/// Handler that records callbacks in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    events: Arc<Mutex<Vec<HandlerEvent>>>,
}

impl RecordingHandler {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<HandlerEvent> {
        self.events.lock().clone()
    }

    /// Messages so far.
    #[must_use]
    pub fn messages(&self) -> Vec<(Opcode, Bytes)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                HandlerEvent::Message { opcode, payload } => Some((*opcode, payload.clone())),
                _ => None,
            })
            .collect()
    }

    /// TEXT messages so far, lossily decoded.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(opcode, _)| *opcode == Opcode::Text)
            .map(|(_, payload)| String::from_utf8_lossy(&payload).into_owned())
            .collect()
    }

    /// Close notifications so far.
    #[must_use]
    pub fn closes(&self) -> Vec<(CloseCode, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                HandlerEvent::Close { code, reason } => Some((*code, reason.clone())),
                _ => None,
            })
            .collect()
    }

    /// Errors so far.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                HandlerEvent::Error(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }
}

impl MessageHandler for RecordingHandler {
    fn on_message(&mut self, opcode: Opcode, payload: Bytes) {
        self.events.lock().push(HandlerEvent::Message { opcode, payload });
    }

    fn on_close(&mut self, code: CloseCode, reason: &str) {
        self.events.lock().push(HandlerEvent::Close {
            code,
            reason: reason.to_owned(),
        });
    }

    fn on_error(&mut self, error: &WsError) {
        self.events.lock().push(HandlerEvent::Error(error.to_string()));
    }
}

/// Header fields for [`raw_frame`].
#[derive(Debug, Clone, Copy)]
pub struct RawFrame {
    /// Raw opcode nibble (may be reserved).
    pub opcode: u8,
    /// FIN bit.
    pub fin: bool,
    /// RSV1.
    pub rsv1: bool,
    /// RSV2.
    pub rsv2: bool,
    /// RSV3.
    pub rsv3: bool,
    /// Masking key.
    pub mask: Option<[u8; 4]>,
}

impl RawFrame {
    /// FIN set, no reserved bits, unmasked.
    #[must_use]
    pub const fn new(opcode: u8) -> Self {
        Self {
            opcode,
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            mask: None,
        }
    }
}

/// Write frame bytes exactly as described, without validation.
#[must_use]
pub fn raw_frame(fields: RawFrame, payload: &[u8]) -> Bytes {
    let header = FrameHeader {
        fin: fields.fin,
        rsv: (u8::from(fields.rsv1) << 2) | (u8::from(fields.rsv2) << 1) | u8::from(fields.rsv3),
        opcode: fields.opcode,
        mask: fields.mask,
        payload_len: payload.len() as u64,
    };
    let mut dst = BytesMut::with_capacity(header.encoded_len() + payload.len());
    header.write(&mut dst);
    let start = dst.len();
    dst.put_slice(payload);
    if let Some(key) = fields.mask {
        apply_mask(&mut dst[start..], key);
    }
    dst.freeze()
}
