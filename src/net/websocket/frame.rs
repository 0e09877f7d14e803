//! WebSocket frame wire format (RFC 6455 Section 5).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```

use super::error::WsError;
use crate::codec::{Decoder, Encoder};
use crate::tracing_compat::{debug, trace};
use crate::util::{EntropySource, OsEntropy};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Default maximum frame payload (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Reserved bit masks, in the 3-bit `RSV1 RSV2 RSV3` layout used by
/// [`Frame::rsv_bits`] and [`WsError::ReservedBitsSet`].
pub mod rsv {
    /// RSV1 (used by permessage-deflate).
    pub const RSV1: u8 = 0b100;
    /// RSV2.
    pub const RSV2: u8 = 0b010;
    /// RSV3.
    pub const RSV3: u8 = 0b001;
}

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;
const OPCODE_MASK: u8 = 0x0f;
const LEN7_MASK: u8 = 0x7f;
const LEN16_MARKER: u8 = 126;
const LEN64_MARKER: u8 = 127;

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Continuation of a fragmented message (0x0).
    Continuation = 0x0,
    /// UTF-8 text data (0x1).
    Text = 0x1,
    /// Binary data (0x2).
    Binary = 0x2,
    /// Connection close (0x8).
    Close = 0x8,
    /// Ping (0x9).
    Ping = 0x9,
    /// Pong (0xA).
    Pong = 0xA,
}

impl Opcode {
    /// Parse the low nibble of the first header byte.
    pub fn from_u8(value: u8) -> Result<Self, WsError> {
        match value {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            other => Err(WsError::InvalidOpcode(other)),
        }
    }

    /// Wire value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// CLOSE, PING or PONG.
    #[must_use]
    pub const fn is_control(self) -> bool {
        (self as u8) & 0x08 != 0
    }

    /// TEXT or BINARY (a message start).
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::Text | Self::Binary)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = WsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Continuation => "CONTINUATION",
            Self::Text => "TEXT",
            Self::Binary => "BINARY",
            Self::Close => "CLOSE",
            Self::Ping => "PING",
            Self::Pong => "PONG",
        };
        f.write_str(name)
    }
}

/// Endpoint role. Clients mask outbound frames; servers require masked
/// inbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Connection initiator.
    Client,
    /// Connection acceptor.
    Server,
}

/// A single WebSocket frame.
///
/// Decoded frames carry the masking key they arrived with, but `payload` is
/// always the unmasked application data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment of a message.
    pub fin: bool,
    /// RSV1.
    pub rsv1: bool,
    /// RSV2.
    pub rsv2: bool,
    /// RSV3.
    pub rsv3: bool,
    /// Frame type.
    pub opcode: Opcode,
    /// Masking key, if the frame is (or will be) masked.
    pub mask: Option<[u8; 4]>,
    /// Unmasked payload.
    pub payload: Bytes,
}

impl Frame {
    /// Build an unmasked frame with reserved bits clear.
    #[must_use]
    pub fn new(opcode: Opcode, fin: bool, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Single-frame TEXT message.
    #[must_use]
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Text, true, payload)
    }

    /// Single-frame BINARY message.
    #[must_use]
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Binary, true, payload)
    }

    /// CONTINUATION fragment.
    #[must_use]
    pub fn continuation(fin: bool, payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Continuation, fin, payload)
    }

    /// PING.
    #[must_use]
    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Ping, true, payload)
    }

    /// PONG.
    #[must_use]
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Pong, true, payload)
    }

    /// CLOSE with a raw payload (see [`CloseReason::encode`](super::CloseReason::encode)).
    #[must_use]
    pub fn close(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Close, true, payload)
    }

    /// Set the masking key used when encoding.
    #[must_use]
    pub fn with_mask(mut self, key: [u8; 4]) -> Self {
        self.mask = Some(key);
        self
    }

    /// Reserved bits in `RSV1 RSV2 RSV3` order.
    #[must_use]
    pub fn rsv_bits(&self) -> u8 {
        (u8::from(self.rsv1) << 2) | (u8::from(self.rsv2) << 1) | u8::from(self.rsv3)
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if a masking key is attached.
    #[must_use]
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Returns `true` for CLOSE, PING and PONG.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }
}

/// Raw header fields as they appear on the wire.
///
/// `opcode` and `rsv` are kept as raw bits so that header bytes can be built
/// or inspected without validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// FIN bit.
    pub fin: bool,
    /// Reserved bits in `RSV1 RSV2 RSV3` order.
    pub rsv: u8,
    /// Raw opcode nibble.
    pub opcode: u8,
    /// Masking key, present iff the MASK bit is set.
    pub mask: Option<[u8; 4]>,
    /// Declared payload length.
    pub payload_len: u64,
}

impl FrameHeader {
    /// Parse a header from the front of `src` without consuming it.
    ///
    /// Returns the header and its encoded length, or `None` if `src` does not
    /// yet hold the complete header.
    #[must_use]
    pub fn parse(src: &[u8]) -> Option<(Self, usize)> {
        if src.len() < 2 {
            return None;
        }
        let b0 = src[0];
        let b1 = src[1];
        let (payload_len, mut len) = match b1 & LEN7_MASK {
            LEN16_MARKER => {
                let ext = src.get(2..4)?;
                (u64::from(u16::from_be_bytes([ext[0], ext[1]])), 4)
            }
            LEN64_MARKER => {
                let ext = src.get(2..10)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(ext);
                (u64::from_be_bytes(raw), 10)
            }
            short => (u64::from(short), 2),
        };
        let mask = if b1 & MASK_BIT == 0 {
            None
        } else {
            let key = src.get(len..len + 4)?;
            len += 4;
            Some([key[0], key[1], key[2], key[3]])
        };
        Some((
            Self {
                fin: b0 & FIN_BIT != 0,
                rsv: (b0 >> 4) & 0b111,
                opcode: b0 & OPCODE_MASK,
                mask,
                payload_len,
            },
            len,
        ))
    }

    /// Encoded header length for this payload length and mask.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        let base = match self.payload_len {
            0..=125 => 2,
            126..=0xffff => 4,
            _ => 10,
        };
        if self.mask.is_some() { base + 4 } else { base }
    }

    /// Write the header using the minimal length encoding.
    pub fn write(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        let fin = if self.fin { FIN_BIT } else { 0 };
        dst.put_u8(fin | ((self.rsv & 0b111) << 4) | (self.opcode & OPCODE_MASK));
        let mask_bit = if self.mask.is_some() { MASK_BIT } else { 0 };
        match self.payload_len {
            len @ 0..=125 => dst.put_u8(mask_bit | len as u8),
            len @ 126..=0xffff => {
                dst.put_u8(mask_bit | LEN16_MARKER);
                dst.put_u16(len as u16);
            }
            len => {
                dst.put_u8(mask_bit | LEN64_MARKER);
                dst.put_u64(len);
            }
        }
        if let Some(key) = self.mask {
            dst.put_slice(&key);
        }
    }
}

/// XOR `buf` with the 4-byte masking key, cycling from key index 0.
///
/// Masking is an involution: applying the same key twice restores the input.
pub fn apply_mask(buf: &mut [u8], key: [u8; 4]) {
    let word = u32::from_ne_bytes(key);
    let mut chunks = buf.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let value = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ word;
        chunk.copy_from_slice(&value.to_ne_bytes());
    }
    for (byte, k) in chunks.into_remainder().iter_mut().zip(key) {
        *byte ^= k;
    }
}

/// Build the wire bytes of one frame.
///
/// Performs no validation, so it can produce frames a conforming endpoint
/// must reject (fragmented control frames, orphaned continuations).
#[must_use]
pub fn encode(opcode: Opcode, payload: &[u8], fin: bool, mask: Option<[u8; 4]>) -> Bytes {
    let header = FrameHeader {
        fin,
        rsv: 0,
        opcode: opcode.as_u8(),
        mask,
        payload_len: payload.len() as u64,
    };
    let mut dst = BytesMut::with_capacity(header.encoded_len() + payload.len());
    write_frame(&header, payload, &mut dst);
    dst.freeze()
}

fn write_frame(header: &FrameHeader, payload: &[u8], dst: &mut BytesMut) {
    header.write(dst);
    let start = dst.len();
    dst.put_slice(payload);
    if let Some(key) = header.mask {
        apply_mask(&mut dst[start..], key);
    }
}

/// Bytes still to be skipped after a recoverable header violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discard {
    Idle,
    /// The header of the bad frame has not fully arrived yet.
    Header,
    /// Payload bytes of the bad frame still to skip.
    Payload(u64),
}

/// Frame codec for one endpoint.
///
/// Decoding validates every header rule that can be checked without message
/// context: reserved bits, opcode, control-frame FIN and size, minimal length
/// encoding, the frame size limit and the role's masking rule. After a
/// non-fatal error the codec skips the rest of the offending frame, including
/// payload bytes that have not arrived yet, so the next `decode` starts on a
/// frame boundary.
pub struct FrameCodec {
    role: Role,
    max_frame_size: usize,
    allowed_rsv: u8,
    discard: Discard,
    entropy: Arc<dyn EntropySource>,
}

impl FrameCodec {
    /// Codec for the given role with default limits and OS entropy.
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            allowed_rsv: 0,
            discard: Discard::Idle,
            entropy: Arc::new(OsEntropy),
        }
    }

    /// Client-side codec: masks outbound, rejects masked inbound.
    #[must_use]
    pub fn client() -> Self {
        Self::new(Role::Client)
    }

    /// Server-side codec: never masks outbound, rejects unmasked inbound.
    #[must_use]
    pub fn server() -> Self {
        Self::new(Role::Server)
    }

    /// Set the maximum accepted payload length.
    #[must_use]
    pub fn max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Permit reserved bits that a negotiated extension defines.
    #[must_use]
    pub fn allowed_rsv_bits(mut self, bits: u8) -> Self {
        self.allowed_rsv = bits & 0b111;
        self
    }

    /// Use a specific entropy source for masking keys.
    #[must_use]
    pub fn entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    /// This codec's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns `true` while the codec is skipping a rejected frame.
    #[must_use]
    pub fn is_discarding(&self) -> bool {
        self.discard != Discard::Idle
    }

    /// Drop any pending discard state.
    pub fn reset(&mut self) {
        self.discard = Discard::Idle;
    }

    /// Skip discarded bytes. Returns `true` once the stream is back on a
    /// frame boundary.
    ///
    /// A rejected frame is skipped whatever its declared length: skipping
    /// buffers nothing, so `max_frame_size` does not apply. A length with
    /// the most significant bit set cannot be skipped and is fatal.
    fn skip_discarded(&mut self, src: &mut BytesMut) -> Result<bool, WsError> {
        loop {
            match self.discard {
                Discard::Idle => return Ok(true),
                Discard::Header => {
                    let Some((header, header_len)) = FrameHeader::parse(src) else {
                        return Ok(false);
                    };
                    if header.payload_len >> 63 != 0 {
                        debug!(len = header.payload_len, "rejected frame has unskippable length");
                        return Err(WsError::LengthOverflow(header.payload_len));
                    }
                    src.advance(header_len);
                    self.discard = Discard::Payload(header.payload_len);
                }
                Discard::Payload(remaining) => {
                    let n = remaining.min(src.len() as u64);
                    src.advance(n as usize);
                    let left = remaining - n;
                    if left == 0 {
                        self.discard = Discard::Idle;
                        return Ok(true);
                    }
                    self.discard = Discard::Payload(left);
                    return Ok(false);
                }
            }
        }
    }

    /// Checks that need only the first two header bytes.
    fn check_leading(&self, b0: u8, b1: u8) -> Result<(), WsError> {
        let rsv = (b0 >> 4) & 0b111;
        if rsv & !self.allowed_rsv != 0 {
            return Err(WsError::ReservedBitsSet(rsv));
        }
        let opcode = Opcode::from_u8(b0 & OPCODE_MASK)?;
        if opcode.is_control() && b0 & FIN_BIT == 0 {
            return Err(WsError::FragmentedControlFrame);
        }
        let masked = b1 & MASK_BIT != 0;
        match self.role {
            Role::Server if !masked => Err(WsError::UnmaskedFrame),
            Role::Client if masked => Err(WsError::MaskedFrame),
            _ => Ok(()),
        }
    }

    /// Checks that need the full declared length.
    fn check_length(&self, b0: u8, header: &FrameHeader, header_len: usize) -> Result<(), WsError> {
        let len = header.payload_len;
        if len >> 63 != 0 {
            return Err(WsError::LengthOverflow(len));
        }
        let ext_len = header_len - 2 - if header.mask.is_some() { 4 } else { 0 };
        let minimal = match ext_len {
            2 => len >= 126,
            8 => len > 0xffff,
            _ => true,
        };
        if !minimal {
            return Err(WsError::NonMinimalLength(len));
        }
        if (b0 & 0x08) != 0 && len > MAX_CONTROL_PAYLOAD as u64 {
            return Err(WsError::ControlFrameTooLarge(len));
        }
        if len > self.max_frame_size as u64 {
            return Err(WsError::FrameTooLarge {
                size: len,
                limit: self.max_frame_size,
            });
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::server()
    }
}

impl fmt::Debug for FrameCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCodec")
            .field("role", &self.role)
            .field("max_frame_size", &self.max_frame_size)
            .field("allowed_rsv", &self.allowed_rsv)
            .field("discard", &self.discard)
            .field("entropy", &self.entropy.source_id())
            .finish()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = WsError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, WsError> {
        if !self.skip_discarded(src)? || src.len() < 2 {
            return Ok(None);
        }
        let b0 = src[0];
        let b1 = src[1];

        if let Err(err) = self.check_leading(b0, b1) {
            debug!(error = %err, "rejecting frame header");
            self.discard = Discard::Header;
            self.skip_discarded(src)?;
            return Err(err);
        }

        let Some((header, header_len)) = FrameHeader::parse(src) else {
            return Ok(None);
        };

        if let Err(err) = self.check_length(b0, &header, header_len) {
            debug!(error = %err, "rejecting frame length");
            if !err.is_fatal() {
                src.advance(header_len);
                self.discard = Discard::Payload(header.payload_len);
                self.skip_discarded(src)?;
            }
            return Err(err);
        }

        // Bounded by max_frame_size above.
        let payload_len = header.payload_len as usize;
        let total = header_len + payload_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(header_len);
        let mut payload = src.split_to(payload_len);
        if let Some(key) = header.mask {
            apply_mask(&mut payload, key);
        }

        let opcode = Opcode::from_u8(header.opcode)?;
        trace!(%opcode, fin = header.fin, len = payload_len, "frame decoded");
        Ok(Some(Frame {
            fin: header.fin,
            rsv1: header.rsv & rsv::RSV1 != 0,
            rsv2: header.rsv & rsv::RSV2 != 0,
            rsv3: header.rsv & rsv::RSV3 != 0,
            opcode,
            mask: header.mask,
            payload: payload.freeze(),
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, WsError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() && !self.is_discarding() => Ok(None),
            None => Err(WsError::TruncatedFrame(src.len())),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = WsError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), WsError> {
        if frame.opcode.is_control() {
            if !frame.fin {
                return Err(WsError::FragmentedControlFrame);
            }
            if frame.payload.len() > MAX_CONTROL_PAYLOAD {
                return Err(WsError::ControlFrameTooLarge(frame.payload.len() as u64));
            }
        }
        let rsv = frame.rsv_bits();
        if rsv & !self.allowed_rsv != 0 {
            return Err(WsError::ReservedBitsSet(rsv));
        }

        let mask = match self.role {
            Role::Client => match frame.mask {
                Some(key) => Some(key),
                None => Some(self.entropy.mask_key()?),
            },
            Role::Server => None,
        };
        let header = FrameHeader {
            fin: frame.fin,
            rsv,
            opcode: frame.opcode.as_u8(),
            mask,
            payload_len: frame.payload.len() as u64,
        };
        write_frame(&header, &frame.payload, dst);
        trace!(opcode = %frame.opcode, fin = frame.fin, len = frame.payload.len(), "frame encoded");
        Ok(())
    }
}
