//! WebSocket error types.

use super::assembler::RejectReason;
use super::close::CloseCode;
use std::io;
use thiserror::Error;

/// Errors produced by the frame codec, the assembler (in strict mode) and
/// the connection.
#[derive(Debug, Error)]
pub enum WsError {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Opcode outside the six defined by RFC 6455.
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// RSV1-3 set without a negotiated extension that defines them.
    #[error("reserved bits {0:#05b} set without negotiated extension")]
    ReservedBitsSet(u8),

    /// Control frame with FIN cleared.
    #[error("fragmented control frame")]
    FragmentedControlFrame,

    /// Control frame payload longer than 125 bytes.
    #[error("control frame payload too large: {0} bytes")]
    ControlFrameTooLarge(u64),

    /// Extended length field used where a shorter encoding fits.
    #[error("non-minimal payload length encoding for {0} bytes")]
    NonMinimalLength(u64),

    /// 64-bit length with the most significant bit set.
    #[error("payload length {0:#x} has most significant bit set")]
    LengthOverflow(u64),

    /// Frame payload exceeds the configured limit.
    #[error("frame payload of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge {
        /// Declared payload length.
        size: u64,
        /// Configured maximum.
        limit: usize,
    },

    /// A server received a frame without a masking key.
    #[error("unmasked frame from client")]
    UnmaskedFrame,

    /// A client received a frame with a masking key.
    #[error("masked frame from server")]
    MaskedFrame,

    /// The stream ended in the middle of a frame.
    #[error("truncated frame: {0} bytes buffered at EOF")]
    TruncatedFrame(usize),

    /// Fragmentation state machine violation.
    #[error("protocol violation: {0}")]
    Protocol(RejectReason),

    /// TEXT message or close reason that is not valid UTF-8.
    #[error("invalid UTF-8 in text payload")]
    InvalidUtf8,

    /// Close frame payload with a single byte, or otherwise unparseable.
    #[error("invalid close payload: {0}")]
    InvalidClosePayload(&'static str),

    /// Close status code that may not appear on the wire.
    #[error("invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Operation attempted after the connection left the OPEN state.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer did not answer our CLOSE before the deadline.
    #[error("close handshake timed out")]
    CloseTimeout,
}

impl WsError {
    /// Status code to send when this error fails the connection.
    #[must_use]
    pub fn close_code(&self) -> CloseCode {
        match self {
            Self::Io(_) | Self::ConnectionClosed | Self::TruncatedFrame(_) | Self::CloseTimeout => {
                CloseCode::Abnormal
            }
            Self::InvalidUtf8 => CloseCode::InvalidPayload,
            Self::FrameTooLarge { .. } => CloseCode::MessageTooBig,
            Self::Protocol(reason) => reason.close_code(),
            Self::InvalidOpcode(_)
            | Self::ReservedBitsSet(_)
            | Self::FragmentedControlFrame
            | Self::ControlFrameTooLarge(_)
            | Self::NonMinimalLength(_)
            | Self::LengthOverflow(_)
            | Self::UnmaskedFrame
            | Self::MaskedFrame
            | Self::InvalidClosePayload(_)
            | Self::InvalidCloseCode(_) => CloseCode::ProtocolError,
        }
    }

    /// Returns `true` if the byte stream cannot continue after this error.
    ///
    /// Non-fatal errors are scoped to a single frame or message: the codec
    /// has already skipped the offending bytes, so a lenient connection may
    /// discard and carry on.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::LengthOverflow(_)
                | Self::TruncatedFrame(_)
                | Self::ConnectionClosed
                | Self::CloseTimeout
        )
    }

    /// Returns `true` if this error is a violation by the peer.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        self.close_code() != CloseCode::Abnormal
    }
}
