//! Close status codes and close frame payloads (RFC 6455 Section 7).

use super::error::WsError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Longest reason that fits a control frame after the 2-byte status code.
pub const MAX_CLOSE_REASON_LEN: usize = 123;

/// Close status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000: normal closure.
    Normal,
    /// 1001: endpoint going away.
    GoingAway,
    /// 1002: protocol error.
    ProtocolError,
    /// 1003: unsupported data type.
    Unsupported,
    /// 1005: no status code present. Never sent on the wire.
    NoStatus,
    /// 1006: closed without a close frame. Never sent on the wire.
    Abnormal,
    /// 1007: payload inconsistent with message type (e.g. bad UTF-8).
    InvalidPayload,
    /// 1008: policy violation.
    PolicyViolation,
    /// 1009: message too big to process.
    MessageTooBig,
    /// 1010: client expected an extension the server did not negotiate.
    MandatoryExtension,
    /// 1011: unexpected server condition.
    InternalError,
    /// 1012: service restart.
    ServiceRestart,
    /// 1013: try again later.
    TryAgainLater,
    /// 1014: bad gateway.
    BadGateway,
    /// 1015: TLS handshake failure. Never sent on the wire.
    TlsHandshake,
    /// Any other code, including the 3000-4999 registered/private ranges.
    Other(u16),
}

impl CloseCode {
    /// Map a raw status code.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1002 => Self::ProtocolError,
            1003 => Self::Unsupported,
            1005 => Self::NoStatus,
            1006 => Self::Abnormal,
            1007 => Self::InvalidPayload,
            1008 => Self::PolicyViolation,
            1009 => Self::MessageTooBig,
            1010 => Self::MandatoryExtension,
            1011 => Self::InternalError,
            1012 => Self::ServiceRestart,
            1013 => Self::TryAgainLater,
            1014 => Self::BadGateway,
            1015 => Self::TlsHandshake,
            other => Self::Other(other),
        }
    }

    /// The raw status code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::GoingAway => 1001,
            Self::ProtocolError => 1002,
            Self::Unsupported => 1003,
            Self::NoStatus => 1005,
            Self::Abnormal => 1006,
            Self::InvalidPayload => 1007,
            Self::PolicyViolation => 1008,
            Self::MessageTooBig => 1009,
            Self::MandatoryExtension => 1010,
            Self::InternalError => 1011,
            Self::ServiceRestart => 1012,
            Self::TryAgainLater => 1013,
            Self::BadGateway => 1014,
            Self::TlsHandshake => 1015,
            Self::Other(code) => code,
        }
    }

    /// Returns `true` if this code may appear in a close frame.
    #[must_use]
    pub const fn is_sendable(self) -> bool {
        match self {
            Self::NoStatus | Self::Abnormal | Self::TlsHandshake => false,
            Self::Other(code) => matches!(code, 3000..=4999),
            _ => true,
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        Self::from_u16(code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Status code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// Status code.
    pub code: CloseCode,
    /// UTF-8 reason, at most [`MAX_CLOSE_REASON_LEN`] bytes.
    pub reason: String,
}

impl CloseReason {
    /// Build a reason, truncating `reason` on a character boundary so the
    /// payload fits in a control frame.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        let mut reason = reason.into();
        if reason.len() > MAX_CLOSE_REASON_LEN {
            let mut end = MAX_CLOSE_REASON_LEN;
            while !reason.is_char_boundary(end) {
                end -= 1;
            }
            reason.truncate(end);
        }
        Self { code, reason }
    }

    /// Normal closure with no reason text.
    #[must_use]
    pub fn normal() -> Self {
        Self::new(CloseCode::Normal, "")
    }

    /// Parse a close frame payload.
    ///
    /// An empty payload is valid and yields `None` (status 1005 to the
    /// application). A single byte, an unsendable code, or a non-UTF-8
    /// reason is rejected.
    pub fn parse(payload: &[u8]) -> Result<Option<Self>, WsError> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(WsError::InvalidClosePayload("one-byte close payload")),
            _ => {
                let raw = u16::from_be_bytes([payload[0], payload[1]]);
                let code = CloseCode::from_u16(raw);
                if !code.is_sendable() {
                    return Err(WsError::InvalidCloseCode(raw));
                }
                let reason =
                    std::str::from_utf8(&payload[2..]).map_err(|_| WsError::InvalidUtf8)?;
                Ok(Some(Self {
                    code,
                    reason: reason.to_owned(),
                }))
            }
        }
    }

    /// Encode as a close frame payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + self.reason.len());
        buf.put_u16(self.code.as_u16());
        buf.put_slice(self.reason.as_bytes());
        buf.freeze()
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.reason)
        }
    }
}
