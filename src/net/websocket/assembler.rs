//! Fragmented message reassembly (RFC 6455 Section 5.4).
//!
//! | in progress | incoming          | fin | result                          |
//! |-------------|-------------------|-----|---------------------------------|
//! | no          | TEXT/BINARY       | 1   | `Complete` (single frame)       |
//! | no          | TEXT/BINARY       | 0   | `Pending`, start accumulating   |
//! | yes         | CONTINUATION      | 0   | `Pending`, append               |
//! | yes         | CONTINUATION      | 1   | `Complete`, end accumulating    |
//! | yes         | TEXT/BINARY       | any | `Reject(NewMessageWhileFragmenting)` |
//! | no          | CONTINUATION      | any | `Reject(OrphanedContinuation)`  |
//! | any         | CLOSE/PING/PONG   | 1   | `Control`, context untouched    |
//!
//! A rejected frame is dropped without disturbing the assembly context, so a
//! caller that chooses to carry on still classifies later frames correctly.

use super::close::CloseCode;
use super::frame::{Frame, Opcode};
use crate::tracing_compat::{debug, trace};
use bytes::{BufMut, Bytes, BytesMut};
use smallvec::SmallVec;
use std::fmt;

/// Default maximum reassembled message size (64 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Why a data frame was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// CONTINUATION with no unfinished message.
    OrphanedContinuation,
    /// TEXT or BINARY while a fragmented message is still open.
    NewMessageWhileFragmenting,
    /// The message would exceed the configured size limit.
    MessageTooLarge {
        /// Size the message would have reached.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },
}

impl RejectReason {
    /// Status code to close with when the policy is strict.
    #[must_use]
    pub const fn close_code(self) -> CloseCode {
        match self {
            Self::OrphanedContinuation | Self::NewMessageWhileFragmenting => {
                CloseCode::ProtocolError
            }
            Self::MessageTooLarge { .. } => CloseCode::MessageTooBig,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrphanedContinuation => f.write_str("orphaned continuation"),
            Self::NewMessageWhileFragmenting => f.write_str("new message while fragmenting"),
            Self::MessageTooLarge { size, limit } => {
                write!(f, "message of {size} bytes exceeds limit of {limit}")
            }
        }
    }
}

/// A complete application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// `Text` or `Binary`.
    pub opcode: Opcode,
    /// Concatenated payload of every fragment.
    pub payload: Bytes,
}

impl Message {
    /// TEXT message.
    #[must_use]
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: Opcode::Text,
            payload: payload.into(),
        }
    }

    /// BINARY message.
    #[must_use]
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: Opcode::Binary,
            payload: payload.into(),
        }
    }

    /// Payload as UTF-8, if this is a valid TEXT message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if self.opcode == Opcode::Text {
            std::str::from_utf8(&self.payload).ok()
        } else {
            None
        }
    }
}

/// State of the message currently being reassembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyContext {
    opcode: Option<Opcode>,
    fragments: SmallVec<[Bytes; 4]>,
    len: usize,
}

impl AssemblyContext {
    /// Returns `true` between a non-final TEXT/BINARY frame and the final
    /// CONTINUATION.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.opcode.is_some()
    }

    /// Opcode of the first fragment of the open message.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        self.opcode
    }

    /// Bytes accumulated so far.
    #[must_use]
    pub fn accumulated_len(&self) -> usize {
        self.len
    }

    /// Number of fragments accumulated so far.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    fn start(&mut self, opcode: Opcode, payload: Bytes) {
        self.opcode = Some(opcode);
        self.len = payload.len();
        self.fragments.push(payload);
    }

    fn append(&mut self, payload: Bytes) {
        self.len += payload.len();
        self.fragments.push(payload);
    }

    fn finish(&mut self) -> Option<Message> {
        let opcode = self.opcode.take()?;
        let payload = if self.fragments.len() == 1 {
            self.fragments.pop().unwrap_or_default()
        } else {
            let mut buf = BytesMut::with_capacity(self.len);
            for fragment in self.fragments.drain(..) {
                buf.put_slice(&fragment);
            }
            buf.freeze()
        };
        self.clear();
        Some(Message { opcode, payload })
    }

    fn clear(&mut self) {
        self.opcode = None;
        self.fragments.clear();
        self.len = 0;
    }
}

/// Outcome of feeding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedResult {
    /// A message is complete.
    Complete(Message),
    /// The frame was accepted; the message needs more fragments.
    Pending,
    /// The frame was dropped.
    Reject(RejectReason),
    /// Control frame, passed through for out-of-band handling.
    Control(Frame),
}

/// Reassembles fragmented data frames into messages.
#[derive(Debug)]
pub struct FragmentAssembler {
    context: AssemblyContext,
    max_message_size: usize,
}

impl FragmentAssembler {
    /// Assembler with the default message size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Assembler with a custom message size limit.
    #[must_use]
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            context: AssemblyContext::default(),
            max_message_size,
        }
    }

    /// Current assembly state.
    #[must_use]
    pub fn context(&self) -> &AssemblyContext {
        &self.context
    }

    /// Returns `true` while a fragmented message is open.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.context.in_progress()
    }

    /// Abandon any partially assembled message.
    pub fn reset(&mut self) {
        if self.context.in_progress() {
            debug!(
                fragments = self.context.fragment_count(),
                bytes = self.context.accumulated_len(),
                "abandoning partial message"
            );
        }
        self.context.clear();
    }

    /// Feed one decoded frame.
    pub fn feed(&mut self, frame: Frame) -> FeedResult {
        if frame.opcode.is_control() {
            return FeedResult::Control(frame);
        }

        let in_progress = self.context.in_progress();
        match (in_progress, frame.opcode) {
            (false, Opcode::Continuation) => self.reject(RejectReason::OrphanedContinuation),
            (true, Opcode::Text | Opcode::Binary) => {
                self.reject(RejectReason::NewMessageWhileFragmenting)
            }
            (false, opcode) => {
                let size = frame.payload.len();
                if size > self.max_message_size {
                    return self.reject(RejectReason::MessageTooLarge {
                        size,
                        limit: self.max_message_size,
                    });
                }
                if frame.fin {
                    trace!(%opcode, len = size, "single-frame message");
                    return FeedResult::Complete(Message {
                        opcode,
                        payload: frame.payload,
                    });
                }
                trace!(%opcode, len = size, "fragmented message started");
                self.context.start(opcode, frame.payload);
                FeedResult::Pending
            }
            (true, _) => {
                let size = self.context.accumulated_len().saturating_add(frame.payload.len());
                if size > self.max_message_size {
                    self.context.clear();
                    return self.reject(RejectReason::MessageTooLarge {
                        size,
                        limit: self.max_message_size,
                    });
                }
                self.context.append(frame.payload);
                if !frame.fin {
                    return FeedResult::Pending;
                }
                match self.context.finish() {
                    Some(message) => {
                        trace!(opcode = %message.opcode, len = message.payload.len(), "fragmented message complete");
                        FeedResult::Complete(message)
                    }
                    None => FeedResult::Pending,
                }
            }
        }
    }

    fn reject(&self, reason: RejectReason) -> FeedResult {
        debug!(%reason, in_progress = self.context.in_progress(), "data frame rejected");
        FeedResult::Reject(reason)
    }
}

impl Default for FragmentAssembler {
    fn default() -> Self {
        Self::new()
    }
}
