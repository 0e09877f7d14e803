//! Connection state machine.
//!
//! [`Connection`] is the sans-I/O core of an endpoint. Decoded frames go in
//! through [`Connection::receive_frame`] and codec failures through
//! [`Connection::receive_error`]; frames to transmit come out of
//! [`Connection::next_frame`]. Complete messages, close notifications and
//! failures are delivered to the [`MessageHandler`].
//!
//! ```text
//!          recv CLOSE / close() / strict violation
//!   OPEN ─────────────────────────────────────────▶ CLOSING
//!                                                     │ handshake done and flushed,
//!                                                     │ close timeout, or transport gone
//!                                                     ▼
//!                                                   CLOSED
//! ```
//!
//! Only OPEN dispatches. In CLOSING a peer CLOSE completes the handshake and
//! everything else is discarded; CLOSED discards everything.

use super::assembler::{FeedResult, FragmentAssembler, Message};
use super::close::{CloseCode, CloseReason};
use super::config::{ConfigError, RejectionPolicy, WebSocketConfig};
use super::error::WsError;
use super::frame::{Frame, MAX_CONTROL_PAYLOAD, Opcode};
use crate::tracing_compat::{debug, info, trace, warn};
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Instant;

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Messages flow in both directions.
    Open,
    /// A CLOSE has been sent or received; waiting for the handshake to end.
    Closing,
    /// Terminal.
    Closed,
}

/// Application callbacks.
///
/// Callbacks run on the thread processing the connection, in frame order.
pub trait MessageHandler {
    /// A complete TEXT or BINARY message arrived.
    fn on_message(&mut self, opcode: Opcode, payload: Bytes);

    /// The peer sent CLOSE. `code` is [`CloseCode::NoStatus`] when the frame
    /// carried no status.
    fn on_close(&mut self, code: CloseCode, reason: &str) {
        let _ = (code, reason);
    }

    /// The connection is being failed because of `error`.
    fn on_error(&mut self, error: &WsError) {
        let _ = error;
    }
}

impl<H: MessageHandler + ?Sized> MessageHandler for &mut H {
    fn on_message(&mut self, opcode: Opcode, payload: Bytes) {
        (**self).on_message(opcode, payload);
    }

    fn on_close(&mut self, code: CloseCode, reason: &str) {
        (**self).on_close(code, reason);
    }

    fn on_error(&mut self, error: &WsError) {
        (**self).on_error(error);
    }
}

impl<H: MessageHandler + ?Sized> MessageHandler for Box<H> {
    fn on_message(&mut self, opcode: Opcode, payload: Bytes) {
        (**self).on_message(opcode, payload);
    }

    fn on_close(&mut self, code: CloseCode, reason: &str) {
        (**self).on_close(code, reason);
    }

    fn on_error(&mut self, error: &WsError) {
        (**self).on_error(error);
    }
}

/// What happened to an inbound frame or error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Accepted: a fragment was buffered or a control frame was handled.
    Accepted,
    /// A complete message was handed to the handler.
    Dispatched,
    /// Dropped under the lenient policy; the connection stays open.
    Rejected,
    /// The connection was failed and a CLOSE queued (or the transport is
    /// unusable).
    Failed,
    /// Received while CLOSING or CLOSED and dropped silently.
    Discarded,
}

/// Per-connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Frames passed to `receive_frame`.
    pub frames_received: u64,
    /// Messages handed to `on_message`.
    pub messages_dispatched: u64,
    /// Frames or codec errors rejected as protocol violations.
    pub frames_rejected: u64,
    /// Frames discarded because the connection was closing or closed.
    pub frames_discarded: u64,
    /// PINGs answered with PONG.
    pub pongs_sent: u64,
}

/// Connection state machine for one endpoint.
#[derive(Debug)]
pub struct Connection<H> {
    config: WebSocketConfig,
    state: ConnectionState,
    assembler: FragmentAssembler,
    handler: H,
    outbound: VecDeque<Frame>,
    close_sent: bool,
    close_received: Option<CloseReason>,
    close_deadline: Option<Instant>,
    abandon_on_flush: bool,
    stats: ConnectionStats,
}

impl<H: MessageHandler> Connection<H> {
    /// New OPEN connection.
    ///
    /// `config` is used as given. Use [`try_new`](Self::try_new) for
    /// configurations that have not been through
    /// [`WebSocketConfig::validate`].
    #[must_use]
    pub fn new(config: WebSocketConfig, handler: H) -> Self {
        let assembler = FragmentAssembler::with_max_message_size(config.max_message_size);
        Self {
            config,
            state: ConnectionState::Open,
            assembler,
            handler,
            outbound: VecDeque::new(),
            close_sent: false,
            close_received: None,
            close_deadline: None,
            abandon_on_flush: false,
            stats: ConnectionStats::default(),
        }
    }

    /// Validate `config`, then build an OPEN connection.
    pub fn try_new(config: WebSocketConfig, handler: H) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config, handler))
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns `true` while the connection is OPEN.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Returns `true` once the connection is CLOSED.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// Fragment assembler state.
    #[must_use]
    pub fn assembler(&self) -> &FragmentAssembler {
        &self.assembler
    }

    /// The CLOSE the peer sent, if any. An empty close payload is reported
    /// as [`CloseCode::NoStatus`].
    #[must_use]
    pub fn peer_close(&self) -> Option<&CloseReason> {
        self.close_received.as_ref()
    }

    /// When the close handshake times out, if one is running.
    #[must_use]
    pub fn close_deadline(&self) -> Option<Instant> {
        self.close_deadline
    }

    /// Handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consume the connection, returning the handler.
    pub fn into_handler(self) -> H {
        self.handler
    }

    // ── Outbound ────────────────────────────────────────────────────────

    /// Queue a TEXT message.
    pub fn send_text(&mut self, text: &str) -> Result<(), WsError> {
        self.ensure_open()?;
        self.queue_message(Opcode::Text, Bytes::copy_from_slice(text.as_bytes()));
        Ok(())
    }

    /// Queue a BINARY message.
    pub fn send_binary(&mut self, payload: impl Into<Bytes>) -> Result<(), WsError> {
        self.ensure_open()?;
        self.queue_message(Opcode::Binary, payload.into());
        Ok(())
    }

    /// Queue a PING.
    pub fn send_ping(&mut self, payload: impl Into<Bytes>) -> Result<(), WsError> {
        self.ensure_open()?;
        let payload = payload.into();
        if payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(WsError::ControlFrameTooLarge(payload.len() as u64));
        }
        self.outbound.push_back(Frame::ping(payload));
        Ok(())
    }

    /// Start the closing handshake.
    pub fn close(&mut self, reason: CloseReason) -> Result<(), WsError> {
        self.ensure_open()?;
        if !reason.code.is_sendable() {
            return Err(WsError::InvalidCloseCode(reason.code.as_u16()));
        }
        info!(%reason, "closing connection");
        self.assembler.reset();
        self.queue_close(&reason);
        Ok(())
    }

    /// Next frame to transmit.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.outbound.pop_front()
    }

    /// Returns `true` if frames are waiting to be transmitted.
    #[must_use]
    pub fn has_pending_frames(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Report that every frame taken from [`next_frame`](Self::next_frame)
    /// has been written and flushed.
    pub fn outbound_flushed(&mut self) {
        self.maybe_finish_close();
    }

    /// Stop waiting for the peer's CLOSE: the connection goes CLOSED as soon
    /// as the queued output has been flushed. Used when the inbound stream
    /// can no longer be decoded.
    pub fn close_after_flush(&mut self) {
        self.abandon_on_flush = true;
        if self.state == ConnectionState::Open {
            self.assembler.reset();
            self.queue_close(&CloseReason::new(CloseCode::ProtocolError, ""));
        }
    }

    // ── Inbound ─────────────────────────────────────────────────────────

    /// Process one decoded frame.
    pub fn receive_frame(&mut self, frame: Frame) -> Disposition {
        self.stats.frames_received += 1;
        match self.state {
            ConnectionState::Closed => self.discard(&frame),
            ConnectionState::Closing => {
                if frame.opcode == Opcode::Close && self.close_received.is_none() {
                    self.receive_close(&frame.payload)
                } else {
                    self.discard(&frame)
                }
            }
            ConnectionState::Open => match self.assembler.feed(frame) {
                FeedResult::Complete(message) => self.dispatch(message),
                FeedResult::Pending => Disposition::Accepted,
                FeedResult::Reject(reason) => self.violation(WsError::Protocol(reason)),
                FeedResult::Control(frame) => self.receive_control(frame),
            },
        }
    }

    /// Process a decode failure.
    ///
    /// Errors without a peer-visible status (I/O, truncation) leave nothing
    /// to send, so the connection goes straight to CLOSED after `on_error`.
    pub fn receive_error(&mut self, error: WsError) -> Disposition {
        if self.state == ConnectionState::Closed {
            return Disposition::Discarded;
        }
        if !error.is_protocol_violation() {
            warn!(%error, "transport failure");
            self.handler.on_error(&error);
            self.force_closed();
            return Disposition::Failed;
        }
        if self.state == ConnectionState::Closing {
            self.stats.frames_discarded += 1;
            debug!(%error, "ignoring codec error while closing");
            return Disposition::Discarded;
        }
        self.violation(error)
    }

    /// Force CLOSED if the close handshake has outlived its deadline.
    ///
    /// Returns `true` if the connection was closed by this call.
    pub fn expire_close(&mut self, now: Instant) -> bool {
        match self.close_deadline {
            Some(deadline) if self.state == ConnectionState::Closing && now >= deadline => {
                warn!("close handshake timed out");
                self.force_closed();
                true
            }
            _ => false,
        }
    }

    /// The transport is gone (EOF, reset, or the owning task was cancelled).
    ///
    /// Forces CLOSED, drops any partial message and queued output, and
    /// invokes no callback.
    pub fn transport_closed(&mut self) {
        if self.state != ConnectionState::Closed {
            debug!(state = ?self.state, partial = self.assembler.is_in_progress(), "transport closed");
        }
        self.force_closed();
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn ensure_open(&self) -> Result<(), WsError> {
        if self.state == ConnectionState::Open {
            Ok(())
        } else {
            Err(WsError::ConnectionClosed)
        }
    }

    fn queue_message(&mut self, opcode: Opcode, payload: Bytes) {
        match self.config.fragment_size {
            Some(size) if size > 0 && payload.len() > size => {
                let mut rest = payload;
                let mut frame_opcode = opcode;
                while !rest.is_empty() {
                    let chunk = rest.split_to(size.min(rest.len()));
                    self.outbound
                        .push_back(Frame::new(frame_opcode, rest.is_empty(), chunk));
                    frame_opcode = Opcode::Continuation;
                }
            }
            _ => self.outbound.push_back(Frame::new(opcode, true, payload)),
        }
    }

    fn queue_close(&mut self, reason: &CloseReason) {
        self.outbound.push_back(Frame::close(reason.encode()));
        self.enter_closing();
    }

    fn enter_closing(&mut self) {
        self.close_sent = true;
        self.state = ConnectionState::Closing;
        self.close_deadline = Some(Instant::now() + self.config.close_timeout);
        trace!("state -> CLOSING");
    }

    fn maybe_finish_close(&mut self) {
        if self.state == ConnectionState::Closing
            && self.close_sent
            && (self.close_received.is_some() || self.abandon_on_flush)
            && self.outbound.is_empty()
        {
            info!("close handshake complete");
            self.state = ConnectionState::Closed;
            self.close_deadline = None;
        }
    }

    fn force_closed(&mut self) {
        self.assembler.reset();
        self.outbound.clear();
        self.close_deadline = None;
        self.state = ConnectionState::Closed;
    }

    fn discard(&mut self, frame: &Frame) -> Disposition {
        self.stats.frames_discarded += 1;
        debug!(state = ?self.state, opcode = %frame.opcode, len = frame.payload.len(), "discarding frame after close");
        Disposition::Discarded
    }

    fn dispatch(&mut self, message: Message) -> Disposition {
        if message.opcode == Opcode::Text
            && self.config.validate_utf8
            && std::str::from_utf8(&message.payload).is_err()
        {
            return self.violation(WsError::InvalidUtf8);
        }
        self.stats.messages_dispatched += 1;
        self.handler.on_message(message.opcode, message.payload);
        Disposition::Dispatched
    }

    fn receive_control(&mut self, frame: Frame) -> Disposition {
        match frame.opcode {
            Opcode::Ping => {
                if self.config.auto_pong {
                    self.outbound.push_back(Frame::pong(frame.payload));
                    self.stats.pongs_sent += 1;
                }
                Disposition::Accepted
            }
            Opcode::Close => self.receive_close(&frame.payload),
            _ => {
                trace!(len = frame.payload.len(), "pong received");
                Disposition::Accepted
            }
        }
    }

    fn receive_close(&mut self, payload: &[u8]) -> Disposition {
        let parsed = match CloseReason::parse(payload) {
            Ok(parsed) => parsed,
            Err(error) => {
                // A malformed CLOSE still ends the conversation.
                self.stats.frames_rejected += 1;
                self.handler.on_error(&error);
                self.close_received = Some(CloseReason::new(CloseCode::NoStatus, ""));
                if !self.close_sent {
                    self.assembler.reset();
                    self.queue_close(&CloseReason::new(error.close_code(), ""));
                }
                self.maybe_finish_close();
                return Disposition::Failed;
            }
        };

        let reason = parsed.unwrap_or_else(|| CloseReason::new(CloseCode::NoStatus, ""));
        info!(%reason, "peer sent CLOSE");
        self.handler.on_close(reason.code, &reason.reason);
        if !self.close_sent {
            self.assembler.reset();
            let echo = if reason.code == CloseCode::NoStatus {
                CloseReason::new(CloseCode::Normal, "")
            } else {
                CloseReason::new(reason.code, "")
            };
            self.queue_close(&echo);
        }
        self.close_received = Some(reason);
        self.maybe_finish_close();
        Disposition::Accepted
    }

    fn violation(&mut self, error: WsError) -> Disposition {
        self.stats.frames_rejected += 1;
        if self.config.policy == RejectionPolicy::Lenient && !error.is_fatal() {
            warn!(%error, "discarding frame (lenient)");
            return Disposition::Rejected;
        }
        warn!(%error, code = %error.close_code(), "failing connection");
        self.handler.on_error(&error);
        self.assembler.reset();
        let code = error.close_code();
        let code = if code.is_sendable() {
            code
        } else {
            CloseCode::ProtocolError
        };
        self.queue_close(&CloseReason::new(code, ""));
        Disposition::Failed
    }
}
