//! Async driver tying the stream adapter, codec and connection together.

use super::close::CloseReason;
use super::config::{ConfigError, WebSocketConfig};
use super::connection::{Connection, ConnectionState, MessageHandler};
use super::error::WsError;
use super::frame::FrameCodec;
use super::stream::StreamAdapter;
use crate::codec::{Decoder, Encoder};
use crate::io::{AsyncRead, AsyncWrite};
use crate::tracing_compat::{debug, trace, warn};
use crate::util::EntropySource;
use bytes::{Buf, Bytes, BytesMut};
use std::sync::Arc;
use std::time::Instant;

/// A WebSocket endpoint over an already-upgraded transport.
///
/// Inbound processing is pull-based: each [`process_available`] call reads
/// once from the transport, feeds every complete frame to the connection and
/// flushes whatever the connection queued in response (PONG, CLOSE).
///
/// Dropping any of the returned futures is safe. Bytes that were read are
/// buffered before frames are decoded, and bytes not yet accepted by the
/// transport stay in the write buffer for the next flush.
///
/// [`process_available`]: WebSocket::process_available
#[derive(Debug)]
pub struct WebSocket<IO, H> {
    stream: StreamAdapter<IO>,
    codec: FrameCodec,
    conn: Connection<H>,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl<IO, H> WebSocket<IO, H>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    H: MessageHandler,
{
    /// Wrap an upgraded transport.
    ///
    /// `config` is used as given; [`try_new`](Self::try_new) validates it
    /// first.
    #[must_use]
    pub fn new(io: IO, handler: H, config: WebSocketConfig) -> Self {
        let codec = FrameCodec::new(config.role)
            .max_frame_size(config.max_frame_size)
            .allowed_rsv_bits(config.negotiated_rsv_bits);
        let stream = StreamAdapter::new(io, config.read_buffer_size);
        Self {
            stream,
            codec,
            conn: Connection::new(config, handler),
            read_buf: BytesMut::new(),
            write_buf: BytesMut::new(),
        }
    }

    /// Validate `config`, then wrap an upgraded transport.
    pub fn try_new(io: IO, handler: H, config: WebSocketConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(io, handler, config))
    }

    /// Use a specific entropy source for outbound masking keys.
    #[must_use]
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.codec = self.codec.entropy(entropy);
        self
    }

    /// Connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    /// The state machine.
    #[must_use]
    pub fn connection(&self) -> &Connection<H> {
        &self.conn
    }

    /// The state machine, mutably.
    pub fn connection_mut(&mut self) -> &mut Connection<H> {
        &mut self.conn
    }

    /// Handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        self.conn.handler()
    }

    /// Underlying transport.
    pub fn get_ref(&self) -> &IO {
        self.stream.get_ref()
    }

    /// Split into transport and handler.
    pub fn into_parts(self) -> (IO, H) {
        (self.stream.into_inner(), self.conn.into_handler())
    }

    /// Read once from the transport and process every complete frame.
    ///
    /// Returns the number of frames decoded. End of stream or an I/O error
    /// forces the connection CLOSED without callbacks.
    pub async fn process_available(&mut self) -> Result<usize, WsError> {
        if self.conn.is_closed() {
            return Err(WsError::ConnectionClosed);
        }

        let chunk = match self.stream.read_available().await {
            Ok(chunk) => chunk,
            Err(err) => {
                self.conn.transport_closed();
                return Err(WsError::Io(err));
            }
        };
        if chunk.is_empty() {
            if let Err(err) = self.codec.decode_eof(&mut self.read_buf) {
                debug!(error = %err, "stream ended mid-frame");
            }
            self.read_buf.clear();
            self.conn.transport_closed();
            return Ok(0);
        }

        trace!(len = chunk.len(), "read");
        self.read_buf.extend_from_slice(&chunk);
        let frames = self.decode_buffered();
        self.flush().await?;
        if self.conn.is_closed() {
            self.finish().await;
        }
        Ok(frames)
    }

    fn decode_buffered(&mut self) -> usize {
        let mut frames = 0;
        while !self.conn.is_closed() {
            match self.codec.decode(&mut self.read_buf) {
                Ok(Some(frame)) => {
                    frames += 1;
                    self.conn.receive_frame(frame);
                }
                Ok(None) => break,
                Err(err) => {
                    let fatal = err.is_fatal();
                    self.conn.receive_error(err);
                    if fatal {
                        // The stream cannot be resynchronised; stop reading.
                        self.read_buf.clear();
                        self.stream_poisoned();
                        break;
                    }
                }
            }
        }
        frames
    }

    fn stream_poisoned(&mut self) {
        self.codec.reset();
        self.conn.close_after_flush();
    }

    /// Drive the connection until it is CLOSED.
    ///
    /// Returns [`WsError::CloseTimeout`] if the peer did not finish the
    /// closing handshake within the configured timeout. The deadline is
    /// checked between reads; wrap this future in a timer to bound a read
    /// that never returns.
    pub async fn run(&mut self) -> Result<(), WsError> {
        while !self.conn.is_closed() {
            if self.conn.expire_close(Instant::now()) {
                self.finish().await;
                return Err(WsError::CloseTimeout);
            }
            self.process_available().await?;
        }
        Ok(())
    }

    /// Send a TEXT message.
    pub async fn send_text(&mut self, text: &str) -> Result<(), WsError> {
        self.conn.send_text(text)?;
        self.flush().await
    }

    /// Send a BINARY message.
    pub async fn send_binary(&mut self, payload: impl Into<Bytes>) -> Result<(), WsError> {
        self.conn.send_binary(payload)?;
        self.flush().await
    }

    /// Send a PING.
    pub async fn send_ping(&mut self, payload: impl Into<Bytes>) -> Result<(), WsError> {
        self.conn.send_ping(payload)?;
        self.flush().await
    }

    /// Start the closing handshake. Call [`run`](Self::run) afterwards to
    /// wait for the peer's CLOSE.
    pub async fn close(&mut self, reason: CloseReason) -> Result<(), WsError> {
        self.conn.close(reason)?;
        self.flush().await
    }

    /// Encode and write every queued frame, then flush the transport.
    pub async fn flush(&mut self) -> Result<(), WsError> {
        while let Some(frame) = self.conn.next_frame() {
            if let Err(err) = self.codec.encode(frame, &mut self.write_buf) {
                warn!(error = %err, "outbound frame could not be encoded");
                self.write_buf.clear();
                self.conn.transport_closed();
                return Err(err);
            }
        }
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf).await {
                Ok(n) => self.write_buf.advance(n),
                Err(err) => return Err(self.write_failed(err)),
            }
        }
        if let Err(err) = self.stream.flush().await {
            return Err(self.write_failed(err));
        }
        self.conn.outbound_flushed();
        Ok(())
    }

    fn write_failed(&mut self, err: std::io::Error) -> WsError {
        debug!(error = %err, "write failed");
        self.write_buf.clear();
        self.conn.transport_closed();
        WsError::Io(err)
    }

    /// Shut the write half down once CLOSED. Errors are irrelevant here:
    /// the connection is already finished.
    async fn finish(&mut self) {
        if let Err(err) = self.stream.shutdown().await {
            trace!(error = %err, "shutdown after close failed");
        }
    }
}
