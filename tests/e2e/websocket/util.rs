//! Shared helpers for WebSocket E2E tests.

use bytes::BytesMut;
use futures_lite::future::block_on;
use hybi::codec::Decoder;
use hybi::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use hybi::net::websocket::{Frame, FrameCodec, Opcode, WebSocket, WebSocketConfig, WsError, encode};
use hybi::test_utils::RecordingHandler;

/// Masking key the simulated client uses.
pub const CLIENT_KEY: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

pub fn init_ws_test(test_name: &str) {
    crate::common::init_test_logging();
    crate::common::test_phase!(test_name);
}

/// An engine wired to a raw peer that plays the opposite role.
pub struct Harness {
    pub ws: WebSocket<DuplexStream, RecordingHandler>,
    pub handler: RecordingHandler,
    pub peer: DuplexStream,
    peer_codec: FrameCodec,
    peer_mask: Option<[u8; 4]>,
    peer_buf: BytesMut,
}

impl Harness {
    /// Server-role engine; the peer masks with [`CLIENT_KEY`].
    pub fn server(config: WebSocketConfig) -> Self {
        Self::with_peer(config, FrameCodec::client(), Some(CLIENT_KEY))
    }

    /// Client-role engine; the peer sends unmasked frames.
    pub fn client(config: WebSocketConfig) -> Self {
        Self::with_peer(config, FrameCodec::server(), None)
    }

    fn with_peer(config: WebSocketConfig, peer_codec: FrameCodec, peer_mask: Option<[u8; 4]>) -> Self {
        let (engine_io, peer) = duplex(1 << 20);
        let handler = RecordingHandler::new();
        Self {
            ws: WebSocket::new(engine_io, handler.clone(), config),
            handler,
            peer,
            peer_codec,
            peer_mask,
            peer_buf: BytesMut::new(),
        }
    }

    /// Write raw bytes from the peer.
    pub fn peer_send_raw(&mut self, bytes: &[u8]) {
        block_on(self.peer.write_all(bytes)).expect("peer write");
    }

    /// Write one frame from the peer, masked if the peer is a client.
    pub fn peer_send(&mut self, opcode: Opcode, payload: &[u8], fin: bool) {
        let wire = encode(opcode, payload, fin, self.peer_mask);
        self.peer_send_raw(&wire);
    }

    /// Let the engine process everything the peer has written so far.
    /// Never blocks: stops when the engine's inbound pipe is empty.
    pub fn pump(&mut self) -> Result<usize, WsError> {
        let mut frames = 0;
        while self.ws.get_ref().pending_read() > 0 && !self.ws.connection().is_closed() {
            frames += block_on(self.ws.process_available())?;
        }
        Ok(frames)
    }

    /// Frames the engine has written so far.
    pub fn peer_frames(&mut self) -> Vec<Frame> {
        let pending = self.peer.pending_read();
        if pending > 0 {
            let mut raw = vec![0u8; pending];
            block_on(self.peer.read_exact(&mut raw)).expect("peer read");
            self.peer_buf.extend_from_slice(&raw);
        }
        let mut frames = Vec::new();
        while let Some(frame) = self
            .peer_codec
            .decode(&mut self.peer_buf)
            .expect("engine output must decode")
        {
            frames.push(frame);
        }
        frames
    }
}
