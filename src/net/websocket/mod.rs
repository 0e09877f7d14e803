//! WebSocket protocol engine (RFC 6455).
//!
//! Everything between an already-upgraded byte stream and the application.
//! The HTTP upgrade handshake and TLS are the caller's responsibility.
//!
//! # Architecture
//!
//! - `frame`: Wire format encoding/decoding (RFC 6455 Section 5)
//! - `assembler`: Fragmented message reassembly (RFC 6455 Section 5.4)
//! - `close`: Close status codes and payloads (RFC 6455 Section 7)
//! - `connection`: Sans-I/O state machine (OPEN, CLOSING, CLOSED)
//! - `stream`: Buffered byte-stream adapter
//! - `websocket`: Async driver over [`AsyncRead`](crate::io::AsyncRead) +
//!   [`AsyncWrite`](crate::io::AsyncWrite)
//!
//! # Rejection policy
//!
//! With [`RejectionPolicy::Strict`] any protocol violation fails the
//! connection with the matching close status. With
//! [`RejectionPolicy::Lenient`] violations scoped to one frame (an orphaned
//! continuation, reserved bits, a bad opcode) are logged and the frame is
//! dropped; the connection stays open. Errors that leave the byte stream
//! unreadable fail the connection under either policy.
//!
//! # Example
//!
//! ```ignore
//! use hybi::net::websocket::{CloseReason, MessageHandler, Opcode, WebSocket, WebSocketConfig};
//!
//! struct Printer;
//!
//! impl MessageHandler for Printer {
//!     fn on_message(&mut self, opcode: Opcode, payload: bytes::Bytes) {
//!         println!("{opcode}: {payload:?}");
//!     }
//! }
//!
//! let mut ws = WebSocket::new(stream, Printer, WebSocketConfig::server().lenient());
//! ws.send_text("hello").await?;
//! ws.run().await?;
//! ```

mod assembler;
mod close;
mod config;
mod connection;
mod error;
mod frame;
mod stream;
mod websocket;

pub use assembler::{
    AssemblyContext, DEFAULT_MAX_MESSAGE_SIZE, FeedResult, FragmentAssembler, Message,
    RejectReason,
};
pub use close::{CloseCode, CloseReason, MAX_CLOSE_REASON_LEN};
pub use config::{ConfigError, RejectionPolicy, WebSocketConfig};
pub use connection::{
    Connection, ConnectionState, ConnectionStats, Disposition, MessageHandler,
};
pub use error::WsError;
pub use frame::{
    DEFAULT_MAX_FRAME_SIZE, Frame, FrameCodec, FrameHeader, MAX_CONTROL_PAYLOAD, Opcode, Role,
    apply_mask, encode, rsv,
};
pub use stream::{DEFAULT_READ_CHUNK, StreamAdapter};
pub use websocket::WebSocket;
