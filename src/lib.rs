//! Hybi: a cancel-aware RFC 6455 WebSocket frame engine.
//!
//! # Overview
//!
//! Hybi owns the part of a WebSocket implementation that sits between an
//! already-upgraded byte stream and the application: it parses and emits
//! frames, reassembles fragmented messages, and runs the connection state
//! machine (OPEN, CLOSING, CLOSED) including ping/pong and the closing
//! handshake. HTTP upgrade negotiation and TLS are left to the caller.
//!
//! # Data Flow
//!
//! ```text
//! bytes -> FrameCodec -> Frame -> FragmentAssembler -> Connection -> MessageHandler
//! ```
//!
//! # Module Structure
//!
//! - [`codec`]: `Decoder`/`Encoder` traits for framed transports
//! - [`io`]: Minimal async I/O traits, extension futures and an in-memory duplex pipe
//! - [`net`]: The WebSocket protocol ([`net::websocket`])
//! - [`util`]: Entropy sources for masking keys
//! - [`tracing_compat`]: Optional tracing integration (requires `tracing-integration` feature)
//!
//! # Example
//!
//! ```ignore
//! use hybi::net::websocket::{MessageHandler, Opcode, WebSocket, WebSocketConfig};
//!
//! struct Echo;
//!
//! impl MessageHandler for Echo {
//!     fn on_message(&mut self, opcode: Opcode, payload: bytes::Bytes) {
//!         println!("{opcode:?}: {} bytes", payload.len());
//!     }
//! }
//!
//! let mut ws = WebSocket::new(upgraded_stream, Echo, WebSocketConfig::client());
//! ws.run().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod codec;
pub mod io;
pub mod net;
pub mod tracing_compat;
pub mod util;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_logging;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

pub use net::websocket::{
    CloseCode, CloseReason, Connection, ConnectionState, Frame, FrameCodec, Message,
    MessageHandler, Opcode, RejectionPolicy, Role, WebSocket, WebSocketConfig, WsError,
};
