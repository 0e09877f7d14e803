//! Codec traits for framed transport.
//!
//! This module provides the `Decoder` and `Encoder` traits. The WebSocket
//! frame codec in [`crate::net::websocket`] is the built-in implementation.

pub mod decoder;
pub mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;
