//! Networking protocols.

pub mod websocket;
