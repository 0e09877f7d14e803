//! RFC 6455 conformance checks driven through the public API.

pub mod close;
pub mod fragmentation;
pub mod framing;
