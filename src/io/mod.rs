//! Async I/O traits and adapters.
//!
//! This module provides minimal `AsyncRead`/`AsyncWrite` traits, a safe
//! `ReadBuf` type, extension futures, and an in-memory [`duplex`] pipe. The
//! design mirrors `std::io` and `futures::io` but is intentionally small and
//! cancel-aware: the frame engine only needs ordered, reliable byte delivery.
//!
//! # Cancel Safety
//!
//! - `poll_read` is cancel-safe (partial data is discarded by the caller).
//! - `read` is cancel-safe (nothing is consumed until it resolves).
//! - `read_exact` and `write_all` are **not** cancel-safe (partial state is retained).

mod duplex;
pub mod ext;
mod read;
mod read_buf;
mod write;

pub use duplex::{DuplexStream, duplex};
pub use ext::{AsyncReadExt, AsyncWriteExt, Flush, Read, ReadExact, Shutdown, WriteAll};
pub use read::AsyncRead;
pub use read_buf::ReadBuf;
pub use write::AsyncWrite;
