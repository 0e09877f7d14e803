//! Extension traits and future adapters for async I/O.

mod read_ext;
mod write_ext;

pub use read_ext::{AsyncReadExt, Read, ReadExact};
pub use write_ext::{AsyncWriteExt, Flush, Shutdown, WriteAll};
