//! Buffered byte-stream adapter over an upgraded transport.
//!
//! The engine assumes an ordered, reliable byte stream. This adapter only
//! moves bytes: every future it returns is cancel-safe in the sense that
//! dropping it loses no data that was not already handed back to the caller.

use crate::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use bytes::{Bytes, BytesMut};
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::Poll;

/// Default bytes requested per read.
pub const DEFAULT_READ_CHUNK: usize = 8 * 1024;

/// Stream I/O adapter.
#[derive(Debug)]
pub struct StreamAdapter<IO> {
    io: IO,
    chunk: usize,
    eof: bool,
}

impl<IO> StreamAdapter<IO> {
    /// Wrap a transport, reading up to `chunk` bytes at a time.
    #[must_use]
    pub fn new(io: IO, chunk: usize) -> Self {
        Self {
            io,
            chunk: chunk.max(1),
            eof: false,
        }
    }

    /// Returns `true` once a read has observed end of stream.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Underlying transport.
    pub fn get_ref(&self) -> &IO {
        &self.io
    }

    /// Underlying transport, mutably.
    pub fn get_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    /// Unwrap the transport.
    pub fn into_inner(self) -> IO {
        self.io
    }
}

impl<IO: AsyncRead + Unpin> StreamAdapter<IO> {
    /// Read whatever the transport has, waiting until at least one byte is
    /// available. An empty result means end of stream.
    pub async fn read_available(&mut self) -> io::Result<Bytes> {
        if self.eof {
            return Ok(Bytes::new());
        }
        let mut buf = BytesMut::zeroed(self.chunk);
        let io = &mut self.io;
        let n = poll_fn(|cx| {
            let mut read_buf = ReadBuf::new(&mut buf);
            match Pin::new(&mut *io).poll_read(cx, &mut read_buf) {
                Poll::Ready(Ok(())) => Poll::Ready(Ok(read_buf.filled().len())),
                Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
                Poll::Pending => Poll::Pending,
            }
        })
        .await?;
        if n == 0 {
            self.eof = true;
        }
        buf.truncate(n);
        Ok(buf.freeze())
    }
}

impl<IO: AsyncWrite + Unpin> StreamAdapter<IO> {
    /// Write some prefix of `bytes`, returning how many were accepted.
    pub async fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let io = &mut self.io;
        let n = poll_fn(|cx| Pin::new(&mut *io).poll_write(cx, bytes)).await?;
        if n == 0 && !bytes.is_empty() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "transport accepted no bytes"));
        }
        Ok(n)
    }

    /// Write all of `bytes`.
    pub async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.io.write_all(bytes).await
    }

    /// Flush the transport.
    pub async fn flush(&mut self) -> io::Result<()> {
        self.io.flush().await
    }

    /// Shut down the write half.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.io.shutdown().await
    }
}
