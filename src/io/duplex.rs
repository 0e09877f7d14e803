//! In-memory bidirectional byte pipe.
//!
//! [`duplex`] returns two connected [`DuplexStream`]s: bytes written to one
//! are read from the other. Each direction has a bounded buffer; a full
//! buffer parks the writer and an empty one parks the reader. Dropping or
//! shutting down one end delivers EOF to the peer's reads, and dropping an
//! end makes the peer's writes fail with `BrokenPipe`.

use crate::io::{AsyncRead, AsyncWrite, ReadBuf};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

#[derive(Debug)]
struct Pipe {
    buf: VecDeque<u8>,
    max_buf_size: usize,
    read_waker: Option<Waker>,
    write_waker: Option<Waker>,
    /// Writer side shut down or dropped: reads drain then see EOF.
    write_closed: bool,
    /// Reader side dropped: writes fail.
    read_closed: bool,
}

impl Pipe {
    fn new(max_buf_size: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(max_buf_size.min(64 * 1024)),
            max_buf_size,
            read_waker: None,
            write_waker: None,
            write_closed: false,
            read_closed: false,
        }
    }

    fn wake_reader(&mut self) {
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
    }

    fn wake_writer(&mut self) {
        if let Some(waker) = self.write_waker.take() {
            waker.wake();
        }
    }
}

/// One end of an in-memory pipe created by [`duplex`].
#[derive(Debug)]
pub struct DuplexStream {
    read: Arc<Mutex<Pipe>>,
    write: Arc<Mutex<Pipe>>,
}

/// Creates a connected pair of in-memory streams.
///
/// `max_buf_size` bounds the bytes buffered in each direction.
///
/// # Panics
///
/// Panics if `max_buf_size` is zero.
#[must_use]
pub fn duplex(max_buf_size: usize) -> (DuplexStream, DuplexStream) {
    assert!(max_buf_size > 0, "duplex buffer size must be non-zero");
    let one = Arc::new(Mutex::new(Pipe::new(max_buf_size)));
    let two = Arc::new(Mutex::new(Pipe::new(max_buf_size)));
    (
        DuplexStream {
            read: Arc::clone(&one),
            write: Arc::clone(&two),
        },
        DuplexStream {
            read: two,
            write: one,
        },
    )
}

impl DuplexStream {
    /// Number of bytes written by the peer that have not been read yet.
    #[must_use]
    pub fn pending_read(&self) -> usize {
        self.read.lock().buf.len()
    }
}

impl AsyncRead for DuplexStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut pipe = self.read.lock();
        if pipe.buf.is_empty() {
            if pipe.write_closed {
                return Poll::Ready(Ok(()));
            }
            pipe.read_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let n = buf.remaining().min(pipe.buf.len());
        let (front, back) = pipe.buf.as_slices();
        let from_front = n.min(front.len());
        buf.put_slice(&front[..from_front]);
        buf.put_slice(&back[..n - from_front]);
        pipe.buf.drain(..n);
        pipe.wake_writer();
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for DuplexStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut pipe = self.write.lock();
        if pipe.read_closed || pipe.write_closed {
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let space = pipe.max_buf_size - pipe.buf.len();
        if space == 0 {
            pipe.write_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let n = space.min(buf.len());
        pipe.buf.extend(&buf[..n]);
        pipe.wake_reader();
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut pipe = self.write.lock();
        pipe.write_closed = true;
        pipe.wake_reader();
        Poll::Ready(Ok(()))
    }
}

impl Drop for DuplexStream {
    fn drop(&mut self) {
        {
            let mut pipe = self.write.lock();
            pipe.write_closed = true;
            pipe.wake_reader();
        }
        let mut pipe = self.read.lock();
        pipe.read_closed = true;
        pipe.wake_writer();
    }
}
