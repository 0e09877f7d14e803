//! A wrapper around a byte buffer that tracks how much has been filled.

/// Borrowed buffer handed to [`AsyncRead::poll_read`](super::AsyncRead::poll_read).
///
/// The reader copies into [`unfilled`](Self::unfilled) and then calls
/// [`advance`](Self::advance); the caller inspects [`filled`](Self::filled).
#[derive(Debug)]
pub struct ReadBuf<'a> {
    buf: &'a mut [u8],
    filled: usize,
}

impl<'a> ReadBuf<'a> {
    /// Wraps an empty buffer.
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, filled: 0 }
    }

    /// Total capacity of the underlying buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes written so far.
    #[must_use]
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    /// The part of the buffer not yet written.
    pub fn unfilled(&mut self) -> &mut [u8] {
        &mut self.buf[self.filled..]
    }

    /// Number of bytes that can still be written.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.filled
    }

    /// Marks `n` more bytes as filled.
    ///
    /// # Panics
    ///
    /// Panics if this would move past the end of the buffer.
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.remaining(), "ReadBuf::advance past capacity");
        self.filled += n;
    }

    /// Copies as much of `src` as fits and returns the number of bytes copied.
    pub fn put_slice(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.remaining());
        self.buf[self.filled..self.filled + n].copy_from_slice(&src[..n]);
        self.filled += n;
        n
    }

    /// Resets the filled region to empty.
    pub fn clear(&mut self) {
        self.filled = 0;
    }
}
