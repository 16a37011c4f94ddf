//! Growable staging buffer between a byte stream and the frame codec.
//!
//! ```text
//! +-------------------+------------------+------------------+
//! | prependable bytes |  readable bytes  |  writable bytes  |
//! |                   |     (CONTENT)    |                  |
//! +-------------------+------------------+------------------+
//! |                   |                  |                  |
//! 0      <=         reader      <=     writer      <=    capacity
//! ```

use std::fmt;
use std::io::{self, Read};

use bytes::Buf;

/// Bytes reserved in front of the readable region for cheap prepends.
pub const CHEAP_PREPEND: usize = 8;

/// Default size of the writable region of a fresh buffer.
pub const INITIAL_SIZE: usize = 1024;

/// A contiguous byte buffer with a read cursor and a write cursor.
///
/// Owned by exactly one connection I/O path; it is not `Sync`-shared and
/// needs no locking.
pub struct StagingBuffer {
    buf: Vec<u8>,
    reader: usize,
    writer: usize,
}

impl StagingBuffer {
    /// Create a buffer with the default initial size.
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_SIZE)
    }

    /// Create a buffer whose writable region starts at `initial_size` bytes.
    pub fn with_capacity(initial_size: usize) -> Self {
        Self {
            buf: vec![0; CHEAP_PREPEND + initial_size],
            reader: CHEAP_PREPEND,
            writer: CHEAP_PREPEND,
        }
    }

    pub fn prependable_bytes(&self) -> usize {
        self.reader
    }

    pub fn readable_bytes(&self) -> usize {
        self.writer - self.reader
    }

    pub fn writable_bytes(&self) -> usize {
        self.buf.len() - self.writer
    }

    /// Size of the backing allocation in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readable_bytes() == 0
    }

    /// View the readable region without consuming it.
    pub fn peek(&self) -> &[u8] {
        &self.buf[self.reader..self.writer]
    }

    /// Advance the read cursor by `len` bytes.
    ///
    /// Consuming everything (or more) resets both cursors instead of failing.
    pub fn consume(&mut self, len: usize) {
        if len < self.readable_bytes() {
            self.reader += len;
        } else {
            self.reset_all();
        }
    }

    /// Drop all readable bytes and rewind both cursors to the prepend boundary.
    pub fn reset_all(&mut self) {
        self.reader = CHEAP_PREPEND;
        self.writer = CHEAP_PREPEND;
    }

    /// Copy `data` to the tail, growing or compacting as needed.
    pub fn append(&mut self, data: &[u8]) {
        self.ensure_writable_bytes(data.len());
        let end = self.writer + data.len();
        self.buf[self.writer..end].copy_from_slice(data);
        self.writer = end;
    }

    /// Make sure at least `len` bytes can be written without reallocation.
    pub fn ensure_writable_bytes(&mut self, len: usize) {
        if self.writable_bytes() < len {
            self.make_space(len);
        }
        debug_assert!(self.writable_bytes() >= len);
    }

    /// Mutable view of the writable region; pair with [`has_written`](Self::has_written).
    pub fn begin_write(&mut self) -> &mut [u8] {
        &mut self.buf[self.writer..]
    }

    /// Mark `len` bytes of the writable region as filled.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds [`writable_bytes`](Self::writable_bytes).
    pub fn has_written(&mut self, len: usize) {
        assert!(
            len <= self.writable_bytes(),
            "has_written({len}) past writable region ({})",
            self.writable_bytes()
        );
        self.writer += len;
    }

    /// Take back the last `len` readable bytes.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds [`readable_bytes`](Self::readable_bytes).
    pub fn unwrite(&mut self, len: usize) {
        assert!(
            len <= self.readable_bytes(),
            "unwrite({len}) past readable region ({})",
            self.readable_bytes()
        );
        self.writer -= len;
    }

    /// Insert `data` in front of the readable region.
    ///
    /// Uses the prepend area when it is large enough; otherwise the readable
    /// region is shifted towards the tail first.
    pub fn prepend(&mut self, data: &[u8]) {
        let len = data.len();
        if len > self.reader {
            let shift = len - self.reader;
            if self.writable_bytes() < shift {
                self.buf.resize(self.writer + shift, 0);
            }
            self.buf
                .copy_within(self.reader..self.writer, self.reader + shift);
            self.reader += shift;
            self.writer += shift;
        }
        self.reader -= len;
        self.buf[self.reader..self.reader + len].copy_from_slice(data);
    }

    /// Readable bytes as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.peek()).into_owned()
    }

    pub fn swap(&mut self, other: &mut StagingBuffer) {
        std::mem::swap(self, other);
    }

    /// Perform one `read` from `src` straight into the writable region.
    ///
    /// At least `min_chunk` bytes of space are made available first. Returns
    /// the number of bytes read; `Ok(0)` means end of stream.
    pub fn read_from<R: Read + ?Sized>(&mut self, src: &mut R, min_chunk: usize) -> io::Result<usize> {
        self.ensure_writable_bytes(min_chunk.max(1));
        let read = src.read(self.begin_write())?;
        self.has_written(read);
        Ok(read)
    }

    fn make_space(&mut self, len: usize) {
        if self.writable_bytes() + self.prependable_bytes() < len + CHEAP_PREPEND {
            self.buf.resize(self.writer + len, 0);
        } else {
            let readable = self.readable_bytes();
            self.buf
                .copy_within(self.reader..self.writer, CHEAP_PREPEND);
            self.reader = CHEAP_PREPEND;
            self.writer = CHEAP_PREPEND + readable;
        }
    }
}

impl Default for StagingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buf for StagingBuffer {
    fn remaining(&self) -> usize {
        self.readable_bytes()
    }

    fn chunk(&self) -> &[u8] {
        self.peek()
    }

    fn advance(&mut self, cnt: usize) {
        assert!(
            cnt <= self.readable_bytes(),
            "cannot advance past the readable region"
        );
        self.consume(cnt);
    }
}

impl fmt::Debug for StagingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("prependable", &self.prependable_bytes())
            .field("readable", &self.readable_bytes())
            .field("writable", &self.writable_bytes())
            .finish()
    }
}
