//! Token scanning over a buffered, seekable byte source.
//!
//! The prelude has no fixed layout, so everything in it is found by searching
//! for literal tokens and by skipping balanced `{`/`}` blocks. Both operations
//! work on a `PeekReader`, which can look ahead an arbitrary number of bytes
//! without consuming them.

use std::cmp;
use std::io::{self, Read, Seek, SeekFrom};

use crate::{Error, FormatError};

/// How many bytes to request from the underlying source at a time.
const CHUNK_LEN: usize = 8192;

/// A read cursor with unbounded look-ahead over a byte source.
///
/// Bytes are pulled from the source into an internal buffer as `peek` needs
/// them. `seek_to` repositions the source and drops the buffer.
pub struct PeekReader<R> {
    inner: R,
    buf: Vec<u8>,
    // Start of the unconsumed part of buf.
    pos: usize,
}

impl<R> PeekReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, buf: Vec::new(), pos: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Marks `n` peeked bytes as read.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(self.pos + n <= self.buf.len());
        self.pos = cmp::min(self.pos + n, self.buf.len());
    }
}

impl<R: Read> PeekReader<R> {
    /// Buffers until at least `n` bytes are available or the source is
    /// exhausted, and returns everything buffered. The slice is shorter than
    /// `n` only at the end of the source.
    pub fn fill_to(&mut self, n: usize) -> io::Result<&[u8]> {
        if self.buf.len() - self.pos < n {
            self.buf.drain(..self.pos);
            self.pos = 0;
            while self.buf.len() < n {
                let old_len = self.buf.len();
                self.buf.resize(old_len + cmp::max(n - old_len, CHUNK_LEN), 0);
                match self.inner.read(&mut self.buf[old_len..]) {
                    Ok(0) => {
                        self.buf.truncate(old_len);
                        break;
                    }
                    Ok(k) => self.buf.truncate(old_len + k),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => self.buf.truncate(old_len),
                    Err(err) => {
                        self.buf.truncate(old_len);
                        return Err(err);
                    }
                }
            }
        }
        Ok(&self.buf[self.pos..])
    }

    /// Returns the next `n` bytes without consuming them, or fewer at the end
    /// of the source.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        let available = self.fill_to(n)?;
        Ok(&available[..cmp::min(n, available.len())])
    }

    /// Whether the next bytes are exactly `token`.
    pub fn starts_with(&mut self, token: &[u8]) -> io::Result<bool> {
        Ok(self.peek(token.len())? == token)
    }

    /// Reads through the next `delim` byte, which is included in the result.
    /// At the end of the source, returns whatever remained (possibly nothing)
    /// without a trailing `delim`.
    pub fn read_until(&mut self, delim: u8) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let (taken, done) = {
                let available = self.fill_to(1)?;
                match available.iter().position(|&b| b == delim) {
                    Some(i) => {
                        out.extend_from_slice(&available[..=i]);
                        (i + 1, true)
                    }
                    None => {
                        out.extend_from_slice(available);
                        (available.len(), available.is_empty())
                    }
                }
            };
            self.consume(taken);
            if done {
                return Ok(out);
            }
        }
    }

    /// Reads one line including its `\n`, if there is one.
    pub fn read_line(&mut self) -> io::Result<Vec<u8>> {
        self.read_until(b'\n')
    }
}

impl<R: Seek> PeekReader<R> {
    /// Seeks the source to the absolute `offset` and drops any look-ahead.
    pub fn seek_to(&mut self, offset: u64) -> io::Result<u64> {
        self.buf.clear();
        self.pos = 0;
        self.inner.seek(SeekFrom::Start(offset))
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.buf.len() {
            let n = cmp::min(out.len(), self.buf.len() - self.pos);
            out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        self.inner.read(out)
    }
}

/// Advances `r` past the first occurrence of `pattern`. Everything up to and
/// including the match is discarded.
pub fn search<R: Read>(r: &mut PeekReader<R>, pattern: &[u8]) -> Result<(), Error> {
    if pattern.is_empty() {
        return Err(Error::Format(FormatError::EmptyToken));
    }
    loop {
        let (available, found) = {
            let window = r.fill_to(pattern.len())?;
            (window.len(), window.windows(pattern.len()).position(|w| w == pattern))
        };
        if let Some(i) = found {
            r.consume(i + pattern.len());
            return Ok(());
        }
        if available < pattern.len() {
            return Err(Error::Format(FormatError::EndOfStream { token: pattern.to_vec() }));
        }
        // Keep the last pattern.len() - 1 bytes; a match may straddle them.
        r.consume(available - pattern.len() + 1);
    }
}

/// Returns the block from the next `left` through its matching `right`, both
/// included. Nested `left`/`right` pairs are counted; when both could match at
/// the same position, `left` wins.
///
/// The scanner knows nothing about string literals or comments, so a
/// delimiter inside one of those is counted like any other.
pub fn read_balanced<R: Read>(r: &mut PeekReader<R>, left: &[u8], right: &[u8]) -> Result<Vec<u8>, Error> {
    if left.is_empty() || right.is_empty() {
        return Err(Error::Format(FormatError::EmptyToken));
    }
    search(r, left)?;
    let mut block = left.to_vec();
    let mut depth: usize = 1;
    loop {
        if r.starts_with(left)? {
            r.consume(left.len());
            block.extend_from_slice(left);
            depth += 1;
        } else if r.starts_with(right)? {
            r.consume(right.len());
            block.extend_from_slice(right);
            depth -= 1;
            if depth == 0 {
                return Ok(block);
            }
        } else {
            let byte = match r.peek(1)?.first() {
                Some(&byte) => byte,
                None => return Err(Error::Format(FormatError::EndOfStream { token: right.to_vec() })),
            };
            r.consume(1);
            block.push(byte);
        }
    }
}
