//! Bit-level reader for DEFLATE decoding.
//!
//! Pulls bits from any [`Read`] source through a small internal buffer.
//! Running out of input is not an error at this level: the reader raises
//! its end-of-stream flag and yields zero bits, and the caller decides what
//! that means (`read_bits_exact` turns it into [`Error::TruncatedStream`]).

use std::io::{ErrorKind, Read};

use crate::error::{Error, Result};

const BUFFER_SIZE: usize = 4096;

/// Bit reader for LSB-first bit streams (DEFLATE).
///
/// Within a byte, bits are consumed starting from the least significant
/// one; Huffman codewords are still walked one bit at a time in stream order.
pub struct BitReader<R: Read> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
    /// Partially consumed byte; consumed bits are shifted out.
    current: u8,
    /// Unconsumed bits left in `current`.
    bits_left: u8,
    eof: bool,
    consumed: u64,
}

impl<R: Read> BitReader<R> {
    /// Create a new bit reader over `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            pos: 0,
            len: 0,
            current: 0,
            bits_left: 0,
            eof: false,
            consumed: 0,
        }
    }

    /// Next whole byte from the source, or `None` once it is exhausted.
    fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.pos == self.len {
            if !self.refill()? {
                self.eof = true;
                return Ok(None);
            }
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        self.consumed += 1;
        Ok(Some(byte))
    }

    fn refill(&mut self) -> Result<bool> {
        loop {
            match self.inner.read(&mut self.buf) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.pos = 0;
                    self.len = n;
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read one bit.
    ///
    /// At end of input this returns 0 and sets the end-of-stream flag.
    #[inline]
    pub fn read_bit(&mut self) -> Result<u8> {
        if self.bits_left == 0 {
            match self.next_byte()? {
                Some(byte) => {
                    self.current = byte;
                    self.bits_left = 8;
                }
                None => return Ok(0),
            }
        }
        let bit = self.current & 1;
        self.current >>= 1;
        self.bits_left -= 1;
        Ok(bit)
    }

    /// Read `n` bits (at most 32); the first bit read lands in bit 0 of the result.
    ///
    /// Stops early if the source runs dry; check [`is_eof`](Self::is_eof).
    pub fn read_bits(&mut self, n: u8) -> Result<u32> {
        debug_assert!(n <= 32);
        let mut value = 0u32;
        for i in 0..n {
            let bit = self.read_bit()?;
            if self.eof {
                break;
            }
            value |= (bit as u32) << i;
        }
        Ok(value)
    }

    /// Like [`read_bits`](Self::read_bits), but running out of input is
    /// [`Error::TruncatedStream`].
    #[inline]
    pub fn read_bits_exact(&mut self, n: u8) -> Result<u32> {
        let value = self.read_bits(n)?;
        if self.eof {
            return Err(Error::TruncatedStream(
                "compressed stream ended mid-block".into(),
            ));
        }
        Ok(value)
    }

    /// Discard the unread bits of the current byte.
    #[inline]
    pub fn align_to_byte(&mut self) {
        self.bits_left = 0;
        self.current = 0;
    }

    /// Align, then read one byte (0 and end-of-stream at end of input).
    pub fn read_aligned_byte(&mut self) -> Result<u8> {
        self.align_to_byte();
        Ok(self.next_byte()?.unwrap_or(0))
    }

    /// Align, then read a little-endian 16-bit value (DEFLATE's `LEN`/`NLEN`).
    pub fn read_aligned_u16_le(&mut self) -> Result<u16> {
        let mut bytes = [0u8; 2];
        self.read_aligned_exact(&mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Align, then read a big-endian 32-bit value (the zlib Adler-32 trailer).
    pub fn read_aligned_u32_be(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_aligned_exact(&mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Align, then fill `out` with raw bytes. Returns how many were read,
    /// which is less than `out.len()` only at end of input.
    pub fn read_aligned_bytes(&mut self, out: &mut [u8]) -> Result<usize> {
        self.align_to_byte();
        let mut filled = 0;
        while filled < out.len() {
            if self.pos == self.len && !self.refill()? {
                self.eof = true;
                break;
            }
            let take = (self.len - self.pos).min(out.len() - filled);
            out[filled..filled + take].copy_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
            self.consumed += take as u64;
            filled += take;
        }
        Ok(filled)
    }

    fn read_aligned_exact(&mut self, out: &mut [u8]) -> Result<()> {
        if self.read_aligned_bytes(out)? < out.len() {
            return Err(Error::TruncatedStream(
                "compressed stream ended inside a byte-aligned field".into(),
            ));
        }
        Ok(())
    }

    /// True once a read found no more input.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Whole bytes taken from the source so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Drain whatever input remains and return how many bytes that was.
    pub fn skip_remaining(&mut self) -> Result<u64> {
        let mut skipped = (self.len - self.pos) as u64;
        self.pos = self.len;
        while self.refill()? {
            skipped += self.len as u64;
            self.pos = self.len;
        }
        self.eof = true;
        self.align_to_byte();
        Ok(skipped)
    }

    /// Give back the source. Buffered but unread bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }
}
