//! Bit-level output, the mirror image of [`crate::decode::BitReader`].
//!
//! The decoder uses it to pass decompressed bytes through to a caller's
//! sink; tests use it to hand-assemble DEFLATE bitstreams.

use std::io::Write;

use crate::error::Result;

/// A bit writer that packs bits into bytes, LSB first (DEFLATE order),
/// and forwards completed bytes to any [`Write`] sink.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    sink: W,
    current_byte: u8,
    bit_position: u8,
    bytes_written: u64,
}

impl<W: Write> BitWriter<W> {
    /// Create a bit writer over `sink`.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            current_byte: 0,
            bit_position: 0,
            bytes_written: 0,
        }
    }

    /// Write the low `num_bits` of `value`, least significant bit first.
    ///
    /// # Arguments
    /// * `value` - The value to write (only lower `num_bits` are used)
    /// * `num_bits` - Number of bits to write (0-32)
    pub fn write_bits(&mut self, value: u32, num_bits: u8) -> Result<()> {
        debug_assert!(num_bits <= 32);

        let mut value = value as u64;
        let mut remaining = num_bits;

        while remaining > 0 {
            let available = 8 - self.bit_position;
            let to_write = remaining.min(available);

            let mask = (1u64 << to_write) - 1;
            let bits = (value & mask) as u8;
            self.current_byte |= bits << self.bit_position;

            self.bit_position += to_write;
            value >>= to_write;
            remaining -= to_write;

            if self.bit_position == 8 {
                self.emit(self.current_byte)?;
                self.current_byte = 0;
                self.bit_position = 0;
            }
        }
        Ok(())
    }

    /// Write a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.write_bits(bit as u32, 1)
    }

    /// Write a Huffman codeword of `length` bits, most significant bit first.
    ///
    /// DEFLATE packs codewords starting from their top bit even though
    /// every other field is LSB-first.
    pub fn write_code(&mut self, codeword: u16, length: u8) -> Result<()> {
        for i in (0..length).rev() {
            self.write_bit((codeword >> i) & 1 == 1)?;
        }
        Ok(())
    }

    /// Pad the partial byte with zero bits and emit it.
    pub fn align_to_byte(&mut self) -> Result<()> {
        if self.bit_position > 0 {
            self.emit(self.current_byte)?;
            self.current_byte = 0;
            self.bit_position = 0;
        }
        Ok(())
    }

    /// Align, then write one whole byte.
    pub fn write_aligned_byte(&mut self, byte: u8) -> Result<()> {
        self.align_to_byte()?;
        self.emit(byte)
    }

    /// Align, then write `bytes` verbatim.
    pub fn write_aligned_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.align_to_byte()?;
        self.sink.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Emit any partial byte and flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.align_to_byte()?;
        self.sink.flush()?;
        Ok(())
    }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.sink)
    }

    /// Whole bytes handed to the sink so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Bits pending in the partial byte.
    pub fn bit_position(&self) -> u8 {
        self.bit_position
    }

    #[inline]
    fn emit(&mut self, byte: u8) -> Result<()> {
        self.sink.write_all(&[byte])?;
        self.bytes_written += 1;
        Ok(())
    }
}
