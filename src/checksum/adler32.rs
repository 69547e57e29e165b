//! Adler-32 checksum (RFC 1950) trailing every zlib stream.

const MOD_ADLER: u32 = 65_521;

/// Largest n such that 255*n*(n+1)/2 + (n+1)*(MOD_ADLER-1) fits in a u32.
const NMAX: usize = 5552;

/// Calculate the Adler-32 of `data` in one call.
#[inline]
#[must_use]
pub fn adler32(data: &[u8]) -> u32 {
    let mut adler = Adler32::new();
    adler.update(data);
    adler.finish()
}

/// Running Adler-32 over every byte a decoder produces.
///
/// Two 16-bit accumulators: `a` is 1 plus the sum of all bytes, `b` the sum
/// of every intermediate `a`, both modulo 65521.
#[derive(Debug, Clone, Copy)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    /// Create a checksum in its initial state (value 1).
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Feed more bytes.
    ///
    /// Modulo is deferred to `NMAX`-sized chunk boundaries.
    pub fn update(&mut self, data: &[u8]) {
        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                self.a += byte as u32;
                self.b += self.a;
            }
            self.a %= MOD_ADLER;
            self.b %= MOD_ADLER;
        }
    }

    /// Current checksum value, `b << 16 | a`.
    #[inline]
    pub fn finish(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}
