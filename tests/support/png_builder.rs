//! PNG construction for tests.
//!
//! Everything here is independent of the decoder under test: chunk CRCs come
//! from `flate2::Crc` and compressed streams from `flate2`'s encoder (or are
//! assembled by hand as stored blocks).

#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::{Compression, Crc};

/// PNG file signature.
pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Append one chunk (length, tag, payload, CRC) to `out`.
pub fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], data: &[u8]) {
    let mut crc = Crc::new();
    crc.update(tag);
    crc.update(data);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(data);
    out.extend_from_slice(&crc.sum().to_be_bytes());
}

/// Location of one chunk inside a PNG file.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSpan {
    /// Type tag.
    pub tag: [u8; 4],
    /// Offset of the length field.
    pub start: usize,
    /// Offset of the first payload byte.
    pub payload: usize,
    /// Payload length.
    pub len: usize,
}

impl ChunkSpan {
    /// Offset one past the CRC.
    pub fn end(&self) -> usize {
        self.payload + self.len + 4
    }

    /// Critical chunks have an uppercase first letter.
    pub fn is_critical(&self) -> bool {
        self.tag[0] & 0x20 == 0
    }
}

/// Walk the chunks of a well-formed PNG.
pub fn chunk_spans(png: &[u8]) -> Vec<ChunkSpan> {
    let mut spans = Vec::new();
    let mut pos = SIGNATURE.len();
    while pos + 12 <= png.len() {
        let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&png[pos + 4..pos + 8]);
        let span = ChunkSpan {
            tag,
            start: pos,
            payload: pos + 8,
            len,
        };
        pos = span.end();
        spans.push(span);
    }
    spans
}

/// How the image data is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packing {
    /// Stored blocks only, built by hand.
    Stored,
    /// `flate2` at the given level (0-9).
    Zlib(u32),
}

/// Scanline filter choice for the whole image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filtering {
    /// The same filter type on every row.
    Fixed(u8),
    /// Row `y` uses filter `y % 5`.
    Cycle,
}

/// Compress with `flate2`.
pub fn zlib(data: &[u8], level: u32) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).expect("compress");
    encoder.finish().expect("finish")
}

/// A zlib stream of stored blocks (at most 65535 bytes each).
pub fn zlib_stored(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x78, 0x01];
    let mut blocks = data.chunks(0xFFFF).peekable();
    if blocks.peek().is_none() {
        out.extend_from_slice(&[0x01, 0x00, 0x00, 0xFF, 0xFF]);
    }
    while let Some(block) = blocks.next() {
        let last = blocks.peek().is_none();
        out.push(u8::from(last));
        let len = block.len() as u16;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(block);
    }
    out.extend_from_slice(&adler32(data).to_be_bytes());
    out
}

/// Reference Adler-32, written out longhand.
pub fn adler32(data: &[u8]) -> u32 {
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in data {
        a = (a + byte as u32) % 65521;
        b = (b + a) % 65521;
    }
    (b << 16) | a
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let (pa, pb, pc) = ((p - a as i16).abs(), (p - b as i16).abs(), (p - c as i16).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Apply forward scanline filters, prefixing each row with its filter byte.
pub fn filter_rows(pixels: &[u8], stride: usize, bpp: usize, filtering: Filtering) -> Vec<u8> {
    let rows = pixels.len() / stride;
    let zero = vec![0u8; stride];
    let mut out = Vec::with_capacity(rows * (stride + 1));
    for y in 0..rows {
        let row = &pixels[y * stride..(y + 1) * stride];
        let prev = if y == 0 {
            &zero[..]
        } else {
            &pixels[(y - 1) * stride..y * stride]
        };
        let filter = match filtering {
            Filtering::Fixed(f) => f,
            Filtering::Cycle => (y % 5) as u8,
        };
        out.push(filter);
        for i in 0..stride {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match filter {
                0 => 0,
                1 => left,
                2 => prev[i],
                3 => ((left as u16 + prev[i] as u16) / 2) as u8,
                4 => paeth(left, prev[i], up_left),
                _ => panic!("filter {filter}"),
            };
            out.push(row[i].wrapping_sub(predicted));
        }
    }
    out
}

/// Builder for test PNG files.
#[derive(Debug, Clone)]
pub struct PngBuilder {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    interlace: u8,
    palette: Option<Vec<u8>>,
    transparency: Option<Vec<u8>>,
    text: Vec<(String, Vec<u8>)>,
    extra: Vec<([u8; 4], Vec<u8>)>,
    filtering: Filtering,
    packing: Packing,
    idat_size: Option<usize>,
}

impl PngBuilder {
    /// An image with the given header fields, filter None, stored blocks.
    pub fn new(width: u32, height: u32, color_type: u8, bit_depth: u8) -> Self {
        Self {
            width,
            height,
            bit_depth,
            color_type,
            interlace: 0,
            palette: None,
            transparency: None,
            text: Vec::new(),
            extra: Vec::new(),
            filtering: Filtering::Fixed(0),
            packing: Packing::Stored,
            idat_size: None,
        }
    }

    /// Bytes per pixel implied by the header.
    pub fn bytes_per_pixel(&self) -> usize {
        let channels = match self.color_type {
            0 | 3 => 1,
            4 => 2,
            2 => 3,
            6 => 4,
            other => panic!("color type {other}"),
        };
        channels * self.bit_depth as usize / 8
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel()
    }

    /// Add a `PLTE` chunk.
    pub fn palette(mut self, palette: Vec<u8>) -> Self {
        self.palette = Some(palette);
        self
    }

    /// Add a `tRNS` chunk.
    pub fn transparency(mut self, trns: Vec<u8>) -> Self {
        self.transparency = Some(trns);
        self
    }

    /// Add a `tEXt` chunk.
    pub fn text(mut self, keyword: &str, text: &[u8]) -> Self {
        self.text.push((keyword.to_string(), text.to_vec()));
        self
    }

    /// Add an arbitrary chunk before the image data.
    pub fn chunk(mut self, tag: &[u8; 4], data: Vec<u8>) -> Self {
        self.extra.push((*tag, data));
        self
    }

    /// Set the interlace byte of the header.
    pub fn interlace(mut self, method: u8) -> Self {
        self.interlace = method;
        self
    }

    /// Choose scanline filters.
    pub fn filtering(mut self, filtering: Filtering) -> Self {
        self.filtering = filtering;
        self
    }

    /// Choose how image data is compressed.
    pub fn packing(mut self, packing: Packing) -> Self {
        self.packing = packing;
        self
    }

    /// Split the compressed stream into `IDAT` chunks of at most `size` bytes.
    pub fn idat_size(mut self, size: usize) -> Self {
        self.idat_size = Some(size.max(1));
        self
    }

    /// The 13-byte `IHDR` payload.
    pub fn ihdr(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(13);
        data.extend_from_slice(&self.width.to_be_bytes());
        data.extend_from_slice(&self.height.to_be_bytes());
        data.extend_from_slice(&[self.bit_depth, self.color_type, 0, 0, self.interlace]);
        data
    }

    /// The zlib stream for `pixels`.
    pub fn image_data(&self, pixels: &[u8]) -> Vec<u8> {
        assert_eq!(pixels.len(), self.stride() * self.height as usize);
        let filtered = filter_rows(pixels, self.stride(), self.bytes_per_pixel(), self.filtering);
        match self.packing {
            Packing::Stored => zlib_stored(&filtered),
            Packing::Zlib(level) => zlib(&filtered, level),
        }
    }

    /// The complete file for `pixels`.
    pub fn build(&self, pixels: &[u8]) -> Vec<u8> {
        let mut out = SIGNATURE.to_vec();
        write_chunk(&mut out, b"IHDR", &self.ihdr());
        for (tag, data) in &self.extra {
            write_chunk(&mut out, tag, data);
        }
        for (keyword, text) in &self.text {
            let mut data = keyword.as_bytes().to_vec();
            data.push(0);
            data.extend_from_slice(text);
            write_chunk(&mut out, b"tEXt", &data);
        }
        if let Some(palette) = &self.palette {
            write_chunk(&mut out, b"PLTE", palette);
        }
        if let Some(trns) = &self.transparency {
            write_chunk(&mut out, b"tRNS", trns);
        }
        let stream = self.image_data(pixels);
        match self.idat_size {
            Some(size) => {
                for piece in stream.chunks(size) {
                    write_chunk(&mut out, b"IDAT", piece);
                }
            }
            None => write_chunk(&mut out, b"IDAT", &stream),
        }
        write_chunk(&mut out, b"IEND", &[]);
        out
    }
}
