//! zlib stream decoding (RFC 1950).
//!
//! [`Inflater`] checks the two-byte zlib header, drives the DEFLATE
//! [`BlockDecoder`] until the final block ends, keeps a running Adler-32 over
//! every byte produced and compares it with the big-endian trailer.

use std::io::{self, Read, Write};

use super::bit_reader::BitReader;
use super::block::{BlockDecoder, Window, MAX_DISTANCE};
use crate::bits::BitWriter;
use crate::checksum::Adler32;
use crate::error::{ChecksumKind, Error, Result};

/// The only compression method zlib defines (DEFLATE).
const METHOD_DEFLATE: u8 = 8;

/// Parsed zlib stream header (CMF and FLG bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZlibHeader {
    cmf: u8,
    flg: u8,
}

impl ZlibHeader {
    /// Validate the CMF/FLG pair.
    ///
    /// The 16-bit value must be a multiple of 31, the method must be
    /// DEFLATE with a window of at most 32 KiB, and no preset dictionary
    /// may be requested.
    pub fn parse(cmf: u8, flg: u8) -> Result<Self> {
        if (u16::from(cmf) << 8 | u16::from(flg)) % 31 != 0 {
            return Err(Error::MalformedStream(format!(
                "zlib header check failed ({cmf:#04x} {flg:#04x})"
            )));
        }
        let header = Self { cmf, flg };
        if header.method() != METHOD_DEFLATE {
            return Err(Error::UnsupportedFormat(format!(
                "zlib compression method {}",
                header.method()
            )));
        }
        if cmf >> 4 > 7 {
            return Err(Error::UnsupportedFormat(format!(
                "zlib window size 2^{}",
                (cmf >> 4) + 8
            )));
        }
        if header.has_dictionary() {
            return Err(Error::UnsupportedFormat(
                "zlib preset dictionary".into(),
            ));
        }
        Ok(header)
    }

    /// Compression method (CM), 8 for DEFLATE.
    pub fn method(&self) -> u8 {
        self.cmf & 0x0F
    }

    /// Base-2 logarithm of the window size.
    pub fn window_bits(&self) -> u8 {
        (self.cmf >> 4) + 8
    }

    /// Largest back-reference distance the stream may use.
    pub fn window_size(&self) -> usize {
        1usize << self.window_bits()
    }

    /// Compression level hint (FLEVEL, 0-3). Informational only.
    pub fn level(&self) -> u8 {
        self.flg >> 6
    }

    /// Whether the stream asks for a preset dictionary (FDICT).
    pub fn has_dictionary(&self) -> bool {
        self.flg & 0x20 != 0
    }
}

/// Incremental zlib decoder over a byte source.
///
/// Decompressed bytes accumulate in an internal buffer that doubles as the
/// back-reference window. When built [`with_sink`](Inflater::with_sink),
/// every produced byte is also passed through to the sink.
pub struct Inflater<R: Read, W: Write = io::Sink> {
    reader: BitReader<R>,
    header: Option<ZlibHeader>,
    blocks: BlockDecoder,
    window: Window,
    checksum: Adler32,
    sink: Option<BitWriter<W>>,
    finished: bool,
}

impl<R: Read> Inflater<R> {
    /// Create a decoder reading compressed bytes from `source`.
    pub fn new(source: R) -> Self {
        Self::build(source, None)
    }
}

impl<R: Read, W: Write> Inflater<R, W> {
    /// Create a decoder that also mirrors decompressed bytes to `sink`.
    pub fn with_sink(source: R, sink: W) -> Self {
        Self::build(source, Some(BitWriter::new(sink)))
    }

    pub(crate) fn build(source: R, sink: Option<BitWriter<W>>) -> Self {
        Self {
            reader: BitReader::new(source),
            header: None,
            blocks: BlockDecoder::new(MAX_DISTANCE),
            window: Window::default(),
            checksum: Adler32::new(),
            sink,
            finished: false,
        }
    }

    /// Reserve room for `additional` more output bytes.
    pub fn reserve(&mut self, additional: usize) {
        self.window.reserve(additional);
    }

    /// Decode until `limit` more bytes are produced or the stream ends.
    ///
    /// The first call reads and validates the zlib header. When the final
    /// block ends, the Adler-32 trailer is read and checked; on a mismatch
    /// the stream is still marked finished and [`output`](Self::output)
    /// keeps everything decoded, so a caller may choose to use it.
    pub fn decode(&mut self, limit: usize) -> Result<usize> {
        if self.finished {
            return Ok(0);
        }
        if self.header.is_none() {
            let header = self.read_header()?;
            self.blocks = BlockDecoder::new(header.window_size());
            self.header = Some(header);
        }

        let start = self.window.len();
        let result = self.blocks.decode(&mut self.reader, &mut self.window, limit);

        let fresh = &self.window.as_slice()[start..];
        self.checksum.update(fresh);
        if let Some(sink) = self.sink.as_mut() {
            sink.write_aligned_bytes(fresh)?;
        }
        let produced = result?;

        if self.blocks.is_done() {
            self.finish_stream()?;
        }
        Ok(produced)
    }

    /// Decode everything that remains.
    pub fn decode_to_end(&mut self) -> Result<usize> {
        let mut total = 0;
        while !self.finished {
            total += self.decode(usize::MAX)?;
        }
        Ok(total)
    }

    fn read_header(&mut self) -> Result<ZlibHeader> {
        let cmf = self.reader.read_aligned_byte()?;
        let flg = self.reader.read_aligned_byte()?;
        if self.reader.is_eof() {
            return Err(Error::TruncatedStream(
                "compressed stream ended inside the zlib header".into(),
            ));
        }
        let header = ZlibHeader::parse(cmf, flg)?;
        log::debug!(
            "zlib: method {}, window {} bytes, level {}",
            header.method(),
            header.window_size(),
            header.level()
        );
        Ok(header)
    }

    fn finish_stream(&mut self) -> Result<()> {
        let expected = self.reader.read_aligned_u32_be()?;
        self.finished = true;
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }

        let actual = self.checksum.finish();
        log::debug!(
            "zlib: {} blocks, {} bytes in, {} bytes out",
            self.blocks.blocks_started(),
            self.reader.bytes_consumed(),
            self.window.len()
        );
        if expected != actual {
            return Err(Error::ChecksumMismatch {
                kind: ChecksumKind::Stream,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// True once the final block and the checksum trailer have been read.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The zlib header, once read.
    pub fn header(&self) -> Option<&ZlibHeader> {
        self.header.as_ref()
    }

    /// Everything decompressed so far.
    pub fn output(&self) -> &[u8] {
        self.window.as_slice()
    }

    /// Compressed bytes consumed so far.
    pub fn total_in(&self) -> u64 {
        self.reader.bytes_consumed()
    }

    /// Running Adler-32 of the output so far.
    pub fn checksum(&self) -> u32 {
        self.checksum.finish()
    }

    /// Read and discard any input left after the stream; returns the
    /// number of bytes discarded.
    pub fn skip_trailing_input(&mut self) -> Result<u64> {
        self.reader.skip_remaining()
    }

    /// Split into the decompressed bytes, the source and the sink (flushed).
    pub fn into_parts(self) -> Result<(Vec<u8>, R, Option<W>)> {
        let sink = match self.sink {
            Some(writer) => Some(writer.finish()?),
            None => None,
        };
        Ok((self.window.into_vec(), self.reader.into_inner(), sink))
    }

    /// Consume the decoder, returning the decompressed bytes.
    pub fn into_output(self) -> Vec<u8> {
        self.window.into_vec()
    }
}

/// Decompress a complete in-memory zlib stream.
///
/// Bytes after the Adler-32 trailer are ignored.
pub fn inflate_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut inflater = Inflater::new(data);
    inflater.decode_to_end()?;
    Ok(inflater.into_output())
}
