//! PNG container decoding.
//!
//! The decoder walks signature, `IHDR`, then the remaining chunks in file
//! order, checking each chunk's CRC before trusting its payload. When the
//! first `IDAT` arrives, the run of `IDAT` chunks is streamed straight into
//! the zlib decoder, and the decompressed scanlines are unfiltered into the
//! final pixel buffer. Only a fully decoded [`Image`] is ever returned.

use std::io::{self, Read, Write};

use super::chunk::{Chunk, ChunkReader, ChunkType, ImageDataStream};
use super::filter;
use super::inflate::Inflater;
use super::options::DecodeOptions;
use crate::bits::BitWriter;
use crate::color::ColorType;
use crate::diagnostics::{Diagnostics, DiagnosticsLevel};
use crate::error::{ChecksumKind, Error, Result, SignatureFault};
use crate::image::{Image, Palette, TextEntry};

/// PNG file signature (magic bytes).
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

const IHDR_LEN: usize = 13;
const MAX_KEYWORD_LEN: usize = 79;
/// Decompressed bytes tolerated past the declared image size before the
/// stream is rejected.
const MAX_SURPLUS: usize = 1 << 16;

/// Check the eight-byte PNG signature, classifying any mismatch.
///
/// A mismatch in the bytes present wins over a short input, so a truncated
/// non-PNG file still reports [`SignatureFault::NotPng`]. A correct prefix
/// shorter than eight bytes (the empty slice included) is
/// [`Error::TruncatedStream`]. `Ok` only for the full signature.
pub fn check_signature(bytes: &[u8]) -> Result<()> {
    let mismatch = |range: std::ops::Range<usize>| {
        bytes
            .iter()
            .zip(&PNG_SIGNATURE)
            .take(range.end)
            .skip(range.start)
            .any(|(a, b)| a != b)
    };
    let fault = if mismatch(0..4) {
        SignatureFault::NotPng
    } else if mismatch(4..6) {
        SignatureFault::CrLfConverted
    } else if mismatch(6..7) {
        SignatureFault::ControlByte
    } else if mismatch(7..8) {
        SignatureFault::LfConverted
    } else if bytes.len() < PNG_SIGNATURE.len() {
        return Err(Error::TruncatedStream(
            "source ended inside the PNG signature".into(),
        ));
    } else {
        return Ok(());
    };
    Err(Error::BadMagic(fault))
}

/// Fields of the `IHDR` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bits per sample.
    pub bit_depth: u8,
    /// Color configuration.
    pub color_type: ColorType,
    /// Compression method; 0 is the only one defined.
    pub compression_method: u8,
    /// Filter method; 0 is the only one defined.
    pub filter_method: u8,
    /// Interlace method; only 0 (none) is supported.
    pub interlace_method: u8,
}

impl Header {
    /// Parse and validate a 13-byte `IHDR` payload.
    ///
    /// Fails before anything is allocated for pixel storage: on a bad
    /// length or zero dimension (`MalformedStream`), on an unknown color
    /// code, a method other than 0, interlacing, or an unsupported bit
    /// depth (`UnsupportedFormat`), and on dimensions beyond `options`.
    pub fn parse(data: &[u8], options: &DecodeOptions) -> Result<Self> {
        if data.len() != IHDR_LEN {
            return Err(Error::MalformedStream(format!(
                "IHDR length {} (expected {IHDR_LEN})",
                data.len()
            )));
        }
        let width = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let height = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if width == 0 || height == 0 {
            return Err(Error::MalformedStream(format!(
                "invalid dimensions {width}x{height}"
            )));
        }
        let color_type = ColorType::try_from(data[9])
            .map_err(|code| Error::UnsupportedFormat(format!("color type {code}")))?;

        let header = Self {
            width,
            height,
            bit_depth: data[8],
            color_type,
            compression_method: data[10],
            filter_method: data[11],
            interlace_method: data[12],
        };

        if header.compression_method != 0 {
            return Err(Error::UnsupportedFormat(format!(
                "compression method {}",
                header.compression_method
            )));
        }
        if header.filter_method != 0 {
            return Err(Error::UnsupportedFormat(format!(
                "filter method {}",
                header.filter_method
            )));
        }
        if header.interlace_method != 0 {
            return Err(Error::UnsupportedFormat(format!(
                "interlace method {}",
                header.interlace_method
            )));
        }
        let depth_ok = match color_type {
            ColorType::Indexed => header.bit_depth == 8,
            _ => matches!(header.bit_depth, 8 | 16),
        };
        if !depth_ok {
            return Err(Error::UnsupportedFormat(format!(
                "bit depth {} for {} images",
                header.bit_depth, color_type
            )));
        }
        if !options.allows(width, height) {
            return Err(Error::UnsupportedFormat(format!(
                "{width}x{height} exceeds the configured size limit"
            )));
        }
        Ok(header)
    }

    /// Bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        self.color_type.bytes_per_pixel(self.bit_depth)
    }

    /// Bytes per reconstructed row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel()
    }

    /// Length of the decompressed image data: one filter byte plus a row
    /// for each scanline.
    pub fn filtered_len(&self) -> Result<usize> {
        (self.stride() + 1)
            .checked_mul(self.height as usize)
            .ok_or_else(|| Error::UnsupportedFormat("image size overflows memory".into()))
    }
}

/// Streaming PNG decoder over any byte source.
///
/// The source is read once, front to back; nothing after `IEND` is read.
pub struct PngDecoder<R: Read> {
    chunks: ChunkReader<R>,
    options: DecodeOptions,
    diagnostics: Diagnostics,
    parked: Option<Chunk>,
    palette: Option<Palette>,
    transparency: Option<Vec<u8>>,
    text: Vec<TextEntry>,
    image_data: Option<Vec<u8>>,
}

impl<R: Read> PngDecoder<R> {
    /// Create a decoder reading from `source`.
    pub fn new(source: R, options: &DecodeOptions) -> Self {
        Self {
            chunks: ChunkReader::new(source),
            options: options.clone(),
            diagnostics: Diagnostics::new(options.diagnostics),
            parked: None,
            palette: None,
            transparency: None,
            text: Vec::new(),
            image_data: None,
        }
    }

    /// Decode the image.
    pub fn decode(self) -> Result<Image> {
        self.run::<io::Sink>(None)
    }

    /// Decode the image, also copying the decompressed (still filtered)
    /// image data stream to `sink` as it is produced.
    pub fn decode_with_sink<W: Write>(self, sink: W) -> Result<Image> {
        self.run(Some(sink))
    }

    fn run<W: Write>(mut self, mut sink: Option<W>) -> Result<Image> {
        self.read_signature()?;
        let header = self.read_header()?;

        loop {
            let chunk = self.next_chunk()?.ok_or_else(|| {
                Error::TruncatedStream("source ended before the IEND chunk".into())
            })?;
            if !self.is_trusted(&chunk)? {
                continue;
            }
            match chunk.kind() {
                ChunkType::Ihdr => {
                    return Err(Error::MalformedStream("duplicate IHDR chunk".into()))
                }
                ChunkType::Plte => self.read_palette(&header, chunk)?,
                ChunkType::Trns => self.read_transparency(&header, chunk)?,
                ChunkType::Text => self.read_text(chunk),
                ChunkType::Idat => {
                    if self.image_data.is_some() {
                        return Err(Error::MalformedStream(
                            "IDAT chunks are not consecutive".into(),
                        ));
                    }
                    let data = self.read_image_data(&header, chunk, sink.take())?;
                    self.image_data = Some(data);
                }
                ChunkType::Iend => {
                    if !chunk.data().is_empty() {
                        self.diagnostics.warn(
                            Some(chunk.tag()),
                            format!("IEND carries {} payload bytes", chunk.data().len()),
                        );
                    }
                    break;
                }
                ChunkType::Other(tag) => {
                    if chunk.is_critical() {
                        self.diagnostics.warn(
                            Some(tag),
                            format!("unknown critical chunk {} ignored", chunk.kind()),
                        );
                    } else {
                        log::debug!("png: ancillary chunk {} ignored", chunk.kind());
                    }
                }
            }
        }

        self.finish(header)
    }

    fn read_signature(&mut self) -> Result<()> {
        let mut signature = [0u8; 8];
        let read = self.chunks.read_raw(&mut signature)?;
        check_signature(&signature[..read])
    }

    fn read_header(&mut self) -> Result<Header> {
        let chunk = self.chunks.next_chunk()?.ok_or_else(|| {
            Error::TruncatedStream("source ended before the IHDR chunk".into())
        })?;
        if chunk.kind() != ChunkType::Ihdr {
            return Err(Error::MissingHeader);
        }
        chunk.verify()?;
        let header = Header::parse(chunk.data(), &self.options)?;
        self.diagnostics.info(
            Some(chunk.tag()),
            format!(
                "{}x{}, {}-bit {}",
                header.width, header.height, header.bit_depth, header.color_type
            ),
        );
        Ok(header)
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        match self.parked.take() {
            Some(chunk) => Ok(Some(chunk)),
            None => self.chunks.next_chunk(),
        }
    }

    /// Apply the CRC policy: a bad critical chunk is fatal, a bad ancillary
    /// chunk is skipped with a warning.
    fn is_trusted(&mut self, chunk: &Chunk) -> Result<bool> {
        if chunk.crc_matches() {
            return Ok(true);
        }
        if chunk.is_critical() {
            chunk.verify()?;
        }
        if !self.options.verify_ancillary_crc {
            return Ok(true);
        }
        self.diagnostics.warn(
            Some(chunk.tag()),
            format!(
                "CRC mismatch (stored {:08X}, computed {:08X}), chunk skipped",
                chunk.stored_crc(),
                chunk.computed_crc()
            ),
        );
        Ok(false)
    }

    fn read_palette(&mut self, header: &Header, chunk: Chunk) -> Result<()> {
        if self.palette.is_some() {
            return Err(Error::MalformedStream("duplicate PLTE chunk".into()));
        }
        if self.image_data.is_some() {
            return Err(Error::MalformedStream("PLTE chunk after image data".into()));
        }
        let palette = Palette::new(header.color_type.palette_entry_width(), chunk.into_data())?;
        log::debug!("png: palette with {} entries", palette.len());
        self.palette = Some(palette);
        Ok(())
    }

    fn read_transparency(&mut self, header: &Header, chunk: Chunk) -> Result<()> {
        if self.transparency.is_some() {
            return Err(Error::MalformedStream("duplicate tRNS chunk".into()));
        }
        if self.image_data.is_some() {
            return Err(Error::MalformedStream("tRNS chunk after image data".into()));
        }
        let len = chunk.data().len();
        match header.color_type {
            ColorType::Indexed => {
                let entries = self
                    .palette
                    .as_ref()
                    .map(Palette::len)
                    .ok_or_else(|| Error::MalformedStream("tRNS chunk before PLTE".into()))?;
                if len > entries {
                    return Err(Error::MalformedStream(format!(
                        "tRNS has {len} entries for a {entries}-entry palette"
                    )));
                }
            }
            ColorType::Gray if len != 2 => {
                return Err(Error::MalformedStream(format!(
                    "tRNS length {len} for a grayscale image (expected 2)"
                )))
            }
            ColorType::Rgb if len != 6 => {
                return Err(Error::MalformedStream(format!(
                    "tRNS length {len} for an RGB image (expected 6)"
                )))
            }
            ColorType::GrayAlpha | ColorType::Rgba => {
                return Err(Error::MalformedStream(format!(
                    "tRNS is not allowed for {} images",
                    header.color_type
                )))
            }
            _ => {}
        }
        self.transparency = Some(chunk.into_data());
        Ok(())
    }

    fn read_text(&mut self, chunk: Chunk) {
        let tag = chunk.tag();
        let data = chunk.data();
        let Some(separator) = data.iter().position(|&b| b == 0) else {
            self.diagnostics
                .warn(Some(tag), "tEXt chunk has no keyword separator, skipped");
            return;
        };
        if separator == 0 || separator > MAX_KEYWORD_LEN {
            self.diagnostics.warn(
                Some(tag),
                format!("tEXt keyword length {separator} out of range, skipped"),
            );
            return;
        }
        let latin1 = |bytes: &[u8]| bytes.iter().map(|&b| b as char).collect::<String>();
        let entry = TextEntry {
            keyword: latin1(&data[..separator]),
            text: latin1(&data[separator + 1..]),
        };
        self.diagnostics
            .info(Some(tag), format!("{}: {}", entry.keyword, entry.text));
        self.text.push(entry);
    }

    /// Stream the run of `IDAT` chunks starting at `first` through the zlib
    /// decoder. Leaves the chunk that ended the run parked.
    fn read_image_data<W: Write>(
        &mut self,
        header: &Header,
        first: Chunk,
        sink: Option<W>,
    ) -> Result<Vec<u8>> {
        if header.color_type == ColorType::Indexed && self.palette.is_none() {
            return Err(Error::MalformedStream(
                "indexed image has no PLTE chunk before its image data".into(),
            ));
        }
        let expected = header.filtered_len()?;
        let tag = first.tag();

        let mut stream = ImageDataStream::new(&mut self.chunks, first);
        let mut inflater = Inflater::build(&mut stream, sink.map(BitWriter::new));
        inflater.reserve(expected);

        match inflate_bounded(&mut inflater, expected.saturating_add(MAX_SURPLUS)) {
            Ok(()) => {}
            Err(Error::ChecksumMismatch {
                kind: ChecksumKind::Stream,
                expected: stored,
                actual: computed,
            }) if !self.options.strict_stream_checksum => {
                self.diagnostics.warn(
                    Some(tag),
                    format!(
                        "Adler-32 mismatch (stored {stored:08X}, computed {computed:08X}), \
                         keeping decoded data"
                    ),
                );
            }
            Err(e) => return Err(e),
        }

        let trailing = inflater.skip_trailing_input()?;
        if trailing > 0 {
            self.diagnostics.warn(
                Some(tag),
                format!("{trailing} bytes after the end of the compressed stream"),
            );
        }
        let window = inflater.header().map_or(0, |h| h.window_size());
        let consumed = inflater.total_in();
        let (data, _, _) = inflater.into_parts()?;

        self.diagnostics.info(
            Some(tag),
            format!(
                "{} IDAT chunks, {} compressed bytes ({} used), window {}, {} bytes out",
                stream.idat_chunks(),
                stream.compressed_len(),
                consumed,
                window,
                data.len()
            ),
        );
        self.parked = stream.into_parked();

        if data.len() > expected {
            self.diagnostics.warn(
                Some(tag),
                format!(
                    "{} surplus bytes of image data ignored",
                    data.len() - expected
                ),
            );
        }
        Ok(data)
    }

    fn finish(self, header: Header) -> Result<Image> {
        let data = self
            .image_data
            .ok_or_else(|| Error::MalformedStream("IEND reached before any IDAT chunk".into()))?;
        let pixels = filter::reconstruct(
            &data,
            header.height as usize,
            header.stride(),
            header.bytes_per_pixel(),
        )?;

        Ok(Image::new(
            header.width,
            header.height,
            header.bit_depth,
            header.color_type,
            pixels,
            self.palette,
            self.transparency,
            self.text,
            self.diagnostics.into_vec(),
        ))
    }
}

/// Run `inflater` to the end of its stream, failing once it has produced
/// more than `bound` bytes.
fn inflate_bounded<R: Read, W: Write>(
    inflater: &mut Inflater<R, W>,
    bound: usize,
) -> Result<()> {
    while !inflater.is_finished() {
        let room = bound.saturating_add(1).saturating_sub(inflater.output().len());
        inflater.decode(room)?;
        if inflater.output().len() > bound {
            return Err(Error::MalformedStream(format!(
                "image data inflates past {bound} bytes"
            )));
        }
    }
    Ok(())
}

/// Decode a PNG from a byte source, reporting diagnostics up to `level`.
pub fn decode_image<R: Read>(source: R, level: DiagnosticsLevel) -> Result<Image> {
    let options = DecodeOptions {
        diagnostics: level,
        ..DecodeOptions::default()
    };
    PngDecoder::new(source, &options).decode()
}

/// Decode a PNG held in memory with default options.
pub fn decode_png(data: &[u8]) -> Result<Image> {
    decode_png_with_options(data, &DecodeOptions::default())
}

/// Decode a PNG held in memory.
pub fn decode_png_with_options(data: &[u8], options: &DecodeOptions) -> Result<Image> {
    PngDecoder::new(data, options).decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::chunk::write_chunk;
    use crate::diagnostics::Severity;

    fn ihdr(width: u32, height: u32, depth: u8, color: u8) -> Vec<u8> {
        let mut data = Vec::with_capacity(13);
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[depth, color, 0, 0, 0]);
        data
    }

    /// Zlib stream holding `raw` in one stored block.
    fn stored_zlib(raw: &[u8]) -> Vec<u8> {
        let mut out = vec![0x78, 0x01, 0x01];
        let len = raw.len() as u16;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(raw);
        out.extend_from_slice(&crate::checksum::adler32(raw).to_be_bytes());
        out
    }

    fn png(chunks: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let mut out = PNG_SIGNATURE.to_vec();
        for (tag, data) in chunks {
            write_chunk(&mut out, tag, data);
        }
        out
    }

    /// 2x1 grayscale image, filter None, pixels [10, 20].
    fn tiny_gray() -> Vec<u8> {
        png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ])
    }

    #[test]
    fn test_signature_faults() {
        assert!(check_signature(&PNG_SIGNATURE).is_ok());
        let cases = [
            (0, SignatureFault::NotPng),
            (2, SignatureFault::NotPng),
            (4, SignatureFault::CrLfConverted),
            (5, SignatureFault::CrLfConverted),
            (6, SignatureFault::ControlByte),
            (7, SignatureFault::LfConverted),
        ];
        for (index, fault) in cases {
            let mut sig = PNG_SIGNATURE;
            sig[index] ^= 0x40;
            match check_signature(&sig) {
                Err(Error::BadMagic(found)) => assert_eq!(found, fault, "byte {index}"),
                other => panic!("byte {index}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_signature_prefix_is_truncated() {
        for len in [0, 1, 7] {
            assert!(
                matches!(
                    check_signature(&PNG_SIGNATURE[..len]),
                    Err(Error::TruncatedStream(_))
                ),
                "{len} bytes"
            );
        }
        assert!(matches!(
            check_signature(b"GIF"),
            Err(Error::BadMagic(SignatureFault::NotPng))
        ));
        // Trailing bytes belong to the first chunk.
        let mut longer = PNG_SIGNATURE.to_vec();
        longer.push(0);
        assert!(check_signature(&longer).is_ok());
    }

    #[test]
    fn test_signature_crlf_to_lf() {
        // A DOS-to-Unix conversion turns CR LF into LF.
        let mut data = vec![0x89, b'P', b'N', b'G', 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(&[0; 16]);
        assert!(matches!(
            decode_png(&data),
            Err(Error::BadMagic(SignatureFault::CrLfConverted))
        ));
    }

    #[test]
    fn test_short_inputs() {
        assert!(matches!(decode_png(&[]), Err(Error::TruncatedStream(_))));
        assert!(matches!(
            decode_png(&PNG_SIGNATURE[..5]),
            Err(Error::TruncatedStream(_))
        ));
        assert!(matches!(
            decode_png(b"GIF89a"),
            Err(Error::BadMagic(SignatureFault::NotPng))
        ));
        assert!(matches!(
            decode_png(&PNG_SIGNATURE),
            Err(Error::TruncatedStream(_))
        ));
    }

    #[test]
    fn test_decode_minimal_stored() {
        let image = decode_png(&tiny_gray()).unwrap();
        assert_eq!(image.width(), 2);
        assert_eq!(image.height(), 1);
        assert_eq!(image.color_type(), ColorType::Gray);
        assert_eq!(image.pixels(), &[10, 20]);
        assert!(image.diagnostics().is_empty());
    }

    #[test]
    fn test_missing_header() {
        let data = png(&[(b"IDAT", stored_zlib(&[0, 1])), (b"IEND", Vec::new())]);
        assert!(matches!(decode_png(&data), Err(Error::MissingHeader)));
    }

    #[test]
    fn test_header_rejections() {
        let mut interlaced = ihdr(1, 1, 8, 0);
        interlaced[12] = 1;
        let mut compressed = ihdr(1, 1, 8, 0);
        compressed[10] = 1;
        let mut filtered = ihdr(1, 1, 8, 0);
        filtered[11] = 1;
        for data in [
            interlaced,
            compressed,
            filtered,
            ihdr(1, 1, 8, 5),
            ihdr(1, 1, 4, 0),
            ihdr(1, 1, 16, 3),
        ] {
            assert!(
                matches!(
                    Header::parse(&data, &DecodeOptions::default()),
                    Err(Error::UnsupportedFormat(_))
                ),
                "{data:?}"
            );
        }
    }

    #[test]
    fn test_header_malformed() {
        let options = DecodeOptions::default();
        assert!(matches!(
            Header::parse(&ihdr(0, 1, 8, 0), &options),
            Err(Error::MalformedStream(_))
        ));
        assert!(matches!(
            Header::parse(&ihdr(1, 1, 8, 0)[..12], &options),
            Err(Error::MalformedStream(_))
        ));
    }

    #[test]
    fn test_header_limits() {
        let options = DecodeOptions {
            max_pixels: 100,
            ..Default::default()
        };
        assert!(Header::parse(&ihdr(10, 10, 8, 6), &options).is_ok());
        assert!(matches!(
            Header::parse(&ihdr(10, 11, 8, 6), &options),
            Err(Error::UnsupportedFormat(_))
        ));
        let huge = Header::parse(&ihdr(1 << 24, 1 << 24, 8, 0), &DecodeOptions::default());
        assert!(huge.is_err());
    }

    #[test]
    fn test_header_geometry() {
        let header = Header::parse(&ihdr(3, 2, 16, 6), &DecodeOptions::default()).unwrap();
        assert_eq!(header.bytes_per_pixel(), 8);
        assert_eq!(header.stride(), 24);
        assert_eq!(header.filtered_len().unwrap(), 50);
    }

    #[test]
    fn test_indexed_with_palette_and_text() {
        let data = png(&[
            (b"IHDR", ihdr(3, 1, 8, 3)),
            (b"PLTE", vec![255, 0, 0, 0, 255, 0]),
            (b"tRNS", vec![0]),
            (b"tEXt", b"Title\0Hello".to_vec()),
            (b"IDAT", stored_zlib(&[0, 1, 0, 1])),
            (b"IEND", Vec::new()),
        ]);
        let options = DecodeOptions {
            diagnostics: DiagnosticsLevel::Info,
            ..Default::default()
        };
        let image = decode_png_with_options(&data, &options).unwrap();
        assert_eq!(image.pixels(), &[1, 0, 1]);
        assert_eq!(image.palette().unwrap().len(), 2);
        assert_eq!(image.transparency(), Some(&[0u8][..]));
        assert_eq!(image.text().len(), 1);
        assert_eq!(image.text()[0].keyword, "Title");
        assert_eq!(image.text()[0].text, "Hello");
        assert_eq!(
            image.expand_palette().unwrap(),
            vec![0, 255, 0, 255, 0, 0, 0, 255, 0]
        );
        assert!(image
            .diagnostics()
            .iter()
            .any(|d| d.severity == Severity::Info && d.message == "Title: Hello"));
    }

    #[test]
    fn test_text_is_latin1() {
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"tEXt", b"Author\0Jos\xE9".to_vec()),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        let image = decode_png(&data).unwrap();
        assert_eq!(image.text()[0].text, "Jos\u{e9}");
    }

    #[test]
    fn test_text_without_separator_warns() {
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"tEXt", b"no separator".to_vec()),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        let image = decode_png(&data).unwrap();
        assert!(image.text().is_empty());
        assert_eq!(image.diagnostics().len(), 1);
        assert_eq!(image.diagnostics()[0].severity, Severity::Warning);
    }

    #[test]
    fn test_indexed_without_palette() {
        let data = png(&[
            (b"IHDR", ihdr(1, 1, 8, 3)),
            (b"IDAT", stored_zlib(&[0, 0])),
            (b"IEND", Vec::new()),
        ]);
        assert!(matches!(decode_png(&data), Err(Error::MalformedStream(_))));
    }

    #[test]
    fn test_palette_length_must_divide() {
        let data = png(&[
            (b"IHDR", ihdr(1, 1, 8, 3)),
            (b"PLTE", vec![1, 2, 3, 4]),
            (b"IDAT", stored_zlib(&[0, 0])),
            (b"IEND", Vec::new()),
        ]);
        assert!(matches!(decode_png(&data), Err(Error::MalformedStream(_))));
    }

    #[test]
    fn test_grayscale_palette_uses_single_bytes() {
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"PLTE", vec![1, 2, 3, 4]),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        let image = decode_png(&data).unwrap();
        assert_eq!(image.palette().unwrap().len(), 4);
    }

    #[test]
    fn test_transparency_rules() {
        let alpha = png(&[
            (b"IHDR", ihdr(1, 1, 8, 6)),
            (b"tRNS", vec![0, 0]),
            (b"IDAT", stored_zlib(&[0, 1, 2, 3, 4])),
            (b"IEND", Vec::new()),
        ]);
        assert!(matches!(decode_png(&alpha), Err(Error::MalformedStream(_))));

        let gray = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"tRNS", vec![0, 10]),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        assert_eq!(decode_png(&gray).unwrap().transparency(), Some(&[0u8, 10][..]));

        let too_many = png(&[
            (b"IHDR", ihdr(1, 1, 8, 3)),
            (b"PLTE", vec![1, 2, 3]),
            (b"tRNS", vec![0, 0]),
            (b"IDAT", stored_zlib(&[0, 0])),
            (b"IEND", Vec::new()),
        ]);
        assert!(matches!(
            decode_png(&too_many),
            Err(Error::MalformedStream(_))
        ));
    }

    fn assert_malformed(data: &[u8], needle: &str) {
        match decode_png(data) {
            Err(Error::MalformedStream(msg)) => assert!(msg.contains(needle), "{msg}"),
            other => panic!("expected MalformedStream({needle}), got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        assert_malformed(&data, "duplicate IHDR");
    }

    #[test]
    fn test_duplicate_palette_rejected() {
        let data = png(&[
            (b"IHDR", ihdr(1, 1, 8, 3)),
            (b"PLTE", vec![1, 2, 3]),
            (b"PLTE", vec![4, 5, 6]),
            (b"IDAT", stored_zlib(&[0, 0])),
            (b"IEND", Vec::new()),
        ]);
        assert_malformed(&data, "duplicate PLTE");
    }

    #[test]
    fn test_palette_after_image_data_rejected() {
        let data = png(&[
            (b"IHDR", ihdr(1, 1, 8, 2)),
            (b"IDAT", stored_zlib(&[0, 1, 2, 3])),
            (b"PLTE", vec![1, 2, 3]),
            (b"IEND", Vec::new()),
        ]);
        assert_malformed(&data, "PLTE chunk after image data");
    }

    #[test]
    fn test_oversized_palette_rejected() {
        let data = png(&[
            (b"IHDR", ihdr(1, 1, 8, 3)),
            (b"PLTE", vec![7; 257 * 3]),
            (b"IDAT", stored_zlib(&[0, 0])),
            (b"IEND", Vec::new()),
        ]);
        assert_malformed(&data, "257 entries");
    }

    #[test]
    fn test_duplicate_transparency_rejected() {
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"tRNS", vec![0, 10]),
            (b"tRNS", vec![0, 20]),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        assert_malformed(&data, "duplicate tRNS");
    }

    #[test]
    fn test_transparency_before_palette_rejected() {
        let data = png(&[
            (b"IHDR", ihdr(1, 1, 8, 3)),
            (b"tRNS", vec![0]),
            (b"PLTE", vec![1, 2, 3]),
            (b"IDAT", stored_zlib(&[0, 0])),
            (b"IEND", Vec::new()),
        ]);
        assert_malformed(&data, "before PLTE");
    }

    #[test]
    fn test_iend_payload_warns() {
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", vec![1, 2, 3]),
        ]);
        let image = decode_png(&data).unwrap();
        assert_eq!(image.pixels(), &[10, 20]);
        assert_eq!(image.diagnostics().len(), 1);
        let warning = &image.diagnostics()[0];
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.chunk, Some(*b"IEND"));
        assert!(warning.message.contains("IEND carries 3"), "{}", warning.message);
    }

    #[test]
    fn test_text_keyword_too_long_warns() {
        let mut text = vec![b'k'; MAX_KEYWORD_LEN + 1];
        text.push(0);
        text.extend_from_slice(b"value");
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"tEXt", text),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        let image = decode_png(&data).unwrap();
        assert!(image.text().is_empty());
        assert_eq!(image.diagnostics().len(), 1);
        let warning = &image.diagnostics()[0];
        assert_eq!(warning.severity, Severity::Warning);
        assert!(warning.message.contains("length 80 out of range"), "{}", warning.message);
    }

    #[test]
    fn test_iend_before_idat() {
        let data = png(&[(b"IHDR", ihdr(1, 1, 8, 0)), (b"IEND", Vec::new())]);
        assert!(matches!(decode_png(&data), Err(Error::MalformedStream(_))));
    }

    #[test]
    fn test_missing_iend() {
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
        ]);
        assert!(matches!(decode_png(&data), Err(Error::TruncatedStream(_))));
    }

    #[test]
    fn test_split_idat_runs_rejected() {
        // The first run holds a complete stream, so only the second run
        // can trip the decoder.
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"tEXt", b"k\0v".to_vec()),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        assert_malformed(&data, "not consecutive");
    }

    #[test]
    fn test_idat_split_across_chunks() {
        let stream = stored_zlib(&[0, 10, 20]);
        let mut chunks: Vec<(&[u8; 4], Vec<u8>)> = vec![(b"IHDR", ihdr(2, 1, 8, 0))];
        for byte in &stream {
            chunks.push((b"IDAT", vec![*byte]));
        }
        chunks.push((b"IEND", Vec::new()));
        let image = decode_png(&png(&chunks)).unwrap();
        assert_eq!(image.pixels(), &[10, 20]);
    }

    #[test]
    fn test_ancillary_crc_failure_skipped() {
        let mut data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"tEXt", b"Title\0Hello".to_vec()),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        // First payload byte of tEXt: signature 8 + IHDR 25 + length/tag 8.
        data[8 + 25 + 8] ^= 0x01;
        let image = decode_png(&data).unwrap();
        assert!(image.text().is_empty());
        assert_eq!(image.diagnostics().len(), 1);
        assert_eq!(image.diagnostics()[0].chunk, Some(*b"tEXt"));

        let trusting = DecodeOptions {
            verify_ancillary_crc: false,
            ..Default::default()
        };
        let image = decode_png_with_options(&data, &trusting).unwrap();
        assert_eq!(image.text()[0].keyword, "Uitle");
    }

    #[test]
    fn test_critical_crc_failure_fatal() {
        let mut data = tiny_gray();
        // Width byte inside IHDR.
        data[8 + 8 + 3] ^= 0x01;
        assert!(matches!(
            decode_png(&data),
            Err(Error::ChecksumMismatch {
                kind: ChecksumKind::Chunk(_),
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_critical_chunk_warns() {
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"ABCD", vec![1, 2, 3]),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        let image = decode_png(&data).unwrap();
        assert_eq!(image.diagnostics().len(), 1);
        assert_eq!(image.diagnostics()[0].severity, Severity::Warning);
    }

    #[test]
    fn test_stream_checksum_policy() {
        let mut stream = stored_zlib(&[0, 10, 20]);
        let last = stream.len() - 1;
        stream[last] ^= 0xFF;
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"IDAT", stream),
            (b"IEND", Vec::new()),
        ]);
        assert!(matches!(
            decode_png(&data),
            Err(Error::ChecksumMismatch {
                kind: ChecksumKind::Stream,
                ..
            })
        ));

        let image = decode_png_with_options(&data, &DecodeOptions::lenient()).unwrap();
        assert_eq!(image.pixels(), &[10, 20]);
        let warnings = image
            .diagnostics()
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_surplus_and_trailing_data_warn() {
        let mut stream = stored_zlib(&[0, 10, 20, 99, 99]);
        stream.extend_from_slice(&[0xEE; 3]);
        let data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"IDAT", stream),
            (b"IEND", Vec::new()),
        ]);
        let image = decode_png(&data).unwrap();
        assert_eq!(image.pixels(), &[10, 20]);
        assert_eq!(image.diagnostics().len(), 2);
    }

    #[test]
    fn test_short_image_data() {
        let data = png(&[
            (b"IHDR", ihdr(2, 2, 8, 0)),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        assert!(matches!(decode_png(&data), Err(Error::MalformedStream(_))));
    }

    #[test]
    fn test_bytes_after_iend_ignored() {
        let mut data = tiny_gray();
        data.extend_from_slice(b"garbage after the end marker");
        assert_eq!(decode_png(&data).unwrap().pixels(), &[10, 20]);
    }

    #[test]
    fn test_decode_with_sink_mirrors_stream() {
        let mut raw = Vec::new();
        let image = PngDecoder::new(tiny_gray().as_slice(), &DecodeOptions::default())
            .decode_with_sink(&mut raw)
            .unwrap();
        assert_eq!(image.pixels(), &[10, 20]);
        assert_eq!(raw, vec![0, 10, 20]);
    }

    #[test]
    fn test_decode_image_silent() {
        let mut data = png(&[
            (b"IHDR", ihdr(2, 1, 8, 0)),
            (b"tEXt", b"k\0v".to_vec()),
            (b"IDAT", stored_zlib(&[0, 10, 20])),
            (b"IEND", Vec::new()),
        ]);
        data[8 + 25 + 8] ^= 0x01;
        let image = decode_image(data.as_slice(), DiagnosticsLevel::Silent).unwrap();
        assert!(image.diagnostics().is_empty());
    }
}
