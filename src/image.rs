//! The decoded image.

use crate::color::ColorType;
use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};

/// Palette from a `PLTE` chunk.
///
/// Entries are three bytes wide for RGB color models and one byte wide
/// for grayscale ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entry_width: usize,
    data: Vec<u8>,
}

impl Palette {
    /// Split a `PLTE` payload into entries of `entry_width` bytes.
    ///
    /// The payload must divide evenly and hold between 1 and 256 entries.
    pub fn new(entry_width: usize, data: Vec<u8>) -> Result<Self> {
        debug_assert!(entry_width == 1 || entry_width == 3);
        if data.is_empty() || data.len() % entry_width != 0 {
            return Err(Error::MalformedStream(format!(
                "palette length {} is not a multiple of {entry_width}",
                data.len()
            )));
        }
        let entries = data.len() / entry_width;
        if entries > 256 {
            return Err(Error::MalformedStream(format!(
                "palette has {entries} entries (max 256)"
            )));
        }
        Ok(Self { entry_width, data })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.len() / self.entry_width
    }

    /// Always false for a validated palette.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes per entry (1 or 3).
    pub fn entry_width(&self) -> usize {
        self.entry_width
    }

    /// Entry at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(self.entry_width)?;
        self.data.get(start..start + self.entry_width)
    }

    /// Iterate over entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.entry_width)
    }

    /// The packed entries.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// A `tEXt` keyword/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    /// Keyword (1-79 Latin-1 characters).
    pub keyword: String,
    /// Text, decoded from Latin-1.
    pub text: String,
}

/// A fully decoded, non-interlaced PNG image.
///
/// `pixels` holds `height` rows of `stride` bytes with filters undone;
/// 16-bit samples stay big-endian. Indexed images keep their palette
/// indices; see [`expand_palette`](Image::expand_palette).
#[derive(Debug, Clone)]
pub struct Image {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: ColorType,
    pixels: Vec<u8>,
    palette: Option<Palette>,
    transparency: Option<Vec<u8>>,
    text: Vec<TextEntry>,
    diagnostics: Vec<Diagnostic>,
}

impl Image {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        width: u32,
        height: u32,
        bit_depth: u8,
        color_type: ColorType,
        pixels: Vec<u8>,
        palette: Option<Palette>,
        transparency: Option<Vec<u8>>,
        text: Vec<TextEntry>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        debug_assert_eq!(
            pixels.len(),
            height as usize * width as usize * color_type.bytes_per_pixel(bit_depth)
        );
        Self {
            width,
            height,
            bit_depth,
            color_type,
            pixels,
            palette,
            transparency,
            text,
            diagnostics,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bits per sample (8 or 16).
    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Color configuration from the header.
    pub fn color_type(&self) -> ColorType {
        self.color_type
    }

    /// Bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        self.color_type.bytes_per_pixel(self.bit_depth)
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel()
    }

    /// Reconstructed pixel rows, `height * stride` bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// One row of pixels.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let stride = self.stride();
        let start = (y as usize).checked_mul(stride)?;
        self.pixels.get(start..start + stride)
    }

    /// Consume the image, returning its pixel bytes.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// The palette, if a `PLTE` chunk was present.
    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Raw `tRNS` payload, if present.
    pub fn transparency(&self) -> Option<&[u8]> {
        self.transparency.as_deref()
    }

    /// Text metadata, in file order.
    pub fn text(&self) -> &[TextEntry] {
        &self.text
    }

    /// Conditions reported while decoding, filtered by the requested level.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Replace palette indices with palette entries.
    ///
    /// Returns RGB bytes (or gray bytes for a one-byte-entry palette). Other
    /// color types return their pixels unchanged.
    pub fn expand_palette(&self) -> Result<Vec<u8>> {
        let palette = match (self.color_type, &self.palette) {
            (ColorType::Indexed, Some(palette)) => palette,
            (ColorType::Indexed, None) => {
                return Err(Error::MalformedStream("indexed image without a palette".into()))
            }
            _ => return Ok(self.pixels.clone()),
        };

        let mut out = Vec::with_capacity(self.pixels.len() * palette.entry_width());
        for &index in &self.pixels {
            let entry = palette.get(index as usize).ok_or_else(|| {
                Error::MalformedStream(format!(
                    "palette index {index} out of range ({} entries)",
                    palette.len()
                ))
            })?;
            out.extend_from_slice(entry);
        }
        Ok(out)
    }
}
