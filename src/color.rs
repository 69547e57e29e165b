//! Color configurations a PNG header can declare.

/// Color type from the PNG header, by its on-disk code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColorType {
    /// Grayscale (code 0).
    Gray = 0,
    /// RGB (code 2).
    Rgb = 2,
    /// Palette indices (code 3).
    Indexed = 3,
    /// Grayscale with alpha (code 4).
    GrayAlpha = 4,
    /// RGB with alpha (code 6).
    Rgba = 6,
}

impl ColorType {
    /// Samples per pixel.
    #[inline]
    pub const fn channels(self) -> usize {
        match self {
            ColorType::Gray | ColorType::Indexed => 1,
            ColorType::GrayAlpha => 2,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
        }
    }

    /// Bytes per pixel at the given bit depth (8 or 16).
    #[inline]
    pub const fn bytes_per_pixel(self, bit_depth: u8) -> usize {
        self.channels() * (bit_depth as usize / 8)
    }

    /// Whether pixels carry their own alpha sample.
    #[inline]
    pub const fn has_alpha(self) -> bool {
        matches!(self, ColorType::GrayAlpha | ColorType::Rgba)
    }

    /// Whether the color model is RGB rather than grayscale.
    ///
    /// Palette-indexed images are RGB: their palette entries are triples.
    #[inline]
    pub const fn is_rgb(self) -> bool {
        matches!(self, ColorType::Rgb | ColorType::Indexed | ColorType::Rgba)
    }

    /// Width of one `PLTE` entry for this color type: 3 for RGB models, 1 for gray.
    #[inline]
    pub const fn palette_entry_width(self) -> usize {
        if self.is_rgb() {
            3
        } else {
            1
        }
    }

    /// The header's color type code.
    #[inline]
    pub const fn png_code(self) -> u8 {
        self as u8
    }

    /// Short lowercase name, used in summaries.
    pub const fn name(self) -> &'static str {
        match self {
            ColorType::Gray => "gray",
            ColorType::Rgb => "rgb",
            ColorType::Indexed => "indexed",
            ColorType::GrayAlpha => "gray+alpha",
            ColorType::Rgba => "rgba",
        }
    }
}

impl TryFrom<u8> for ColorType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ColorType::Gray),
            2 => Ok(ColorType::Rgb),
            3 => Ok(ColorType::Indexed),
            4 => Ok(ColorType::GrayAlpha),
            6 => Ok(ColorType::Rgba),
            other => Err(other),
        }
    }
}

impl From<ColorType> for u8 {
    fn from(color: ColorType) -> Self {
        color.png_code()
    }
}

impl std::fmt::Display for ColorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
