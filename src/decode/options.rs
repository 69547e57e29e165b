//! Decoder configuration.

use crate::diagnostics::DiagnosticsLevel;

/// Default per-side limit (16 million pixels).
pub const DEFAULT_MAX_DIMENSION: u32 = 1 << 24;

/// Default total pixel limit (256 megapixels).
pub const DEFAULT_MAX_PIXELS: u64 = 1 << 28;

/// PNG decoding options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Which non-fatal conditions are reported.
    pub diagnostics: DiagnosticsLevel,
    /// Largest accepted width x height, checked before any allocation.
    pub max_pixels: u64,
    /// Largest accepted width or height.
    pub max_dimension: u32,
    /// Treat an Adler-32 mismatch in the image data as fatal. When false the
    /// mismatch becomes a warning and the decoded pixels are returned.
    pub strict_stream_checksum: bool,
    /// Check CRCs of ancillary chunks. Critical chunks are always checked.
    pub verify_ancillary_crc: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::strict()
    }
}

impl DecodeOptions {
    /// Every checksum enforced; warnings reported.
    pub fn strict() -> Self {
        Self {
            diagnostics: DiagnosticsLevel::Warnings,
            max_pixels: DEFAULT_MAX_PIXELS,
            max_dimension: DEFAULT_MAX_DIMENSION,
            strict_stream_checksum: true,
            verify_ancillary_crc: true,
        }
    }

    /// Stream checksum mismatches downgraded to warnings; notes reported too.
    pub fn lenient() -> Self {
        Self {
            diagnostics: DiagnosticsLevel::Info,
            strict_stream_checksum: false,
            ..Self::strict()
        }
    }

    /// Whether `width` x `height` fits within the configured limits.
    pub fn allows(&self, width: u32, height: u32) -> bool {
        width <= self.max_dimension
            && height <= self.max_dimension
            && u64::from(width) * u64::from(height) <= self.max_pixels
    }
}
