//! # pixdec
//!
//! A PNG decoder with its own zlib/DEFLATE implementation.
//!
//! The decoder reads any byte source once, front to back. Chunk CRCs and
//! the zlib Adler-32 are checked, compressed image data is streamed out of
//! the `IDAT` chunks straight into the inflater, and scanline filters are
//! undone before the image is returned.
//!
//! ## Features
//!
//! - **Non-interlaced PNG** at 8 and 16 bits per sample, all five color types
//! - **Streaming zlib decoder** with stored, fixed and dynamic Huffman blocks
//! - **Leveled diagnostics** for recovered problems and text metadata
//! - Optional batch decoding on the rayon pool via the `parallel` feature
//! - Optional `pixdec` command-line tool via the `cli` feature
//!
//! ## Example
//!
//! ```rust
//! use pixdec::{decode_png, Error};
//!
//! match decode_png(b"definitely not a png") {
//!     Err(Error::BadMagic(fault)) => println!("rejected: {fault}"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bits;
pub mod checksum;
pub mod color;
pub mod decode;
pub mod diagnostics;
pub mod error;
pub mod image;

pub use color::ColorType;
#[cfg(feature = "parallel")]
pub use decode::decode_many;
pub use decode::{
    decode_image, decode_png, decode_png_with_options, inflate_zlib, DecodeOptions, PngDecoder,
};
pub use diagnostics::{Diagnostic, DiagnosticsLevel, Severity};
pub use error::{ChecksumKind, Error, Result, SignatureFault};
pub use image::{Image, Palette, TextEntry};
