//! PNG and zlib decoding.
//!
//! [`decode_png`] covers the common case. The submodules expose the layers
//! underneath: bit reading, Huffman trees, DEFLATE blocks, the zlib stream,
//! chunk framing and scanline filters.

pub mod bit_reader;
pub mod block;
pub mod chunk;
pub mod filter;
pub mod huffman;
pub mod inflate;
pub mod options;
mod png;

pub use bit_reader::BitReader;
pub use chunk::{Chunk, ChunkReader, ChunkType, ImageDataStream};
pub use filter::FilterType;
pub use inflate::{inflate_zlib, Inflater, ZlibHeader};
pub use options::DecodeOptions;
pub use png::{
    check_signature, decode_image, decode_png, decode_png_with_options, Header, PngDecoder,
    PNG_SIGNATURE,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Decode several in-memory PNGs concurrently, one decode per task.
///
/// Results come back in input order; one failure does not affect the others.
#[cfg(feature = "parallel")]
pub fn decode_many(
    inputs: &[&[u8]],
    options: &DecodeOptions,
) -> Vec<crate::error::Result<crate::image::Image>> {
    inputs
        .par_iter()
        .map(|data| decode_png_with_options(data, options))
        .collect()
}
