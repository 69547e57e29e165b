//! Fuzz target for PNG decoding.
//!
//! Arbitrary bytes behind a valid signature must decode or fail cleanly.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pixdec::{decode_png_with_options, DecodeOptions};

fuzz_target!(|data: &[u8]| {
    // Keep allocations bounded
    let options = DecodeOptions {
        max_dimension: 4096,
        max_pixels: 1 << 22,
        ..Default::default()
    };

    let mut input = pixdec::decode::PNG_SIGNATURE.to_vec();
    input.extend_from_slice(data);

    if let Ok(image) = decode_png_with_options(&input, &options) {
        assert_eq!(
            image.pixels().len(),
            image.stride() * image.height() as usize,
            "pixel buffer does not match the header geometry"
        );
        if image.palette().is_some() {
            let _ = image.expand_palette();
        }
    }
});
