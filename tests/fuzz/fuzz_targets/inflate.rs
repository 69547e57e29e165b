//! Fuzz target for zlib inflate.
//!
//! Decoding arbitrary streams must never panic, and decoding in small steps
//! must agree with decoding in one go.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pixdec::decode::Inflater;
use pixdec::inflate_zlib;

/// Structured input for inflate fuzzing.
#[derive(Arbitrary, Debug)]
struct InflateInput {
    /// Output budget per decode call (clamped to 1..=4096)
    step: u16,
    /// Compressed stream
    data: Vec<u8>,
}

fuzz_target!(|input: InflateInput| {
    // Limit input size to avoid OOM
    if input.data.len() > 64 * 1024 {
        return;
    }

    let one_shot = inflate_zlib(&input.data);

    let step = (input.step as usize % 4096).max(1);
    let mut inflater = Inflater::new(input.data.as_slice());
    let stepped = loop {
        match inflater.decode(step) {
            Ok(_) if inflater.is_finished() => break Ok(()),
            Ok(n) => assert!(n <= step, "decode produced more than its limit"),
            Err(e) => break Err(e),
        }
    };

    match (one_shot, stepped) {
        (Ok(output), Ok(())) => assert_eq!(output, inflater.output()),
        (Err(_), Err(_)) => {}
        (a, b) => panic!("one-shot {a:?} disagrees with stepped {b:?}"),
    }
});
