//! Synthetic test image generation.
//!
//! Deterministic patterns and seeded noise, returned as raw pixel rows for
//! a given width, height and bytes per pixel.

#![allow(dead_code)]

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Every byte set to `value`.
pub fn solid(width: u32, height: u32, bpp: usize, value: u8) -> Vec<u8> {
    vec![value; width as usize * height as usize * bpp]
}

/// Each sample increases left to right, then wraps.
pub fn gradient(width: u32, height: u32, bpp: usize) -> Vec<u8> {
    let stride = width as usize * bpp;
    let mut pixels = Vec::with_capacity(stride * height as usize);
    for y in 0..height as usize {
        for x in 0..stride {
            pixels.push(((x * 255) / stride.max(1)) as u8 ^ (y as u8));
        }
    }
    pixels
}

/// Alternating blocks of 0 and 255, `cell` pixels wide.
pub fn checkerboard(width: u32, height: u32, bpp: usize, cell: u32) -> Vec<u8> {
    let cell = cell.max(1);
    let mut pixels = Vec::with_capacity(width as usize * height as usize * bpp);
    for y in 0..height {
        for x in 0..width {
            let on = ((x / cell) + (y / cell)) % 2 == 0;
            let v = if on { 255 } else { 0 };
            pixels.extend(std::iter::repeat(v).take(bpp));
        }
    }
    pixels
}

/// Seeded random bytes; the same seed always gives the same image.
pub fn noise(width: u32, height: u32, bpp: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pixels = vec![0u8; width as usize * height as usize * bpp];
    rng.fill(&mut pixels[..]);
    pixels
}

/// Seeded random palette indices below `entries`.
pub fn indices(width: u32, height: u32, entries: u8, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..width as usize * height as usize)
        .map(|_| rng.gen_range(0..entries))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_is_deterministic() {
        assert_eq!(noise(4, 4, 3, 42), noise(4, 4, 3, 42));
        assert_ne!(noise(4, 4, 3, 42), noise(4, 4, 3, 43));
    }

    #[test]
    fn test_sizes() {
        assert_eq!(solid(3, 2, 4, 7).len(), 24);
        assert_eq!(gradient(5, 3, 2).len(), 30);
        assert_eq!(checkerboard(4, 4, 1, 2).len(), 16);
        assert!(indices(8, 8, 3, 1).iter().all(|&i| i < 3));
    }
}
