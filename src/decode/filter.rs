//! Scanline filter reconstruction.
//!
//! Each row of decompressed image data starts with a filter type byte. The
//! filter predicted every byte from its left neighbour (one pixel back), the
//! byte above, and the byte above-left; undoing it adds the prediction back.
//! Rows are reconstructed top to bottom because each depends on the row above
//! in its final form.

use crate::error::{Error, Result};

/// Per-row filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FilterType {
    /// Bytes stored as-is.
    None = 0,
    /// Difference from the byte one pixel to the left.
    Sub = 1,
    /// Difference from the byte above.
    Up = 2,
    /// Difference from the floor average of left and above.
    Average = 3,
    /// Difference from the Paeth predictor of left, above and above-left.
    Paeth = 4,
}

impl TryFrom<u8> for FilterType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FilterType::None),
            1 => Ok(FilterType::Sub),
            2 => Ok(FilterType::Up),
            3 => Ok(FilterType::Average),
            4 => Ok(FilterType::Paeth),
            _ => Err(Error::MalformedStream(format!(
                "invalid filter type: {value}"
            ))),
        }
    }
}

/// Undo `filter` on `row` in place.
///
/// `prev` is the already reconstructed row above (all zeros for the first
/// row) and must be as long as `row`. `bpp` is bytes per pixel, at least 1.
pub fn unfilter_row(filter: FilterType, row: &mut [u8], prev: &[u8], bpp: usize) {
    debug_assert_eq!(row.len(), prev.len());
    match filter {
        FilterType::None => {}
        FilterType::Sub => {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        FilterType::Up => {
            for (byte, &above) in row.iter_mut().zip(prev) {
                *byte = byte.wrapping_add(above);
            }
        }
        FilterType::Average => {
            for i in 0..row.len() {
                let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                let above = prev[i] as u16;
                row[i] = row[i].wrapping_add(((left + above) / 2) as u8);
            }
        }
        FilterType::Paeth => {
            for i in 0..row.len() {
                let (left, upper_left) = if i >= bpp {
                    (row[i - bpp], prev[i - bpp])
                } else {
                    (0, 0)
                };
                row[i] = row[i].wrapping_add(paeth_predictor(left, prev[i], upper_left));
            }
        }
    }
}

/// Paeth predictor: whichever of `a` (left), `b` (above), `c` (upper left)
/// is closest to `a + b - c`, ties broken in that order.
#[inline]
pub fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Reconstruct `height` rows of `stride` bytes from filtered scanlines.
///
/// `data` holds `height` records of one filter byte plus `stride` bytes;
/// anything past that is ignored. Returns exactly `height * stride` bytes.
pub fn reconstruct(data: &[u8], height: usize, stride: usize, bpp: usize) -> Result<Vec<u8>> {
    let record = stride + 1;
    let needed = record
        .checked_mul(height)
        .ok_or_else(|| Error::UnsupportedFormat("image size overflows memory".into()))?;
    if data.len() < needed {
        return Err(Error::MalformedStream(format!(
            "image data too short: {} of {} bytes",
            data.len(),
            needed
        )));
    }

    let mut pixels = vec![0u8; height * stride];
    let zero_row = vec![0u8; stride];

    for (y, filtered) in data[..needed].chunks_exact(record).enumerate() {
        let filter = FilterType::try_from(filtered[0])?;
        let (done, rest) = pixels.split_at_mut(y * stride);
        let row = &mut rest[..stride];
        row.copy_from_slice(&filtered[1..]);

        let prev = if y == 0 {
            zero_row.as_slice()
        } else {
            &done[(y - 1) * stride..]
        };
        unfilter_row(filter, row, prev, bpp);
    }

    Ok(pixels)
}
