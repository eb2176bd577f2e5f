//! Scanline prediction filters.
//!
//! Rows are laid out the way they travel in the image data stream: slot 0
//! holds the filter type byte and slots `1..=bytes_per_row` hold the samples.
//! Slot 0 of a raw row carries no pixel data and is never read.

use crate::png::grammar::Filter;

#[inline]
pub const fn paeth_predict(left: u8, up: u8, up_left: u8) -> u8 {
    let (a, b, c) = (left as i16, up as i16, up_left as i16);

    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        up_left
    }
}

/// Writes `filter` applied to `raw` into `out`. `prev` is the previous raw
/// row, all zeroes for the first row of the image.
pub fn filter_row(filter: Filter, raw: &[u8], prev: &[u8], bytes_pixel: usize, out: &mut [u8]) {
    debug_assert_eq!(raw.len(), prev.len());
    debug_assert_eq!(raw.len(), out.len());

    out[0] = filter as u8;
    let n = raw.len();

    match filter {
        Filter::None => out[1..].copy_from_slice(&raw[1..]),
        Filter::Sub => {
            let head = (bytes_pixel + 1).min(n);
            out[1..head].copy_from_slice(&raw[1..head]);
            for i in head..n {
                out[i] = raw[i].wrapping_sub(raw[i - bytes_pixel]);
            }
        }
        Filter::Up => {
            for i in 1..n {
                out[i] = raw[i].wrapping_sub(prev[i]);
            }
        }
        Filter::Average => {
            for i in 1..n {
                let left = if i > bytes_pixel { raw[i - bytes_pixel] } else { 0 };
                let avg = (prev[i] as u16 + left as u16) / 2;
                out[i] = raw[i].wrapping_sub(avg as u8);
            }
        }
        Filter::Paeth => {
            for i in 1..n {
                let (left, up_left) = if i > bytes_pixel {
                    (raw[i - bytes_pixel], prev[i - bytes_pixel])
                } else {
                    (0, 0)
                };
                out[i] = raw[i].wrapping_sub(paeth_predict(left, prev[i], up_left));
            }
        }
    }
}

/// Inverse of [`filter_row`]: rebuilds the raw row in `out` from `filtered`
/// and the previously reconstructed row.
pub fn unfilter_row(
    filter: Filter,
    filtered: &[u8],
    prev: &[u8],
    bytes_pixel: usize,
    out: &mut [u8],
) {
    debug_assert_eq!(filtered.len(), prev.len());
    debug_assert_eq!(filtered.len(), out.len());

    out[0] = 0;
    let n = filtered.len();

    for i in 1..n {
        let (left, up_left) = if i > bytes_pixel {
            (out[i - bytes_pixel], prev[i - bytes_pixel])
        } else {
            (0, 0)
        };
        let up = prev[i];

        let predicted = match filter {
            Filter::None => 0,
            Filter::Sub => left,
            Filter::Up => up,
            Filter::Average => ((left as u16 + up as u16) / 2) as u8,
            Filter::Paeth => paeth_predict(left, up, up_left),
        };

        out[i] = filtered[i].wrapping_add(predicted);
    }
}

/// Sum of the filtered bytes read as signed values. Lower is usually more
/// compressible.
pub fn filtered_cost(filtered: &[u8]) -> u32 {
    filtered[1..]
        .iter()
        .map(|&b| (b as i8).unsigned_abs() as u32)
        .sum()
}
