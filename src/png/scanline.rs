use crate::error::Result;
use crate::png::grammar::ImageInfo;
use crate::require;

/// One row of pixels handed to the writer.
#[derive(Debug, Copy, Clone)]
pub enum Scanline<'a> {
    /// One unpacked sample per element, for any bit depth.
    Samples(&'a [u16]),
    /// One unpacked sample per byte, for bit depths up to 8.
    Bytes(&'a [u8]),
    /// Bytes already laid out as a PNG row: packed, 16-bit big-endian.
    Packed(&'a [u8]),
}

impl<'a> From<&'a [u16]> for Scanline<'a> {
    fn from(samples: &'a [u16]) -> Self {
        Self::Samples(samples)
    }
}

impl<'a> From<&'a [u8]> for Scanline<'a> {
    fn from(samples: &'a [u8]) -> Self {
        Self::Bytes(samples)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Scanline<'a> {
    fn from(samples: &'a [u8; N]) -> Self {
        Self::Bytes(samples)
    }
}

impl<'a, const N: usize> From<&'a [u16; N]> for Scanline<'a> {
    fn from(samples: &'a [u16; N]) -> Self {
        Self::Samples(samples)
    }
}

impl<'a> From<&'a Vec<u8>> for Scanline<'a> {
    fn from(samples: &'a Vec<u8>) -> Self {
        Self::Bytes(samples)
    }
}

impl<'a> From<&'a Vec<u16>> for Scanline<'a> {
    fn from(samples: &'a Vec<u16>) -> Self {
        Self::Samples(samples)
    }
}

impl Scanline<'_> {
    /// Writes the row into `raw[1..]`, the sample slots of a raw row buffer.
    pub(crate) fn to_png_raw(&self, info: &ImageInfo, raw: &mut [u8]) -> Result<()> {
        debug_assert_eq!(raw.len(), info.bytes_per_row() + 1);

        let out = &mut raw[1..];

        match *self {
            Self::Packed(bytes) => {
                require!(
                    bytes.len() == info.bytes_per_row(),
                    InvalidScanline,
                    "expected {} packed bytes, got {}",
                    info.bytes_per_row(),
                    bytes.len()
                );
                out.copy_from_slice(bytes);
            }
            Self::Bytes(samples) => {
                require!(
                    info.bit_depth() <= 8,
                    InvalidScanline,
                    "byte samples cannot hold bit depth {}",
                    info.bit_depth()
                );
                pack_samples(info, samples.iter().map(|&s| s as u16), samples.len(), out)?;
            }
            Self::Samples(samples) => {
                pack_samples(info, samples.iter().copied(), samples.len(), out)?;
            }
        }

        Ok(())
    }
}

fn pack_samples(
    info: &ImageInfo,
    samples: impl Iterator<Item = u16>,
    len: usize,
    out: &mut [u8],
) -> Result<()> {
    require!(
        len == info.samples_per_row(),
        InvalidScanline,
        "expected {} samples, got {}",
        info.samples_per_row(),
        len
    );

    let depth = info.bit_depth();
    let max = ((1u32 << depth) - 1) as u16;

    match depth {
        16 => {
            for (pair, sample) in out.chunks_exact_mut(2).zip(samples) {
                pair.copy_from_slice(&sample.to_be_bytes());
            }
        }
        8 => {
            for (b, sample) in out.iter_mut().zip(samples) {
                require!(sample <= max, InvalidScanline, "sample {} exceeds 8 bits", sample);
                *b = sample as u8;
            }
        }
        _ => {
            let per_byte = 8 / depth as usize;
            out.fill(0);

            for (i, sample) in samples.enumerate() {
                require!(
                    sample <= max,
                    InvalidScanline,
                    "sample {} exceeds {} bits",
                    sample,
                    depth
                );
                let shift = 8 - depth as usize * (i % per_byte + 1);
                out[i / per_byte] |= (sample as u8) << shift;
            }
        }
    }

    Ok(())
}
