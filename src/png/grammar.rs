use crate::error::{EncodeError, Result};
use crate::{fail, require};

pub const PNG_SIGNATURE: [u8; 8] = *b"\x89PNG\r\n\x1A\n";

const MAX_DIMENSION: u32 = i32::MAX as u32;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ColorType {
    Grayscale = 0,
    RGB = 2,
    Palette = 3,
    GrayscaleAlpha = 4,
    RGBA = 6,
}

impl ColorType {
    pub const fn num_channels(&self) -> u8 {
        match self {
            Self::Grayscale => 1,
            Self::RGB => 3,
            Self::Palette => 1,
            Self::GrayscaleAlpha => 2,
            Self::RGBA => 4,
        }
    }
}

impl TryFrom<u8> for ColorType {
    type Error = EncodeError;

    fn try_from(value: u8) -> Result<Self> {
        let val = match value {
            0 => Self::Grayscale,
            2 => Self::RGB,
            3 => Self::Palette,
            4 => Self::GrayscaleAlpha,
            6 => Self::RGBA,
            foreign => fail!(Config, "Unrecognized color type: {}", foreign),
        };

        Ok(val)
    }
}

/// The five prediction filters of PNG filter method 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Filter {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

impl Filter {
    pub const ALL: [Self; 5] = [Self::None, Self::Sub, Self::Up, Self::Average, Self::Paeth];

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Filter {
    type Error = EncodeError;

    fn try_from(value: u8) -> Result<Self> {
        let filter = match value {
            0 => Self::None,
            1 => Self::Sub,
            2 => Self::Up,
            3 => Self::Average,
            4 => Self::Paeth,
            foreign => fail!(Config, "Unrecognized filter type: {}", foreign),
        };

        Ok(filter)
    }
}

/// Immutable description of the image being written.
///
/// All the derived sizes are computed once, in [`ImageInfo::new`], and never
/// change for the lifetime of a writer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub(crate) cols: u32,
    pub(crate) rows: u32,
    pub(crate) bit_depth: u8,
    pub(crate) channels: u8,
    pub(crate) alpha: bool,
    pub(crate) greyscale: bool,
    pub(crate) indexed: bool,

    pub(crate) bits_per_pixel: usize,
    pub(crate) bytes_pixel: usize,
    pub(crate) bytes_per_row: usize,
    pub(crate) samples_per_row: usize,
    pub(crate) samples_per_row_packed: usize,
}

impl ImageInfo {
    pub fn new(
        cols: u32,
        rows: u32,
        bit_depth: u8,
        alpha: bool,
        greyscale: bool,
        indexed: bool,
    ) -> Result<Self> {
        require!(
            (1..=MAX_DIMENSION).contains(&cols) && (1..=MAX_DIMENSION).contains(&rows),
            Config,
            "Invalid image dimensions: {}x{}",
            cols,
            rows
        );
        require!(
            matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
            Config,
            "Invalid bit depth: {}",
            bit_depth
        );

        if indexed {
            require!(!greyscale, Config, "An indexed image cannot be greyscale");
            require!(!alpha, Config, "An indexed image cannot carry an alpha channel");
            require!(bit_depth <= 8, Config, "Indexed images allow at most 8 bits");
        } else if bit_depth < 8 {
            require!(
                greyscale && !alpha,
                Config,
                "Only greyscale or indexed images allow bit depth {}",
                bit_depth
            );
        }

        let channels: u8 = match (greyscale || indexed, alpha) {
            (true, false) => 1,
            (true, true) => 2,
            (false, false) => 3,
            (false, true) => 4,
        };

        let bits_per_pixel = channels as usize * bit_depth as usize;
        let row_bits = bits_per_pixel as u64 * cols as u64;
        let bytes_per_row = usize::try_from(row_bits.div_ceil(8))
            .ok()
            .filter(|&n| n < u32::MAX as usize)
            .ok_or_else(|| EncodeError::Config(format!("Row too long: {} columns", cols)))?;

        let samples_per_row = cols as usize * channels as usize;

        Ok(Self {
            cols,
            rows,
            bit_depth,
            channels,
            alpha,
            greyscale,
            indexed,
            bits_per_pixel,
            bytes_pixel: (bits_per_pixel / 8).max(1),
            bytes_per_row,
            samples_per_row,
            samples_per_row_packed: if bit_depth < 8 {
                bytes_per_row
            } else {
                samples_per_row
            },
        })
    }

    pub fn greyscale(cols: u32, rows: u32, bit_depth: u8) -> Result<Self> {
        Self::new(cols, rows, bit_depth, false, true, false)
    }

    pub fn greyscale_alpha(cols: u32, rows: u32, bit_depth: u8) -> Result<Self> {
        Self::new(cols, rows, bit_depth, true, true, false)
    }

    pub fn rgb(cols: u32, rows: u32, bit_depth: u8) -> Result<Self> {
        Self::new(cols, rows, bit_depth, false, false, false)
    }

    pub fn rgba(cols: u32, rows: u32, bit_depth: u8) -> Result<Self> {
        Self::new(cols, rows, bit_depth, true, false, false)
    }

    pub fn indexed(cols: u32, rows: u32, bit_depth: u8) -> Result<Self> {
        Self::new(cols, rows, bit_depth, false, false, true)
    }

    pub const fn cols(&self) -> u32 {
        self.cols
    }

    pub const fn rows(&self) -> u32 {
        self.rows
    }

    pub const fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub const fn channels(&self) -> u8 {
        self.channels
    }

    pub const fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub const fn is_greyscale(&self) -> bool {
        self.greyscale
    }

    pub const fn has_alpha(&self) -> bool {
        self.alpha
    }

    pub const fn is_packed(&self) -> bool {
        self.bit_depth < 8
    }

    /// Distance, in bytes, between a byte and the corresponding byte of the
    /// pixel to its left. At least 1, even for packed formats.
    pub const fn bytes_pixel(&self) -> usize {
        self.bytes_pixel
    }

    /// Sample bytes in one row, without the leading filter type byte.
    pub const fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub const fn samples_per_row(&self) -> usize {
        self.samples_per_row
    }

    pub const fn samples_per_row_packed(&self) -> usize {
        self.samples_per_row_packed
    }

    pub const fn color_type(&self) -> ColorType {
        let mut model = 0;
        if self.alpha {
            model += 0x04;
        }
        if self.indexed {
            model += 0x01;
        }
        if !self.greyscale {
            model += 0x02;
        }

        match model {
            0 => ColorType::Grayscale,
            2 => ColorType::RGB,
            3 => ColorType::Palette,
            4 => ColorType::GrayscaleAlpha,
            _ => ColorType::RGBA,
        }
    }

    /// Bytes the uncompressed image data stream holds: every row plus its
    /// filter type byte.
    pub const fn raw_stream_len(&self) -> u64 {
        (self.bytes_per_row as u64 + 1) * self.rows as u64
    }
}
