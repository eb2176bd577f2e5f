use crate::error::Result;
use crate::png::filter_strategy::FilterType;
use crate::png::idat::DEFAULT_IDAT_MAX_SIZE;
use crate::require;
use miniz_oxide::deflate::core::CompressionStrategy;

/// Largest payload a single PNG chunk may declare.
pub const MAX_CHUNK_LEN: usize = (1 << 31) - 1;

/// Hint handed to the deflate compressor about the shape of its input.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DeflateStrategy {
    /// Tuned for filtered image rows: favors Huffman coding over short matches.
    #[default]
    Filtered,
    Default,
    HuffmanOnly,
}

impl DeflateStrategy {
    pub(crate) const fn miniz_code(self) -> i32 {
        let strategy = match self {
            Self::Filtered => CompressionStrategy::Filtered,
            Self::Default => CompressionStrategy::Default,
            Self::HuffmanOnly => CompressionStrategy::HuffmanOnly,
        };

        strategy as i32
    }
}

/// Writer parameters. They can only change before the first row is written.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    compression_level: u8,
    deflate_strategy: DeflateStrategy,
    filter_type: FilterType,
    idat_max_size: usize,
    close_sink: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            compression_level: 6,
            deflate_strategy: DeflateStrategy::default(),
            filter_type: FilterType::default(),
            idat_max_size: DEFAULT_IDAT_MAX_SIZE,
            close_sink: true,
        }
    }
}

impl EncoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// zlib level, 0 (stored) to 9 (best).
    pub const fn set_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    pub const fn set_deflate_strategy(mut self, strategy: DeflateStrategy) -> Self {
        self.deflate_strategy = strategy;
        self
    }

    pub const fn set_filter_type(mut self, filter_type: FilterType) -> Self {
        self.filter_type = filter_type;
        self
    }

    /// Maximum payload of one IDAT chunk. Zero selects the default.
    pub const fn set_idat_max_size(mut self, size: usize) -> Self {
        self.idat_max_size = if size == 0 {
            DEFAULT_IDAT_MAX_SIZE
        } else {
            size
        };
        self
    }

    /// Whether ending the image also flushes and drops the sink.
    pub const fn set_close_sink(mut self, close: bool) -> Self {
        self.close_sink = close;
        self
    }

    pub const fn compression_level(&self) -> u8 {
        self.compression_level
    }

    pub const fn deflate_strategy(&self) -> DeflateStrategy {
        self.deflate_strategy
    }

    pub const fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub const fn idat_max_size(&self) -> usize {
        self.idat_max_size
    }

    pub const fn close_sink(&self) -> bool {
        self.close_sink
    }

    pub fn validate(&self) -> Result<()> {
        require!(
            self.compression_level <= 9,
            Config,
            "Compression level must be within 0..=9, got {}",
            self.compression_level
        );
        require!(
            self.idat_max_size <= MAX_CHUNK_LEN,
            Config,
            "IDAT size {} exceeds the chunk length limit",
            self.idat_max_size
        );

        Ok(())
    }
}
