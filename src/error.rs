use thiserror::Error;

pub type Result<T> = std::result::Result<T, EncodeError>;

/// Broad category of an [`EncodeError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller drove the writer in the wrong order.
    Sequencing,
    /// The produced file would violate the PNG container rules.
    Format,
    /// The sink or the compressor failed.
    Io,
    /// A parameter was rejected before any pixel data was written.
    Config,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("rows must be written in order: expected {expected}, got {got}")]
    RowOutOfOrder { expected: u32, got: u32 },

    #[error("row {row} is outside an image of {rows} rows")]
    RowOutOfRange { row: u32, rows: u32 },

    #[error("all rows have not been written: {written} of {expected}")]
    IncompleteImage { written: u32, expected: u32 },

    #[error("compression ratio is only known after the image has been ended")]
    NotFinished,

    #[error("{0} must be set before the first row is written")]
    AlreadyStarted(&'static str),

    #[error("the image data stream has already been finished")]
    StreamFinished,

    #[error("the writer has been closed")]
    Closed,

    #[error("{0}")]
    Format(String),

    #[error("{count} chunks were not written, e.g. {first}")]
    OrphanedChunks { count: usize, first: String },

    #[error("invalid scanline: {0}")]
    InvalidScanline(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("deflate failed: {0}")]
    Compression(String),

    #[error("{0}")]
    Config(String),
}

impl EncodeError {
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::RowOutOfOrder { .. }
            | Self::RowOutOfRange { .. }
            | Self::IncompleteImage { .. }
            | Self::NotFinished
            | Self::AlreadyStarted(_)
            | Self::StreamFinished
            | Self::Closed => ErrorClass::Sequencing,
            Self::Format(_) | Self::OrphanedChunks { .. } | Self::InvalidScanline(_) => {
                ErrorClass::Format
            }
            Self::Io(_) | Self::Compression(_) => ErrorClass::Io,
            Self::Config(_) => ErrorClass::Config,
        }
    }
}

/// `bail!`-style early return for the library error type.
#[macro_export]
macro_rules! fail {
    ($variant:ident, $($arg:tt)*) => {
        return Err($crate::error::EncodeError::$variant(format!($($arg)*)))
    };
}

/// `ensure!`-style check for the library error type.
#[macro_export]
macro_rules! require {
    ($cond:expr, $variant:ident, $($arg:tt)*) => {
        if !$cond {
            $crate::fail!($variant, $($arg)*);
        }
    };
}
