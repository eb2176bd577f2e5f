pub use chunk::{Chunk, ChunkData, ChunkGroup, Placement};
pub use chunk_list::{ChunkCopyPolicy, ChunkList, CopyPass};
pub use encoder::*;
pub use filter_strategy::{FilterStats, FilterType};
pub use grammar::{ColorType, Filter, ImageInfo, PNG_SIGNATURE};
pub use options::{DeflateStrategy, EncoderOptions};
pub use scanline::Scanline;

pub mod chunk;
pub mod chunk_list;
pub mod filter;
pub mod filter_strategy;
pub mod grammar;
pub mod idat;
pub mod options;

mod encoder;
mod scanline;
#[cfg(test)]
mod test_util;
