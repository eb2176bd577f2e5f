use crate::png::grammar::ImageInfo;
use crate::write_be;
use crc32fast::Hasher;
use std::fmt;
use std::io::{self, Write};

pub const IHDR: [u8; 4] = *b"IHDR";
pub const PLTE: [u8; 4] = *b"PLTE";
pub const IDAT: [u8; 4] = *b"IDAT";
pub const IEND: [u8; 4] = *b"IEND";
pub const TRNS: [u8; 4] = *b"tRNS";
pub const PHYS: [u8; 4] = *b"pHYs";
pub const HIST: [u8; 4] = *b"hIST";
pub const TIME: [u8; 4] = *b"tIME";

const TEXTUAL: [[u8; 4]; 3] = [*b"tEXt", *b"zTXt", *b"iTXt"];
const BEFORE_PALETTE: [[u8; 4]; 6] = [*b"cHRM", *b"gAMA", *b"iCCP", *b"sBIT", *b"sRGB", *b"cICP"];
const AFTER_PALETTE: [[u8; 4]; 3] = [*b"tRNS", *b"bKGD", *b"hIST"];
const BEFORE_DATA: [[u8; 4]; 6] = [*b"pHYs", *b"sPLT", *b"oFFs", *b"sCAL", *b"eXIf", *b"acTL"];

/// CRC-32 of a chunk, computed over its type and payload.
pub fn chunk_crc(chunk_type: &[u8; 4], data: &[u8]) -> u32 {
    let mut hx = Hasher::new();
    hx.update(chunk_type);
    hx.update(data);

    hx.finalize()
}

/// Writes one framed chunk: length, type, payload, CRC.
pub fn write_chunk<W: Write>(mut w: W, chunk_type: &[u8; 4], data: &[u8]) -> io::Result<()> {
    let length = u32::try_from(data.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "chunk payload too large"))?;

    w.write_all(&length.to_be_bytes())?;
    w.write_all(chunk_type)?;
    w.write_all(data)?;
    w.write_all(&chunk_crc(chunk_type, data).to_be_bytes())?;

    Ok(())
}

pub const fn is_critical(chunk_type: &[u8; 4]) -> bool {
    chunk_type[0] & 0x20 == 0
}

pub const fn is_public(chunk_type: &[u8; 4]) -> bool {
    chunk_type[1] & 0x20 == 0
}

pub const fn is_safe_to_copy(chunk_type: &[u8; 4]) -> bool {
    chunk_type[3] & 0x20 != 0
}

pub fn is_valid_type(chunk_type: &[u8; 4]) -> bool {
    chunk_type.iter().all(u8::is_ascii_alphabetic)
}

pub fn is_textual(chunk_type: &[u8; 4]) -> bool {
    TEXTUAL.contains(chunk_type)
}

pub fn allows_multiple(chunk_type: &[u8; 4]) -> bool {
    is_textual(chunk_type) || chunk_type == b"sPLT"
}

/// Position of a chunk in the file, relative to IHDR, PLTE and IDAT.
///
/// The writer walks these in order, exactly once each.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkGroup {
    Header,
    AfterHeader,
    Palette,
    AfterPalette,
    ImageData,
    AfterImageData,
    End,
}

impl ChunkGroup {
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Header => Some(Self::AfterHeader),
            Self::AfterHeader => Some(Self::Palette),
            Self::Palette => Some(Self::AfterPalette),
            Self::AfterPalette => Some(Self::ImageData),
            Self::ImageData => Some(Self::AfterImageData),
            Self::AfterImageData => Some(Self::End),
            Self::End => None,
        }
    }
}

/// Where the PNG rules allow a chunk type to appear.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Placement {
    /// IHDR, IDAT and IEND, written by the encoder itself.
    Fixed,
    Palette,
    BeforePalette,
    AfterPaletteBeforeData,
    BeforeData,
    Anywhere,
    Unknown,
}

impl Placement {
    pub fn of(chunk_type: &[u8; 4]) -> Self {
        match chunk_type {
            &IHDR | &IDAT | &IEND => Self::Fixed,
            &PLTE => Self::Palette,
            t if BEFORE_PALETTE.contains(t) => Self::BeforePalette,
            t if AFTER_PALETTE.contains(t) => Self::AfterPaletteBeforeData,
            t if BEFORE_DATA.contains(t) => Self::BeforeData,
            t if is_textual(t) || t == &TIME => Self::Anywhere,
            _ => Self::Unknown,
        }
    }

    pub const fn allows(self, group: ChunkGroup) -> bool {
        use ChunkGroup::*;

        match self {
            Self::Fixed => false,
            Self::Palette => matches!(group, Palette),
            Self::BeforePalette => matches!(group, AfterHeader),
            Self::AfterPaletteBeforeData => matches!(group, AfterPalette),
            Self::BeforeData => matches!(group, AfterHeader | AfterPalette),
            Self::Anywhere => matches!(group, AfterHeader | AfterPalette | AfterImageData),
            Self::Unknown => {
                matches!(group, AfterHeader | AfterPalette | ImageData | AfterImageData)
            }
        }
    }

    /// Latest group the chunk may be written in.
    pub const fn default_group(self) -> ChunkGroup {
        match self {
            Self::Fixed => ChunkGroup::Header,
            Self::Palette => ChunkGroup::Palette,
            Self::BeforePalette => ChunkGroup::AfterHeader,
            Self::AfterPaletteBeforeData | Self::BeforeData => ChunkGroup::AfterPalette,
            Self::Anywhere | Self::Unknown => ChunkGroup::AfterImageData,
        }
    }

    /// First group at or after `from` the chunk may still be written in.
    pub fn earliest_from(self, from: ChunkGroup) -> Option<ChunkGroup> {
        let mut group = Some(from);
        while let Some(g) = group {
            if self.allows(g) && g != ChunkGroup::ImageData {
                return Some(g);
            }
            group = g.next();
        }

        None
    }
}

/// A chunk waiting to be written, or already written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    chunk_type: [u8; 4],
    data: Vec<u8>,
    group: ChunkGroup,
}

impl Chunk {
    /// Builds a chunk targeting the latest group its type allows.
    pub fn new(chunk_type: [u8; 4], data: Vec<u8>) -> Self {
        Self {
            chunk_type,
            group: Placement::of(&chunk_type).default_group(),
            data,
        }
    }

    pub fn with_group(mut self, group: ChunkGroup) -> Self {
        self.group = group;
        self
    }

    pub fn palette(entries: &[[u8; 3]]) -> Self {
        Self::new(PLTE, entries.concat())
    }

    pub const fn chunk_type(&self) -> &[u8; 4] {
        &self.chunk_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub const fn group(&self) -> ChunkGroup {
        self.group
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.chunk_type).into_owned()
    }

    pub const fn is_critical(&self) -> bool {
        is_critical(&self.chunk_type)
    }

    pub const fn is_safe_to_copy(&self) -> bool {
        is_safe_to_copy(&self.chunk_type)
    }

    pub fn placement(&self) -> Placement {
        Placement::of(&self.chunk_type)
    }

    pub fn crc(&self) -> u32 {
        chunk_crc(&self.chunk_type, &self.data)
    }

    pub(crate) fn write<W: Write>(&self, w: W) -> io::Result<()> {
        write_chunk(w, &self.chunk_type, &self.data)
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes, {:?})", self.name(), self.data.len(), self.group)
    }
}

/// Big-endian payload builder.
#[derive(Debug, Default)]
pub struct ChunkData {
    data: Vec<u8>,
}

impl ChunkData {
    pub fn new() -> Self {
        Self::default()
    }

    write_be!(write_u8, u8);
    write_be!(write_u16, u16);
    write_be!(write_u32, u32);

    pub fn write_slice(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);

        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

/// Chunks the encoder writes on its own, outside of the chunk list.
pub trait PngChunk {
    const NAME: [u8; 4];

    fn data(&self) -> Vec<u8> {
        vec![]
    }

    fn write<W: Write>(&self, w: W) -> io::Result<()> {
        write_chunk(w, &Self::NAME, &self.data())
    }
}

#[derive(Debug)]
pub struct IHDRChunk<'a> {
    pub image_info: &'a ImageInfo,
}

impl PngChunk for IHDRChunk<'_> {
    const NAME: [u8; 4] = IHDR;

    fn data(&self) -> Vec<u8> {
        let info = self.image_info;

        ChunkData::new()
            .write_u32(info.cols())
            .write_u32(info.rows())
            .write_u8(info.bit_depth())
            .write_u8(info.color_type() as u8)
            // compression method, filter method, interlace method: never interlaced
            .write_u8(0)
            .write_u8(0)
            .write_u8(0)
            .finish()
    }
}

#[derive(Debug)]
pub struct IENDChunk;

impl PngChunk for IENDChunk {
    const NAME: [u8; 4] = IEND;
}
