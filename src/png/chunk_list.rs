use crate::error::{EncodeError, Result};
use crate::png::chunk::{
    allows_multiple, is_textual, is_valid_type, Chunk, ChunkGroup, Placement, HIST, PHYS, PLTE,
    TIME, TRNS,
};
use crate::png::grammar::ImageInfo;
use crate::{fail, require};
use std::io::Write;
use std::ops::{BitOr, BitOrAssign};

/// Which chunks of a source image are carried over to the image being
/// written. Flags combine with `|`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ChunkCopyPolicy(u32);

impl ChunkCopyPolicy {
    pub const NONE: Self = Self(0);
    /// PLTE, when the target is indexed.
    pub const PALETTE: Self = Self(1);
    /// Every ancillary chunk marked safe-to-copy.
    pub const ALL_SAFE: Self = Self(1 << 2);
    /// Every ancillary chunk, plus PLTE for any non-greyscale target.
    pub const ALL: Self = Self(1 << 3);
    pub const PHYS: Self = Self(1 << 4);
    /// tEXt, zTXt and iTXt.
    pub const TEXTUAL: Self = Self(1 << 5);
    pub const TRANSPARENCY: Self = Self(1 << 6);
    /// Every known ancillary chunk except textual ones, hIST and tIME.
    pub const ALMOST_ALL: Self = Self(1 << 8);

    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for ChunkCopyPolicy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChunkCopyPolicy {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Which side of the source's image data a copy considers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CopyPass {
    /// Source chunks located before the image data.
    First,
    /// Source chunks located after the image data.
    Last,
}

/// Queue of chunks not yet written, the log of the written ones, and the
/// group the writer is in.
#[derive(Debug)]
pub struct ChunkList {
    info: ImageInfo,
    current: Option<ChunkGroup>,
    queued: Vec<Chunk>,
    written: Vec<Chunk>,
}

impl ChunkList {
    pub const fn new(info: ImageInfo) -> Self {
        Self {
            info,
            current: None,
            queued: Vec::new(),
            written: Vec::new(),
        }
    }

    /// Last group entered, `None` before the header is written.
    pub const fn current_group(&self) -> Option<ChunkGroup> {
        self.current
    }

    pub fn queued(&self) -> &[Chunk] {
        &self.queued
    }

    pub fn written(&self) -> &[Chunk] {
        &self.written
    }

    pub fn queue(&mut self, chunk: Chunk) -> Result<()> {
        let chunk_type = *chunk.chunk_type();
        let group = chunk.group();

        require!(
            is_valid_type(&chunk_type),
            Format,
            "Invalid chunk type: {:?}",
            chunk_type
        );

        let placement = chunk.placement();
        require!(
            placement != Placement::Fixed,
            Format,
            "{} is written by the encoder and cannot be queued",
            chunk.name()
        );

        if let Some(current) = self.current {
            require!(
                group > current,
                Format,
                "{} queued for {:?}, but the writer is already in {:?}",
                chunk.name(),
                group,
                current
            );
        }

        require!(
            placement.allows(group),
            Format,
            "{} cannot be placed in {:?}",
            chunk.name(),
            group
        );

        if chunk_type == PLTE {
            let max_entries = if self.info.is_indexed() {
                (1usize << self.info.bit_depth()).min(256)
            } else {
                256
            };
            let len = chunk.data().len();

            require!(
                len > 0 && len % 3 == 0 && len / 3 <= max_entries,
                Format,
                "Invalid palette length {}, at most {} entries",
                len,
                max_entries
            );
        }

        log::debug!("queued {}", chunk);
        self.queued.push(chunk);

        Ok(())
    }

    /// Moves to the next group and writes every chunk queued for it.
    ///
    /// Returns the group entered.
    pub fn advance<W: Write>(&mut self, mut w: W) -> Result<ChunkGroup> {
        let next = match self.current {
            None => ChunkGroup::Header,
            Some(group) => group
                .next()
                .ok_or_else(|| EncodeError::Format("No chunk group after End".into()))?,
        };

        match next {
            ChunkGroup::Palette => self.check_palette()?,
            ChunkGroup::End => {
                if let Some(first) = self.queued.first() {
                    return Err(EncodeError::OrphanedChunks {
                        count: self.queued.len(),
                        first: first.to_string(),
                    });
                }
            }
            _ => {}
        }

        // nothing may interrupt the run of IDAT chunks, so chunks queued for
        // the image data group stay queued and are reported as orphans
        if next == ChunkGroup::ImageData {
            self.current = Some(next);
            return Ok(next);
        }

        self.check_duplicates(next)?;

        let (now, later) = std::mem::take(&mut self.queued)
            .into_iter()
            .partition::<Vec<_>, _>(|chunk| chunk.group() == next);
        self.queued = later;
        self.current = Some(next);

        for chunk in now {
            chunk.write(&mut w)?;
            self.written.push(chunk);
        }

        log::debug!(
            "entered {:?}, {} chunks written so far, {} queued",
            next,
            self.written.len(),
            self.queued.len()
        );

        Ok(next)
    }

    fn check_palette(&self) -> Result<()> {
        let palettes = self
            .queued
            .iter()
            .filter(|chunk| chunk.chunk_type() == &PLTE)
            .count();

        if palettes > 0 && self.info.is_greyscale() {
            fail!(Format, "Cannot write a palette for a greyscale image");
        }
        if palettes == 0 && self.info.is_indexed() {
            fail!(Format, "Missing palette for an indexed image");
        }

        Ok(())
    }

    fn check_duplicates(&self, group: ChunkGroup) -> Result<()> {
        let mut seen: Vec<&[u8; 4]> = self.written.iter().map(Chunk::chunk_type).collect();

        for chunk in self.queued.iter().filter(|chunk| chunk.group() == group) {
            let chunk_type = chunk.chunk_type();
            require!(
                allows_multiple(chunk_type) || !seen.contains(&chunk_type),
                Format,
                "Duplicated chunk does not allow multiple instances: {}",
                chunk
            );
            seen.push(chunk_type);
        }

        Ok(())
    }

    fn should_copy(&self, chunk: &Chunk, policy: ChunkCopyPolicy) -> bool {
        let chunk_type = chunk.chunk_type();

        if chunk.is_critical() {
            return chunk_type == &PLTE
                && ((self.info.is_indexed() && policy.contains(ChunkCopyPolicy::PALETTE))
                    || (!self.info.is_greyscale() && policy.contains(ChunkCopyPolicy::ALL)));
        }

        let text = is_textual(chunk_type);
        let uncommon = chunk.placement() == Placement::Unknown
            || text
            || chunk_type == &HIST
            || chunk_type == &TIME;

        policy.contains(ChunkCopyPolicy::ALL)
            || (chunk.is_safe_to_copy() && policy.contains(ChunkCopyPolicy::ALL_SAFE))
            || (chunk_type == &TRNS && policy.contains(ChunkCopyPolicy::TRANSPARENCY))
            || (chunk_type == &PHYS && policy.contains(ChunkCopyPolicy::PHYS))
            || (text && policy.contains(ChunkCopyPolicy::TEXTUAL))
            || (!uncommon && policy.contains(ChunkCopyPolicy::ALMOST_ALL))
    }

    /// Queues copies of the `source` chunks selected by `policy` on the
    /// `pass` side of the source image data. Returns how many were queued.
    ///
    /// If any copy is rejected, nothing is queued.
    pub fn copy_chunks(
        &mut self,
        source: &[Chunk],
        policy: ChunkCopyPolicy,
        pass: CopyPass,
    ) -> Result<usize> {
        let Some(from) = self
            .current
            .map_or(Some(ChunkGroup::AfterHeader), ChunkGroup::next)
        else {
            return Ok(0);
        };

        let before = self.queued.len();
        let mut copied = 0;

        for chunk in source {
            let after_data = chunk.group() > ChunkGroup::ImageData;
            let wanted = match pass {
                CopyPass::First => !after_data,
                CopyPass::Last => after_data,
            };

            if !wanted || !self.should_copy(chunk, policy) {
                continue;
            }

            let Some(group) = chunk.placement().earliest_from(chunk.group().max(from)) else {
                log::debug!("{} can no longer be placed, not copied", chunk);
                continue;
            };

            // all or nothing: a rejected chunk drops the copies queued before it
            if let Err(err) = self.queue(chunk.clone().with_group(group)) {
                self.queued.truncate(before);
                return Err(err);
            }
            copied += 1;
        }

        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::chunk::ChunkData;
    use crate::png::test_util::read_chunks;
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    fn advance_to(list: &mut ChunkList, out: &mut Vec<u8>, group: ChunkGroup) -> Result<()> {
        while list.current_group() != Some(group) {
            list.advance(&mut *out)?;
        }
        Ok(())
    }

    fn phys() -> Chunk {
        Chunk::new(
            PHYS,
            ChunkData::new()
                .write_u32(2835)
                .write_u32(2835)
                .write_u8(1)
                .finish(),
        )
    }

    #[test]
    fn test_groups_flush_in_order() -> Result<()> {
        let info = ImageInfo::indexed(4, 4, 8)?;
        let mut list = ChunkList::new(info);

        list.queue(Chunk::new(*b"tEXt", b"Title\0x".to_vec()))?;
        list.queue(Chunk::new(TRNS, vec![0]))?;
        list.queue(Chunk::palette(&[[0, 0, 0], [255, 255, 255]]))?;
        list.queue(Chunk::new(*b"gAMA", 45455u32.to_be_bytes().to_vec()))?;
        list.queue(phys().with_group(ChunkGroup::AfterHeader))?;

        let mut out = vec![];
        advance_to(&mut list, &mut out, ChunkGroup::AfterImageData)?;
        assert!(list.queued().is_empty());
        assert_eq!(list.advance(&mut out)?, ChunkGroup::End);

        let names: Vec<_> = read_chunks(&out)?.into_iter().map(|c| c.name()).collect();
        assert_eq!(names, ["gAMA", "pHYs", "PLTE", "tRNS", "tEXt"]);

        assert!(list.advance(&mut out).is_err());

        Ok(())
    }

    #[test]
    fn test_missing_palette() -> Result<()> {
        let mut list = ChunkList::new(ImageInfo::indexed(2, 2, 2)?);
        let mut out = vec![];
        list.advance(&mut out)?;
        list.advance(&mut out)?;

        let err = list.advance(&mut out).unwrap_err();
        assert!(matches!(err, EncodeError::Format(_)), "{err:?}");
        assert_eq!(list.current_group(), Some(ChunkGroup::AfterHeader));

        Ok(())
    }

    #[test]
    fn test_palette_for_greyscale() -> Result<()> {
        let mut list = ChunkList::new(ImageInfo::greyscale(2, 2, 8)?);
        list.queue(Chunk::palette(&[[1, 2, 3]]))?;

        let mut out = vec![];
        list.advance(&mut out)?;
        list.advance(&mut out)?;
        let before = out.len();

        assert!(matches!(list.advance(&mut out), Err(EncodeError::Format(_))));
        assert_eq!(out.len(), before);

        Ok(())
    }

    #[test]
    fn test_palette_length() -> Result<()> {
        let mut list = ChunkList::new(ImageInfo::indexed(2, 2, 1)?);
        assert!(list.queue(Chunk::palette(&[[0; 3]; 3])).is_err());
        assert!(list.queue(Chunk::new(PLTE, vec![1, 2])).is_err());
        assert!(list.queue(Chunk::new(PLTE, vec![])).is_err());
        list.queue(Chunk::palette(&[[0; 3]; 2]))?;

        Ok(())
    }

    #[test]
    fn test_queue_rejections() -> Result<()> {
        let mut list = ChunkList::new(ImageInfo::rgb(2, 2, 8)?);

        assert!(list.queue(Chunk::new(*b"IDAT", vec![])).is_err());
        assert!(list.queue(Chunk::new(*b"IEND", vec![])).is_err());
        assert!(list.queue(Chunk::new(*b"ab1d", vec![])).is_err());
        assert!(list
            .queue(Chunk::new(*b"gAMA", vec![0; 4]).with_group(ChunkGroup::AfterPalette))
            .is_err());
        assert!(list
            .queue(Chunk::new(*b"tEXt", vec![]).with_group(ChunkGroup::ImageData))
            .is_err());

        let mut out = vec![];
        advance_to(&mut list, &mut out, ChunkGroup::AfterPalette)?;

        // already past the groups this chunk could go in
        let err = list.queue(Chunk::new(*b"gAMA", vec![0; 4])).unwrap_err();
        assert!(matches!(err, EncodeError::Format(_)));

        list.queue(Chunk::new(*b"tEXt", b"k\0v".to_vec()))?;
        assert_eq!(list.queued().len(), 1);

        Ok(())
    }

    #[test]
    fn test_orphaned_chunk() -> Result<()> {
        let mut list = ChunkList::new(ImageInfo::rgb(2, 2, 8)?);
        list.queue(Chunk::new(*b"prIv", vec![7]).with_group(ChunkGroup::ImageData))?;

        let mut out = vec![];
        advance_to(&mut list, &mut out, ChunkGroup::AfterImageData)?;

        let err = list.advance(&mut out).unwrap_err();
        assert!(matches!(err, EncodeError::OrphanedChunks { count: 1, .. }), "{err:?}");

        Ok(())
    }

    #[test]
    fn test_duplicates() -> Result<()> {
        let mut list = ChunkList::new(ImageInfo::rgb(2, 2, 8)?);
        list.queue(phys())?;
        list.queue(phys())?;
        list.queue(Chunk::new(*b"tEXt", b"a\0b".to_vec()))?;
        list.queue(Chunk::new(*b"tEXt", b"c\0d".to_vec()))?;

        let mut out = vec![];
        advance_to(&mut list, &mut out, ChunkGroup::Palette)?;
        assert!(matches!(list.advance(&mut out), Err(EncodeError::Format(_))));

        let mut list = ChunkList::new(ImageInfo::rgb(2, 2, 8)?);
        list.queue(Chunk::new(*b"tEXt", b"a\0b".to_vec()))?;
        list.queue(Chunk::new(*b"tEXt", b"c\0d".to_vec()))?;
        advance_to(&mut list, &mut out, ChunkGroup::AfterImageData)?;
        assert_eq!(list.written().len(), 2);

        Ok(())
    }

    fn source_chunks() -> Vec<Chunk> {
        vec![
            Chunk::new(*b"gAMA", vec![0, 0, 0xB1, 0x8F]),
            Chunk::palette(&[[1, 1, 1], [2, 2, 2]]),
            Chunk::new(TRNS, vec![0, 255]),
            phys(),
            Chunk::new(*b"tEXt", b"Author\0me".to_vec()).with_group(ChunkGroup::AfterHeader),
            Chunk::new(*b"prIv", vec![1]).with_group(ChunkGroup::AfterPalette),
            Chunk::new(TIME, vec![7, 208, 1, 1, 12, 34, 56]),
            Chunk::new(*b"zTXt", b"Comment\0\0x".to_vec()),
        ]
    }

    fn copied_names(
        info: ImageInfo,
        policy: ChunkCopyPolicy,
        pass: CopyPass,
    ) -> Result<Vec<String>> {
        let mut list = ChunkList::new(info);
        list.copy_chunks(&source_chunks(), policy, pass)?;
        Ok(list.queued().iter().map(Chunk::name).collect())
    }

    #[test]
    fn test_copy_policy() -> Result<()> {
        let indexed = ImageInfo::indexed(2, 2, 8)?;
        let rgb = ImageInfo::rgb(2, 2, 8)?;
        let grey = ImageInfo::greyscale(2, 2, 8)?;

        assert_eq!(
            copied_names(indexed, ChunkCopyPolicy::PALETTE, CopyPass::First)?,
            ["PLTE"]
        );
        assert!(copied_names(rgb, ChunkCopyPolicy::PALETTE, CopyPass::First)?.is_empty());
        assert_eq!(
            copied_names(rgb, ChunkCopyPolicy::ALL, CopyPass::First)?,
            ["gAMA", "PLTE", "tRNS", "pHYs", "tEXt", "prIv"]
        );
        assert_eq!(
            copied_names(grey, ChunkCopyPolicy::ALL, CopyPass::First)?,
            ["gAMA", "tRNS", "pHYs", "tEXt", "prIv"]
        );
        assert_eq!(
            copied_names(
                rgb,
                ChunkCopyPolicy::PHYS | ChunkCopyPolicy::TRANSPARENCY,
                CopyPass::First
            )?,
            ["tRNS", "pHYs"]
        );
        assert_eq!(
            copied_names(rgb, ChunkCopyPolicy::ALMOST_ALL, CopyPass::First)?,
            ["gAMA", "tRNS", "pHYs"]
        );
        assert_eq!(
            copied_names(rgb, ChunkCopyPolicy::ALL_SAFE, CopyPass::First)?,
            ["pHYs", "tEXt", "prIv"]
        );
        assert_eq!(
            copied_names(rgb, ChunkCopyPolicy::TEXTUAL, CopyPass::Last)?,
            ["zTXt"]
        );
        assert_eq!(
            copied_names(rgb, ChunkCopyPolicy::ALL, CopyPass::Last)?,
            ["tIME", "zTXt"]
        );

        Ok(())
    }

    #[test]
    fn test_copy_moves_to_later_group() -> Result<()> {
        let mut list = ChunkList::new(ImageInfo::rgb(2, 2, 8)?);
        let mut out = vec![];
        advance_to(&mut list, &mut out, ChunkGroup::AfterHeader)?;

        let copied =
            list.copy_chunks(&source_chunks(), ChunkCopyPolicy::ALL_SAFE, CopyPass::First)?;
        assert_eq!(copied, 3);
        assert!(list
            .queued()
            .iter()
            .all(|chunk| chunk.group() == ChunkGroup::AfterPalette));

        // gAMA only fits before the palette, which is already behind us
        let mut list = ChunkList::new(ImageInfo::rgb(2, 2, 8)?);
        advance_to(&mut list, &mut out, ChunkGroup::AfterHeader)?;
        let copied =
            list.copy_chunks(&source_chunks(), ChunkCopyPolicy::ALMOST_ALL, CopyPass::First)?;
        assert_eq!(copied, 2);
        let names: Vec<_> = list.queued().iter().map(Chunk::name).collect();
        assert_eq!(names, ["tRNS", "pHYs"]);

        Ok(())
    }

    #[test]
    fn test_failed_copy_queues_nothing() -> Result<()> {
        let mut list = ChunkList::new(ImageInfo::indexed(2, 2, 2)?);
        list.queue(Chunk::new(*b"tEXt", b"a\0b".to_vec()))?;

        let palette: Vec<[u8; 3]> = (0..16).map(|i| [i, i, i]).collect();
        let source = [
            Chunk::new(*b"gAMA", vec![0, 0, 0xB1, 0x8F]),
            Chunk::palette(&palette),
        ];

        let err = list
            .copy_chunks(
                &source,
                ChunkCopyPolicy::ALL | ChunkCopyPolicy::PALETTE,
                CopyPass::First,
            )
            .unwrap_err();
        assert!(matches!(err, EncodeError::Format(_)));

        let names: Vec<_> = list.queued().iter().map(Chunk::name).collect();
        assert_eq!(names, ["tEXt"]);

        // retrying without the palette must not duplicate gAMA
        let copied = list.copy_chunks(&source, ChunkCopyPolicy::ALMOST_ALL, CopyPass::First)?;
        assert_eq!(copied, 1);
        list.queue(Chunk::palette(&[[0, 0, 0], [9, 9, 9]]))?;

        let mut out = vec![];
        advance_to(&mut list, &mut out, ChunkGroup::AfterPalette)?;
        let names: Vec<_> = read_chunks(&out)?.into_iter().map(|c| c.name()).collect();
        assert_eq!(names, ["gAMA", "PLTE"]);

        Ok(())
    }

    #[test]
    fn test_policy_flags() {
        let policy = ChunkCopyPolicy::PALETTE | ChunkCopyPolicy::TEXTUAL;
        assert!(policy.contains(ChunkCopyPolicy::PALETTE));
        assert!(!policy.contains(ChunkCopyPolicy::ALL));
        assert!(!policy.contains(ChunkCopyPolicy::NONE));

        let mut policy = ChunkCopyPolicy::default();
        policy |= ChunkCopyPolicy::PHYS;
        assert_eq!(policy.bits(), 1 << 4);
    }
}
