use crate::error::{EncodeError, Result};
use crate::png::chunk::{Chunk, IENDChunk, IHDRChunk, PngChunk};
use crate::png::chunk_list::{ChunkCopyPolicy, ChunkList, CopyPass};
use crate::png::filter_strategy::{FilterStats, FilterType, FilterWriteStrategy};
use crate::png::grammar::{ImageInfo, PNG_SIGNATURE};
use crate::png::idat::IdatStream;
use crate::png::options::{DeflateStrategy, EncoderOptions};
use crate::png::scanline::Scanline;
#[cfg(feature = "time")]
use crate::util::event_log::{log_event, Event};
use std::io::Write;
#[cfg(feature = "time")]
use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum WriterState {
    Open,
    Finished,
    Failed,
}

#[cfg(feature = "time")]
#[derive(Debug, Default)]
struct Timings {
    started: Option<Instant>,
    filter: Duration,
    deflate: Duration,
}

/// Streaming PNG writer: rows go in one at a time, in order, and leave as
/// filtered, compressed IDAT chunks.
///
/// The signature, IHDR and every chunk queued before the pixel data are
/// written lazily with the first row. [`PngEncoder::end`] writes the rest.
#[derive(Debug)]
pub struct PngEncoder<W: Write> {
    sink: Option<W>,
    info: ImageInfo,
    options: EncoderOptions,
    chunks: ChunkList,
    strategy: FilterWriteStrategy,
    idat: Option<IdatStream>,
    raw: Vec<u8>,
    prev: Vec<u8>,
    rows_written: u32,
    state: WriterState,
    #[cfg(feature = "time")]
    timings: Timings,
}

impl<W: Write> PngEncoder<W> {
    pub fn new(sink: W, info: ImageInfo) -> Self {
        Self::build(sink, info, EncoderOptions::default())
    }

    pub fn with_options(sink: W, info: ImageInfo, options: EncoderOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(sink, info, options))
    }

    fn build(sink: W, info: ImageInfo, options: EncoderOptions) -> Self {
        let row_len = info.bytes_per_row() + 1;

        Self {
            sink: Some(sink),
            info,
            options,
            chunks: ChunkList::new(info),
            strategy: FilterWriteStrategy::new(&info, options.filter_type()),
            idat: None,
            raw: vec![0; row_len],
            prev: vec![0; row_len],
            rows_written: 0,
            state: WriterState::Open,
            #[cfg(feature = "time")]
            timings: Timings::default(),
        }
    }

    pub const fn image_info(&self) -> &ImageInfo {
        &self.info
    }

    pub const fn options(&self) -> &EncoderOptions {
        &self.options
    }

    pub const fn rows_written(&self) -> u32 {
        self.rows_written
    }

    pub const fn chunk_list(&self) -> &ChunkList {
        &self.chunks
    }

    pub const fn filter_stats(&self) -> &FilterStats {
        self.strategy.stats()
    }

    /// IDAT chunks written so far.
    pub fn idat_chunks(&self) -> usize {
        self.idat.as_ref().map_or(0, IdatStream::chunks_written)
    }

    fn has_started(&self) -> bool {
        self.chunks.current_group().is_some()
    }

    fn ensure_not_started(&self, what: &'static str) -> Result<()> {
        if self.has_started() {
            return Err(EncodeError::AlreadyStarted(what));
        }

        Ok(())
    }

    fn reconfigure(&mut self, what: &'static str, options: EncoderOptions) -> Result<()> {
        self.ensure_not_started(what)?;
        options.validate()?;
        self.options = options;

        Ok(())
    }

    pub fn set_compression_level(&mut self, level: u8) -> Result<()> {
        self.reconfigure("compression level", self.options.set_compression_level(level))
    }

    pub fn set_deflate_strategy(&mut self, strategy: DeflateStrategy) -> Result<()> {
        self.reconfigure("deflate strategy", self.options.set_deflate_strategy(strategy))
    }

    pub fn set_idat_max_size(&mut self, size: usize) -> Result<()> {
        self.reconfigure("IDAT size", self.options.set_idat_max_size(size))
    }

    pub fn set_close_sink(&mut self, close: bool) -> Result<()> {
        self.reconfigure("sink closing", self.options.set_close_sink(close))
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) -> Result<()> {
        self.reconfigure("filter type", self.options.set_filter_type(filter_type))?;
        self.strategy = FilterWriteStrategy::new(&self.info, filter_type);

        Ok(())
    }

    /// Queues an ancillary chunk (or the palette) to be written when the
    /// writer reaches the chunk's group.
    pub fn queue_chunk(&mut self, chunk: Chunk) -> Result<()> {
        self.chunks.queue(chunk)
    }

    /// Copies the chunks that precede the pixel data in `source`, typically
    /// the chunks read from another PNG. Call before the first row.
    pub fn copy_chunks_first(
        &mut self,
        source: &[Chunk],
        policy: ChunkCopyPolicy,
    ) -> Result<usize> {
        self.chunks.copy_chunks(source, policy, CopyPass::First)
    }

    /// Copies the chunks that follow the pixel data in `source`. Call
    /// before [`PngEncoder::end`].
    pub fn copy_chunks_last(
        &mut self,
        source: &[Chunk],
        policy: ChunkCopyPolicy,
    ) -> Result<usize> {
        self.chunks.copy_chunks(source, policy, CopyPass::Last)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Finished => Err(EncodeError::StreamFinished),
            WriterState::Failed => Err(EncodeError::Closed),
        }
    }

    /// Writes the next row of the image. `row` must be the number of rows
    /// written so far.
    pub fn write_row<'a>(&mut self, scanline: impl Into<Scanline<'a>>, row: u32) -> Result<()> {
        self.ensure_open()?;

        if row != self.rows_written {
            return Err(self.fail(EncodeError::RowOutOfOrder {
                expected: self.rows_written,
                got: row,
            }));
        }

        if row >= self.info.rows() {
            return Err(self.fail(EncodeError::RowOutOfRange {
                row,
                rows: self.info.rows(),
            }));
        }

        self.write_row_inner(scanline.into(), row).map_err(|err| self.fail(err))
    }

    pub fn write_next_row<'a>(&mut self, scanline: impl Into<Scanline<'a>>) -> Result<()> {
        self.write_row(scanline, self.rows_written)
    }

    fn write_row_inner(&mut self, scanline: Scanline, row: u32) -> Result<()> {
        std::mem::swap(&mut self.raw, &mut self.prev);
        scanline.to_png_raw(&self.info, &mut self.raw)?;

        if self.idat.is_none() {
            self.write_header()?;
        }

        #[cfg(feature = "time")]
        let a = Instant::now();

        let (filter, filtered) =
            self.strategy.filter_row(row, &self.raw, &self.prev, self.info.bytes_pixel());
        log::trace!("row {row}: {filter:?}");

        #[cfg(feature = "time")]
        let b = Instant::now();
        #[cfg(feature = "time")]
        {
            self.timings.filter += b - a;
        }

        let sink = self.sink.as_mut().ok_or(EncodeError::Closed)?;
        let idat = self.idat.as_mut().ok_or(EncodeError::StreamFinished)?;
        idat.write(filtered, sink)?;

        #[cfg(feature = "time")]
        {
            self.timings.deflate += b.elapsed();
        }

        self.rows_written += 1;

        Ok(())
    }

    /// Signature, IHDR, and every group before the pixel data.
    fn write_header(&mut self) -> Result<()> {
        #[cfg(feature = "time")]
        let a = Instant::now();
        #[cfg(feature = "time")]
        {
            self.timings.started = Some(a);
        }

        let sink = self.sink.as_mut().ok_or(EncodeError::Closed)?;
        sink.write_all(&PNG_SIGNATURE)?;
        IHDRChunk {
            image_info: &self.info,
        }
        .write(&mut *sink)?;

        // Header, AfterHeader, Palette, AfterPalette, ImageData
        for _ in 0..5 {
            self.chunks.advance(&mut *sink)?;
        }

        log::debug!(
            "header written for {}x{} {:?}, filter {:?}",
            self.info.cols(),
            self.info.rows(),
            self.info.color_type(),
            self.strategy.configured()
        );

        self.idat = Some(IdatStream::new(
            self.options.compression_level(),
            self.options.deflate_strategy(),
            self.options.idat_max_size(),
        ));

        #[cfg(feature = "time")]
        log_event("", Event::WriteHeader, Some(a.elapsed()));

        Ok(())
    }

    /// Finishes the image: closes the zlib stream, writes the chunks queued
    /// after the pixel data and IEND, then releases the sink unless
    /// [`EncoderOptions::close_sink`] is off.
    pub fn end(&mut self) -> Result<()> {
        self.ensure_open()?;

        match self.end_inner() {
            Ok(()) => {
                self.state = WriterState::Finished;
                if self.options.close_sink() {
                    self.release();
                }
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn end_inner(&mut self) -> Result<()> {
        if self.rows_written != self.info.rows() {
            return Err(EncodeError::IncompleteImage {
                written: self.rows_written,
                expected: self.info.rows(),
            });
        }

        #[cfg(feature = "time")]
        let a = Instant::now();

        let sink = self.sink.as_mut().ok_or(EncodeError::Closed)?;
        let idat = self.idat.as_mut().ok_or(EncodeError::StreamFinished)?;
        idat.finish(&mut *sink)?;

        #[cfg(feature = "time")]
        {
            self.timings.deflate += a.elapsed();
        }
        #[cfg(feature = "time")]
        let b = Instant::now();

        // AfterImageData, then End, which refuses leftover chunks
        self.chunks.advance(&mut *sink)?;
        self.chunks.advance(&mut *sink)?;
        IENDChunk.write(&mut *sink)?;
        sink.flush()?;

        #[cfg(feature = "time")]
        {
            log_event("", Event::FlushChunks, Some(b.elapsed()));
            log_event("", Event::FilterRows, Some(self.timings.filter));
            log_event("", Event::Deflate, Some(self.timings.deflate));
            if let Some(started) = self.timings.started {
                log_event("", Event::TotalElapsed, Some(started.elapsed()));
            }
        }

        log::info!(
            "wrote {} rows in {} IDAT chunks, {} of {} bytes ({:.3})",
            self.rows_written,
            idat.chunks_written(),
            idat.bytes_flushed(),
            self.info.raw_stream_len(),
            idat.bytes_flushed() as f64 / self.info.raw_stream_len() as f64
        );

        Ok(())
    }

    /// Compressed size over the size of the filtered rows. Only known once
    /// the image has been ended.
    pub fn compression_ratio(&self) -> Result<f64> {
        if self.state != WriterState::Finished {
            return Err(EncodeError::NotFinished);
        }

        let flushed = self.idat.as_ref().map_or(0, IdatStream::bytes_flushed);

        Ok(flushed as f64 / self.info.raw_stream_len() as f64)
    }

    /// Takes the sink back, if it has not been released.
    pub fn into_inner(mut self) -> Option<W> {
        self.sink.take()
    }

    /// Poisons the writer. The sink is released, or only flushed when it
    /// was asked to outlive the encoder.
    fn fail(&mut self, err: EncodeError) -> EncodeError {
        log::debug!("writer failed: {err}");
        self.state = WriterState::Failed;

        if self.options.close_sink() {
            self.release();
        } else {
            self.flush_sink();
        }

        err
    }

    fn flush_sink(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.flush() {
                log::warn!("Error flushing the sink: {err}");
            }
        }
    }

    /// Flushes and drops the sink. Later calls do nothing.
    fn release(&mut self) {
        self.flush_sink();
        self.sink = None;
    }
}

impl<W: Write> Drop for PngEncoder<W> {
    fn drop(&mut self) {
        self.release();
    }
}
