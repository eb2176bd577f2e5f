use crate::error::{EncodeError, Result};
use crate::png::chunk::{write_chunk, IDAT};
use crate::png::options::DeflateStrategy;
use miniz_oxide::deflate::core::{create_comp_flags_from_zip_params, CompressorOxide};
use miniz_oxide::deflate::stream::deflate;
use miniz_oxide::{MZError, MZFlush, MZStatus, StreamResult};
use std::io::{self, Write};

pub const DEFAULT_IDAT_MAX_SIZE: usize = 32768;

const OUT_BUF_SIZE: usize = 16 * 1024;

// a positive window size asks miniz for the zlib wrapper
const ZLIB_WINDOW_BITS: i32 = 15;

/// Accumulates compressed bytes and emits them as IDAT chunks of at most
/// `max_size` bytes.
#[derive(Debug)]
struct ChunkFramer {
    pending: Vec<u8>,
    max_size: usize,
    bytes_flushed: u64,
    chunks_written: usize,
}

impl ChunkFramer {
    fn new(max_size: usize) -> Self {
        Self {
            pending: Vec::with_capacity(max_size.min(OUT_BUF_SIZE * 4)),
            max_size,
            bytes_flushed: 0,
            chunks_written: 0,
        }
    }

    fn push<W: Write>(&mut self, mut bytes: &[u8], mut w: W) -> io::Result<()> {
        while !bytes.is_empty() {
            let take = (self.max_size - self.pending.len()).min(bytes.len());
            self.pending.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];

            if self.pending.len() == self.max_size {
                self.emit(&mut w)?;
            }
        }

        Ok(())
    }

    fn emit<W: Write>(&mut self, w: W) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        write_chunk(w, &IDAT, &self.pending)?;
        self.bytes_flushed += self.pending.len() as u64;
        self.chunks_written += 1;
        self.pending.clear();

        Ok(())
    }
}

/// The zlib stream of the image, written out as a run of IDAT chunks.
///
/// The stream does not own the sink: every call borrows it, so the encoder
/// can interleave other chunks around the image data.
pub struct IdatStream {
    compressor: Box<CompressorOxide>,
    out_buf: Vec<u8>,
    framer: ChunkFramer,
    bytes_in: u64,
    finished: bool,
}

impl std::fmt::Debug for IdatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdatStream")
            .field("framer", &self.framer)
            .field("bytes_in", &self.bytes_in)
            .field("finished", &self.finished)
            .finish()
    }
}

impl IdatStream {
    pub fn new(level: u8, strategy: DeflateStrategy, max_size: usize) -> Self {
        let flags = create_comp_flags_from_zip_params(
            level as i32,
            ZLIB_WINDOW_BITS,
            strategy.miniz_code(),
        );

        Self {
            compressor: Box::new(CompressorOxide::new(flags)),
            out_buf: vec![0; OUT_BUF_SIZE],
            framer: ChunkFramer::new(max_size.max(1)),
            bytes_in: 0,
            finished: false,
        }
    }

    /// Compresses `data`. Full chunks are written to `w` as soon as they fill.
    pub fn write<W: Write>(&mut self, data: &[u8], mut w: W) -> Result<()> {
        if self.finished {
            return Err(EncodeError::StreamFinished);
        }

        self.bytes_in += data.len() as u64;
        self.pump(data, MZFlush::None, &mut w)
    }

    /// Ends the zlib stream and writes the last, possibly short, chunk.
    pub fn finish<W: Write>(&mut self, mut w: W) -> Result<()> {
        if self.finished {
            return Err(EncodeError::StreamFinished);
        }

        self.pump(&[], MZFlush::Finish, &mut w)?;
        self.framer.emit(&mut w)?;
        self.finished = true;

        Ok(())
    }

    fn pump<W: Write>(&mut self, mut input: &[u8], flush: MZFlush, mut w: W) -> Result<()> {
        let finishing = matches!(flush, MZFlush::Finish);

        loop {
            let StreamResult {
                bytes_consumed,
                bytes_written,
                status,
            } = deflate(&mut self.compressor, input, &mut self.out_buf, flush);

            input = &input[bytes_consumed..];
            self.framer.push(&self.out_buf[..bytes_written], &mut w)?;

            match status {
                Ok(MZStatus::StreamEnd) => return Ok(()),
                Ok(_) if !finishing && input.is_empty() && bytes_written < self.out_buf.len() => {
                    return Ok(())
                }
                Ok(_) => {}
                // nothing left to consume and nothing pending
                Err(MZError::Buf) if !finishing && input.is_empty() => return Ok(()),
                Err(err) => return Err(EncodeError::Compression(format!("{err:?}"))),
            }
        }
    }

    /// Uncompressed bytes handed to the stream so far.
    pub const fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Compressed bytes already written out as IDAT payload.
    pub const fn bytes_flushed(&self) -> u64 {
        self.framer.bytes_flushed
    }

    pub const fn chunks_written(&self) -> usize {
        self.framer.chunks_written
    }

    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}
