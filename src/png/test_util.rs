use crate::png::chunk::{chunk_crc, IDAT};
use crate::png::filter::unfilter_row;
use crate::png::grammar::{Filter, ImageInfo, PNG_SIGNATURE};
use anyhow::{ensure, Result};
use flate2::read::ZlibDecoder;
use std::io::Read;

#[derive(Debug)]
pub struct RawChunk {
    pub chunk_type: [u8; 4],
    pub data: Vec<u8>,
}

impl RawChunk {
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.chunk_type).into_owned()
    }
}

/// Splits a chunk stream, with or without the file signature, checking every CRC.
pub fn read_chunks(bytes: &[u8]) -> Result<Vec<RawChunk>> {
    let mut cursor = if bytes.starts_with(&PNG_SIGNATURE) {
        PNG_SIGNATURE.len()
    } else {
        0
    };

    let mut chunks = vec![];

    while cursor < bytes.len() {
        ensure!(cursor + 12 <= bytes.len(), "truncated chunk at {cursor}");

        let length = u32::from_be_bytes(bytes[cursor..cursor + 4].try_into()?) as usize;
        let chunk_type: [u8; 4] = bytes[cursor + 4..cursor + 8].try_into()?;
        let end = cursor + 8 + length;
        ensure!(end + 4 <= bytes.len(), "chunk payload runs past the end");

        let data = bytes[cursor + 8..end].to_vec();
        let crc = u32::from_be_bytes(bytes[end..end + 4].try_into()?);
        ensure!(
            crc == chunk_crc(&chunk_type, &data),
            "bad crc for {}",
            String::from_utf8_lossy(&chunk_type)
        );

        chunks.push(RawChunk { chunk_type, data });
        cursor = end + 4;
    }

    Ok(chunks)
}

/// Concatenates every IDAT payload and inflates it.
pub fn inflate_idat(bytes: &[u8]) -> Result<Vec<u8>> {
    let stream: Vec<u8> = read_chunks(bytes)?
        .into_iter()
        .filter(|c| c.chunk_type == IDAT)
        .flat_map(|c| c.data)
        .collect();

    let mut decoded = vec![];
    ZlibDecoder::new(stream.as_slice()).read_to_end(&mut decoded)?;

    Ok(decoded)
}

/// Inflates and unfilters the image data, returning each row's filter and
/// its raw bytes (filter slot excluded).
pub fn decode_rows(info: &ImageInfo, bytes: &[u8]) -> Result<Vec<(Filter, Vec<u8>)>> {
    let decoded = inflate_idat(bytes)?;
    ensure!(
        decoded.len() as u64 == info.raw_stream_len(),
        "expected {} bytes of image data, got {}",
        info.raw_stream_len(),
        decoded.len()
    );

    let row_len = info.bytes_per_row() + 1;
    let mut prev = vec![0u8; row_len];
    let mut rows = vec![];

    for filtered in decoded.chunks_exact(row_len) {
        let filter = Filter::try_from(filtered[0])?;
        let mut raw = vec![0u8; row_len];
        unfilter_row(filter, filtered, &prev, info.bytes_pixel(), &mut raw);

        rows.push((filter, raw[1..].to_vec()));
        prev = raw;
    }

    Ok(rows)
}
