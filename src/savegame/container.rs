//! Chunked LZ4 savegame container
//!
//! Savegames on disk wrap the variable stream in independently compressed
//! LZ4 blocks:
//!
//! ```text
//! "SNFH" "FZLC" chunk_count:u32 header_size:u32
//! chunk_count * (compressed_size:u32 decompressed_size:u32 end_offset:u32)
//! ...padding up to header_size...
//! compressed chunks, back to back
//! ```
//!
//! `end_offset` is the running length of the decompressed stream after the
//! chunk. Streams that already start with `SAV3` are passed through as-is.

use crate::{Result, TrackerError};
use nom::bytes::complete::tag;
use nom::combinator::map;
use nom::multi::count;
use nom::number::complete::le_u32;
use nom::sequence::{preceded, tuple};
use nom::IResult;
use std::borrow::Cow;

/// Default uncompressed size of each chunk when writing
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

const PREAMBLE_LEN: usize = 16;
const CHUNK_ENTRY_LEN: usize = 12;

/// Upper bound on LZ4 block expansion (one token byte can stand for 255 bytes)
const MAX_EXPANSION: u64 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkHeader {
    compressed: u32,
    decompressed: u32,
    end_offset: u32,
}

fn preamble(input: &[u8]) -> IResult<&[u8], (u32, u32)> {
    preceded(tag("SNFHFZLC"), tuple((le_u32, le_u32)))(input)
}

fn chunk_header(input: &[u8]) -> IResult<&[u8], ChunkHeader> {
    map(
        tuple((le_u32, le_u32, le_u32)),
        |(compressed, decompressed, end_offset)| ChunkHeader {
            compressed,
            decompressed,
            end_offset,
        },
    )(input)
}

/// True when `data` starts with the compressed container magic
pub fn is_compressed(data: &[u8]) -> bool {
    data.starts_with(b"SNFHFZLC")
}

/// Return the uncompressed variable stream of a savegame file
pub fn unpack(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    if data.starts_with(b"SAV3") {
        return Ok(Cow::Borrowed(data));
    }
    if !is_compressed(data) {
        return Err(TrackerError::corrupt(
            0,
            "not a savegame: expected \"SNFHFZLC\" or \"SAV3\" magic",
        ));
    }

    let (rest, (chunk_count, header_size)) =
        preamble(data).map_err(|_| TrackerError::corrupt(0, "truncated container header"))?;
    let chunk_count = chunk_count as usize;
    let table_end = chunk_count
        .checked_mul(CHUNK_ENTRY_LEN)
        .and_then(|len| len.checked_add(PREAMBLE_LEN))
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            TrackerError::corrupt(
                PREAMBLE_LEN,
                format!("chunk table for {chunk_count} chunks is truncated"),
            )
        })?;
    let (_, chunks) = count(chunk_header, chunk_count)(rest).map_err(|_| {
        TrackerError::corrupt(
            PREAMBLE_LEN,
            format!("chunk table for {chunk_count} chunks is truncated"),
        )
    })?;

    if (header_size as usize) < table_end {
        return Err(TrackerError::corrupt(
            8,
            format!("header size {header_size} overlaps the chunk table ending at {table_end}"),
        ));
    }

    // Check every chunk against the file before decompressing anything
    let mut payloads = Vec::with_capacity(chunks.len());
    let mut position = header_size as usize;
    for (i, chunk) in chunks.iter().enumerate() {
        let entry_at = PREAMBLE_LEN + i * CHUNK_ENTRY_LEN;
        let end = position + chunk.compressed as usize;
        let compressed = data.get(position..end).ok_or_else(|| {
            TrackerError::corrupt(
                position,
                format!(
                    "chunk {i} declares {} compressed bytes but the file ends at {}",
                    chunk.compressed,
                    data.len()
                ),
            )
        })?;
        if chunk.decompressed as u64 > chunk.compressed as u64 * MAX_EXPANSION {
            return Err(TrackerError::corrupt(
                entry_at,
                format!(
                    "chunk {i} claims {} bytes from {} compressed, more than LZ4 can produce",
                    chunk.decompressed, chunk.compressed
                ),
            ));
        }
        payloads.push(compressed);
        position = end;
    }

    let mut out = Vec::new();
    for (i, (chunk, compressed)) in chunks.iter().zip(payloads).enumerate() {
        let entry_at = PREAMBLE_LEN + i * CHUNK_ENTRY_LEN;
        let decompressed = lz4_flex::block::decompress(compressed, chunk.decompressed as usize)
            .map_err(|e| TrackerError::corrupt(entry_at, format!("chunk {i}: {e}")))?;
        if decompressed.len() != chunk.decompressed as usize {
            return Err(TrackerError::corrupt(
                entry_at,
                format!(
                    "chunk {i} decompressed to {} bytes, expected {}",
                    decompressed.len(),
                    chunk.decompressed
                ),
            ));
        }
        out.extend_from_slice(&decompressed);

        if out.len() != chunk.end_offset as usize {
            return Err(TrackerError::corrupt(
                entry_at,
                format!(
                    "chunk {i} end offset {} disagrees with decompressed length {}",
                    chunk.end_offset,
                    out.len()
                ),
            ));
        }
    }

    tracing::debug!(
        chunks = chunk_count,
        compressed = data.len(),
        decompressed = out.len(),
        "unpacked savegame container"
    );

    Ok(Cow::Owned(out))
}

/// Wrap an uncompressed stream in the chunked LZ4 container
pub fn compress(stream: &[u8], chunk_size: usize) -> Vec<u8> {
    let chunk_size = chunk_size.max(1);
    let compressed: Vec<(usize, Vec<u8>)> = stream
        .chunks(chunk_size)
        .map(|chunk| (chunk.len(), lz4_flex::block::compress(chunk)))
        .collect();

    let header_size = PREAMBLE_LEN + compressed.len() * CHUNK_ENTRY_LEN;
    let mut out = Vec::with_capacity(header_size + stream.len());
    out.extend_from_slice(b"SNFHFZLC");
    out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    out.extend_from_slice(&(header_size as u32).to_le_bytes());

    let mut end_offset = 0u32;
    for (len, bytes) in &compressed {
        end_offset += *len as u32;
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&(*len as u32).to_le_bytes());
        out.extend_from_slice(&end_offset.to_le_bytes());
    }
    for (_, bytes) in &compressed {
        out.extend_from_slice(bytes);
    }
    out
}
