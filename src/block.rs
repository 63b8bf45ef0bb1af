//! LZ4 block-decoder codec (selector byte `2`).
//!
//! A compressed range is not raw LZ4.  It is a small framed stream:
//!
//! ```text
//! u32 LE  block_size                 decoded size of every full block
//! repeat:
//!   u32 LE  chunk_size
//!   chunk_size bytes                 one LZ4 block (lz4_flex::block format)
//! ```
//!
//! Every chunk decodes to `block_size` bytes except the last, which decodes
//! to whatever output remains.  The decoder writes `min(remaining, block_size)`
//! bytes per chunk, so working memory is bounded by `block_size` regardless
//! of entry size.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::trace;
use std::io::{self, Read, Write};

use crate::codec::{read_full, BlockCodec, CodecError, CodecId};

/// Default decoded size of one block: 64 KiB.
pub const DEFAULT_BLOCK_SIZE: u32 = 64 * 1024;

/// Bytes taken by the `block_size` and `chunk_size` framing fields.
pub const FRAME_FIELD_SIZE: u64 = 4;

pub struct Lz4BlockCodec {
    block_size: u32,
    /// Holds one compressed chunk; sized by the LZ4 compress bound.
    chunk_buf:  Vec<u8>,
    /// Decode target for one block.
    block_buf:  Vec<u8>,
}

impl Lz4BlockCodec {
    /// `block_size` is used when encoding and as the initial decode capacity.
    pub fn new(block_size: u32) -> Self {
        let block_size = block_size.max(1);
        Self {
            block_size,
            chunk_buf: vec![0u8; lz4_flex::block::get_maximum_output_size(block_size as usize)],
            block_buf: vec![0u8; block_size as usize],
        }
    }

    pub fn block_size(&self) -> u32 { self.block_size }

    /// Grow both working buffers so a block of `block_size` fits.  Never shrinks.
    fn reserve_block(&mut self, block_size: usize) {
        if block_size > self.block_buf.len() {
            trace!("lz4: growing block buffers to {block_size} bytes");
            self.block_buf.resize(block_size, 0);
            self.chunk_buf.resize(lz4_flex::block::get_maximum_output_size(block_size), 0);
        }
    }
}

impl Default for Lz4BlockCodec {
    fn default() -> Self { Self::new(DEFAULT_BLOCK_SIZE) }
}

impl BlockCodec for Lz4BlockCodec {
    fn codec_id(&self) -> CodecId { CodecId::Lz4Block }

    fn decode(
        &mut self,
        src:             &mut dyn Read,
        dst:             &mut dyn Write,
        compressed_size: u64,
        original_size:   u64,
    ) -> Result<(), CodecError> {
        // A block never yields more than the entry needs, so the decode window
        // is capped by `original_size` rather than trusting `block_size` alone.
        let declared   = read_frame_field(src, "block size")?;
        let block_size = u64::from(declared).min(original_size) as usize;
        let mut consumed = FRAME_FIELD_SIZE;
        self.reserve_block(block_size);

        let mut remaining = original_size;
        let mut chunk     = 0usize;
        while remaining > 0 {
            if block_size == 0 {
                return Err(corrupt(chunk, "block size is zero but output remains".into()));
            }

            let chunk_size = read_frame_field(src, "chunk size")? as usize;
            consumed += FRAME_FIELD_SIZE + chunk_size as u64;
            if consumed > compressed_size {
                return Err(corrupt(chunk, format!(
                    "framing overruns declared compressed size {compressed_size}"
                )));
            }
            if chunk_size > self.chunk_buf.len() {
                return Err(corrupt(chunk, format!(
                    "chunk of {chunk_size} bytes exceeds bound {} for block size {declared}",
                    self.chunk_buf.len()
                )));
            }

            let got = read_full(src, &mut self.chunk_buf[..chunk_size])?;
            if got < chunk_size {
                return Err(CodecError::Truncated {
                    what:     "lz4 chunk",
                    expected: chunk_size as u64,
                    actual:   got as u64,
                });
            }

            let decoded = lz4_flex::block::decompress_into(
                &self.chunk_buf[..chunk_size],
                &mut self.block_buf[..block_size],
            ).map_err(|e| corrupt(chunk, e.to_string()))?;

            let write_len = remaining.min(block_size as u64) as usize;
            if decoded < write_len {
                return Err(corrupt(chunk, format!(
                    "decoded {decoded} bytes, need {write_len}"
                )));
            }
            dst.write_all(&self.block_buf[..write_len]).map_err(|e| match e.kind() {
                io::ErrorKind::WriteZero => CodecError::Invariant("destination closed mid-block"),
                _                        => CodecError::Io(e),
            })?;

            trace!("lz4: chunk {chunk}: {chunk_size} -> {write_len} bytes");
            remaining -= write_len as u64;
            chunk += 1;
        }

        if consumed != compressed_size {
            return Err(corrupt(chunk, format!(
                "framing consumed {consumed} of {compressed_size} declared bytes"
            )));
        }
        Ok(())
    }

    fn encode(&mut self, data: &[u8], dst: &mut dyn Write) -> Result<u64, CodecError> {
        let block_size = self.block_size as usize;
        self.reserve_block(block_size);

        dst.write_u32::<LittleEndian>(self.block_size)?;
        let mut written = FRAME_FIELD_SIZE;
        for block in data.chunks(block_size) {
            let n = lz4_flex::block::compress_into(block, &mut self.chunk_buf)
                .map_err(|e| CodecError::CorruptBlock { chunk: 0, reason: e.to_string() })?;
            dst.write_u32::<LittleEndian>(n as u32)?;
            dst.write_all(&self.chunk_buf[..n])?;
            written += FRAME_FIELD_SIZE + n as u64;
        }
        Ok(written)
    }
}

fn read_frame_field(src: &mut dyn Read, what: &'static str) -> Result<u32, CodecError> {
    let mut field = [0u8; FRAME_FIELD_SIZE as usize];
    let n = read_full(src, &mut field)?;
    if n < field.len() {
        return Err(CodecError::Truncated { what, expected: FRAME_FIELD_SIZE, actual: n as u64 });
    }
    Ok(LittleEndian::read_u32(&field))
}

fn corrupt(chunk: usize, reason: String) -> CodecError {
    CodecError::CorruptBlock { chunk, reason }
}
