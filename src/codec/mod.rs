//! Codec selection and the [`BlockCodec`] capability.
//!
//! # Selector rules
//! The first byte of every archive names the one codec that decodes every
//! compressed region in it: the metadata section and every entry payload.
//! There is no per-entry codec and no negotiation.
//!
//! | Byte | Codec |
//! |------|-------|
//! | `0`  | pass-through (stored verbatim) |
//! | `2`  | LZ4 block decoder, see [`crate::block`] |
//!
//! Any other value is rejected when the archive is opened.

use std::io::{self, Read, Write};
use thiserror::Error;

use crate::block::{Lz4BlockCodec, DEFAULT_BLOCK_SIZE};

/// Largest chunk moved per read/write by [`PassThroughCodec`].
pub const COPY_CHUNK_SIZE: usize = 4096;

// ── CodecId ──────────────────────────────────────────────────────────────────

/// Runtime codec discriminant, one per selector byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    PassThrough,
    Lz4Block,
}

impl CodecId {
    /// The selector byte written at offset 0.
    #[inline]
    pub fn selector(self) -> u8 {
        match self {
            CodecId::PassThrough => 0,
            CodecId::Lz4Block    => 2,
        }
    }

    /// Resolve a selector byte.  `None` for every unassigned value.
    pub fn from_selector(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(CodecId::PassThrough),
            2 => Some(CodecId::Lz4Block),
            _ => None,
        }
    }

    /// Human-readable name (for diagnostics only).
    pub fn name(self) -> &'static str {
        match self {
            CodecId::PassThrough => "none",
            CodecId::Lz4Block    => "lz4",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "store" => Some(CodecId::PassThrough),
            "lz4"            => Some(CodecId::Lz4Block),
            _                => None,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    /// The source ran dry before a framing boundary was satisfied.
    #[error("Truncated {what}: expected {expected} bytes, got {actual}")]
    Truncated { what: &'static str, expected: u64, actual: u64 },
    /// The LZ4 primitive rejected a chunk, or the framing around it is
    /// inconsistent with the declared sizes.
    #[error("Corrupt block {chunk}: {reason}")]
    CorruptBlock { chunk: usize, reason: String },
    #[error("Stored range is {compressed} bytes but declares {original} decoded bytes")]
    SizeMismatch { compressed: u64, original: u64 },
    #[error("Codec invariant violated: {0}")]
    Invariant(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait BlockCodec: Send {
    fn codec_id(&self) -> CodecId;

    /// Consume exactly `compressed_size` bytes from `src` and write exactly
    /// `original_size` bytes to `dst`.  `src` must already be positioned at
    /// the start of the compressed range.
    fn decode(
        &mut self,
        src:             &mut dyn Read,
        dst:             &mut dyn Write,
        compressed_size: u64,
        original_size:   u64,
    ) -> Result<(), CodecError>;

    /// Encode `data` into `dst`, returning the number of bytes written.
    fn encode(&mut self, data: &[u8], dst: &mut dyn Write) -> Result<u64, CodecError>;
}

// ── Pass-through ─────────────────────────────────────────────────────────────

/// Stored entries: bytes are copied 1:1 in [`COPY_CHUNK_SIZE`] pieces.
pub struct PassThroughCodec;

impl BlockCodec for PassThroughCodec {
    fn codec_id(&self) -> CodecId { CodecId::PassThrough }

    fn decode(
        &mut self,
        src:             &mut dyn Read,
        dst:             &mut dyn Write,
        compressed_size: u64,
        original_size:   u64,
    ) -> Result<(), CodecError> {
        if compressed_size != original_size {
            return Err(CodecError::SizeMismatch { compressed: compressed_size, original: original_size });
        }

        let mut chunk = [0u8; COPY_CHUNK_SIZE];
        let mut moved = 0u64;
        while moved < compressed_size {
            let want = (compressed_size - moved).min(COPY_CHUNK_SIZE as u64) as usize;
            let got = read_full(src, &mut chunk[..want])?;
            if got < want {
                return Err(CodecError::Truncated {
                    what:     "stored range",
                    expected: compressed_size,
                    actual:   moved + got as u64,
                });
            }
            dst.write_all(&chunk[..want]).map_err(|e| match e.kind() {
                io::ErrorKind::WriteZero => CodecError::Invariant("destination closed mid-copy"),
                _                        => CodecError::Io(e),
            })?;
            moved += want as u64;
        }
        Ok(())
    }

    fn encode(&mut self, data: &[u8], dst: &mut dyn Write) -> Result<u64, CodecError> {
        dst.write_all(data)?;
        Ok(data.len() as u64)
    }
}

// ── Framing helpers ──────────────────────────────────────────────────────────

/// Read until `buf` is full or the source reports EOF.  Returns the number
/// of bytes actually read, so callers can report short reads precisely.
pub fn read_full<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0)  => break,
            Ok(n)  => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Build the codec for `id`.  The LZ4 variant starts with buffers sized for
/// [`DEFAULT_BLOCK_SIZE`] and grows them on demand.
pub fn get_codec(id: CodecId) -> Box<dyn BlockCodec> {
    match id {
        CodecId::PassThrough => Box::new(PassThroughCodec),
        CodecId::Lz4Block    => Box::new(Lz4BlockCodec::new(DEFAULT_BLOCK_SIZE)),
    }
}
