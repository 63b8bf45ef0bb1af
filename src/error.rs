use std::io;
use thiserror::Error;

use crate::codec::CodecError;

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The leading selector byte names no known codec.
    #[error("Unsupported archive format: codec selector {selector}")]
    UnsupportedFormat { selector: u8 },
    #[error("Truncated {what} at offset {offset}: expected {expected} bytes, got {actual}")]
    Truncated { what: &'static str, offset: u64, expected: u64, actual: u64 },
    #[error("Decode failed for range at offset {offset}: {source}")]
    Decode {
        offset: u64,
        #[source]
        source: CodecError,
    },
    #[error("Encode failed for range at offset {offset}: {source}")]
    Encode {
        offset: u64,
        #[source]
        source: CodecError,
    },
    #[error("Entry not found: {0}")]
    NotFound(String),
    #[error("Entry name at metadata offset {record_offset} is not valid UTF-8")]
    InvalidName { record_offset: u64 },
    /// A declared size exceeds the configured limit or would overflow.
    #[error("{what} of {size} bytes exceeds limit of {limit} bytes")]
    SizeTooLarge { what: &'static str, size: u64, limit: u64 },
    #[error("Duplicate entry name: {0}")]
    DuplicateEntry(String),
    #[error("Reader invariant violated: {0}")]
    Invariant(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// `true` for the one recoverable class: a missing entry name.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::NotFound(_))
    }
}
