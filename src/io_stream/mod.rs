//! Streaming archive engine — reader and writer.
//!
//! # Reader
//! [`ArchiveReader`] reads the selector byte on construction and resolves the
//! codec (fail hard on an unknown selector, nothing else is read).
//! [`ArchiveReader::load_metadata_table`] must then be called exactly once;
//! after that, [`ArchiveReader::load_entry`] decodes any entry, in any order,
//! through one shared [`ScratchBuffer`].
//!
//! The reader is generic over its stream.  Hand it an owned `File` or
//! `Cursor` and it closes the stream when dropped; hand it `&mut File` and
//! the caller keeps ownership.
//!
//! # Writer
//! [`ArchiveWriter`] writes the selector and a zeroed header triple, appends
//! encoded payloads back to back from [`HEADER_SIZE`], then writes the encoded
//! metadata table and patches the triple in place on `finish()`.
//! [`write_single_entry`] is the fixed-layout emitter for one stored entry.

use log::{debug, trace};
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::block::{Lz4BlockCodec, DEFAULT_BLOCK_SIZE};
use crate::buffer::ScratchBuffer;
use crate::codec::{get_codec, read_full, BlockCodec, CodecId, PassThroughCodec};
use crate::error::{ArchiveError, Result};
use crate::header::{HeaderTriple, HEADER_SIZE, SELECTOR_SIZE};
use crate::index::{write_record, EntryDescriptor, MetadataTable, RECORD_FIXED_SIZE};

/// Default cap on any single declared decoded size: 4 GiB.
pub const DEFAULT_MAX_DECODED_SIZE: u64 = 4 * 1024 * 1024 * 1024;

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct ArchiveReader<R: Read + Seek> {
    stream:          R,
    codec:           Box<dyn BlockCodec>,
    scratch:         ScratchBuffer,
    /// Total stream length, taken once at construction.
    stream_len:      u64,
    metadata_loaded: bool,
}

impl<R: Read + Seek> ArchiveReader<R> {
    pub fn new(stream: R) -> Result<Self> {
        Self::with_limit(stream, DEFAULT_MAX_DECODED_SIZE)
    }

    /// Read the selector byte at the current position and build its codec.
    /// The stream is left just past the selector.
    pub fn with_limit(mut stream: R, max_decoded_size: u64) -> Result<Self> {
        let mut selector = [0u8; SELECTOR_SIZE as usize];
        if read_full(&mut stream, &mut selector)? == 0 {
            return Err(ArchiveError::Truncated {
                what:     "codec selector",
                offset:   0,
                expected: SELECTOR_SIZE,
                actual:   0,
            });
        }
        let id = CodecId::from_selector(selector[0])
            .ok_or(ArchiveError::UnsupportedFormat { selector: selector[0] })?;
        debug!("reader: codec selector {} ({})", selector[0], id.name());

        let after_selector = stream.stream_position()?;
        let stream_len = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(after_selector))?;

        Ok(Self {
            stream,
            codec:           get_codec(id),
            scratch:         ScratchBuffer::new(max_decoded_size),
            stream_len,
            metadata_loaded: false,
        })
    }

    pub fn codec_id(&self) -> CodecId { self.codec.codec_id() }

    /// Current scratch length.  Never decreases.
    pub fn scratch_capacity(&self) -> usize { self.scratch.capacity() }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> R { self.stream }

    /// Read the header triple, decode the metadata section and parse it.
    /// Must be called exactly once, before any [`load_entry`](Self::load_entry).
    pub fn load_metadata_table(&mut self) -> Result<MetadataTable> {
        if self.metadata_loaded {
            return Err(ArchiveError::Invariant("metadata table already loaded"));
        }
        self.stream.seek(SeekFrom::Start(SELECTOR_SIZE))?;
        let triple = HeaderTriple::read(&mut self.stream)?;
        debug!(
            "reader: metadata at {} ({} -> {} bytes)",
            triple.meta_offset, triple.meta_compressed_size, triple.meta_original_size,
        );

        let raw = self.decode_range(
            triple.meta_offset,
            triple.meta_compressed_size,
            triple.meta_original_size,
            "metadata section",
        )?;
        let table = MetadataTable::from_bytes(raw)?;
        self.metadata_loaded = true;
        debug!("reader: {} entries, data section ends at {}", table.len(), table.data_end());
        Ok(table)
    }

    /// Decode one entry into a freshly owned buffer of `original_size` bytes.
    pub fn load_entry(&mut self, entry: &EntryDescriptor) -> Result<Vec<u8>> {
        if !self.metadata_loaded {
            return Err(ArchiveError::Invariant("entry requested before metadata table was loaded"));
        }
        trace!("reader: entry {:?} at {}", entry.name, entry.offset);
        let bytes = self.decode_range(entry.offset, entry.compressed_size, entry.original_size, "entry")?;
        Ok(bytes.to_vec())
    }

    /// Seek to `offset` and decode `compressed_size` bytes into the scratch
    /// buffer.  Returns exactly `original_size` decoded bytes.
    ///
    /// A range that runs past the end of the stream is rejected before the
    /// scratch buffer is touched.
    fn decode_range(
        &mut self,
        offset:          u64,
        compressed_size: u64,
        original_size:   u64,
        what:            &'static str,
    ) -> Result<&[u8]> {
        if offset.checked_add(compressed_size).map_or(true, |end| end > self.stream_len) {
            return Err(ArchiveError::Truncated {
                what,
                offset,
                expected: compressed_size,
                actual:   self.stream_len.saturating_sub(offset),
            });
        }
        let dst = self.scratch.ensure(original_size, what)?;
        self.stream.seek(SeekFrom::Start(offset))?;

        let mut sink: &mut [u8] = dst;
        self.codec
            .decode(&mut self.stream, &mut sink, compressed_size, original_size)
            .map_err(|source| ArchiveError::Decode { offset, source })?;
        if !sink.is_empty() {
            return Err(ArchiveError::Invariant("codec wrote fewer bytes than declared"));
        }

        Ok(self.scratch.filled(original_size as usize))
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Configuration for [`ArchiveWriter`].
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub codec:      CodecId,
    /// Decoded block size for [`CodecId::Lz4Block`]; ignored otherwise.
    pub block_size: u32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { codec: CodecId::Lz4Block, block_size: DEFAULT_BLOCK_SIZE }
    }
}

pub struct ArchiveWriter<W: Write + Seek> {
    writer:    W,
    codec:  Box<dyn BlockCodec>,
    table:  MetadataTable,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    pub fn new(writer: W) -> Result<Self> {
        Self::with_options(writer, WriteOptions::default())
    }

    pub fn with_options(mut writer: W, opts: WriteOptions) -> Result<Self> {
        let codec: Box<dyn BlockCodec> = match opts.codec {
            CodecId::PassThrough => Box::new(PassThroughCodec),
            CodecId::Lz4Block    => Box::new(Lz4BlockCodec::new(opts.block_size)),
        };
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&[opts.codec.selector()])?;
        HeaderTriple::default().write(&mut writer)?; // patched on finish
        Ok(Self { writer, codec, table: MetadataTable::default() })
    }

    /// Entries written so far.
    pub fn table(&self) -> &MetadataTable { &self.table }

    /// Encode `data` directly after the previous payload.
    pub fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<&EntryDescriptor> {
        if self.table.get(name).is_some() {
            return Err(ArchiveError::DuplicateEntry(name.to_owned()));
        }
        let offset = self.table.data_end();
        self.writer.seek(SeekFrom::Start(offset))?;
        let compressed = self.codec
            .encode(data, &mut self.writer)
            .map_err(|source| ArchiveError::Encode { offset, source })?;
        trace!("writer: entry {name:?}: {} -> {compressed} bytes at {offset}", data.len());
        self.table.push(name.to_owned(), data.len() as u64, compressed)
    }

    /// Write the metadata section and patch the header triple.  Returns the
    /// underlying writer.
    pub fn finish(mut self) -> Result<W> {
        let meta_offset = self.table.data_end();
        let meta = self.table.to_bytes()?;

        self.writer.seek(SeekFrom::Start(meta_offset))?;
        let meta_compressed_size = self.codec
            .encode(&meta, &mut self.writer)
            .map_err(|source| ArchiveError::Encode { offset: meta_offset, source })?;

        let triple = HeaderTriple {
            meta_offset,
            meta_original_size: meta.len() as u64,
            meta_compressed_size,
        };
        self.writer.seek(SeekFrom::Start(SELECTOR_SIZE))?;
        triple.write(&mut self.writer)?;
        self.writer.flush()?;
        debug!("writer: {} entries, metadata at {meta_offset}", self.table.len());
        Ok(self.writer)
    }
}

/// Emit a complete stored archive holding one entry, without seeking:
/// selector `0`, header triple, the payload, then one metadata record.
pub fn write_single_entry<W: Write>(mut writer: W, name: &str, payload: &[u8]) -> io::Result<()> {
    let n = payload.len() as u64;
    let record_len = (RECORD_FIXED_SIZE + name.len()) as u64;

    writer.write_all(&[CodecId::PassThrough.selector()])?;
    HeaderTriple {
        meta_offset:          HEADER_SIZE + n,
        meta_original_size:   record_len,
        meta_compressed_size: record_len,
    }.write(&mut writer)?;
    writer.write_all(payload)?;
    write_record(&mut writer, name, n, n)?;
    writer.flush()
}
