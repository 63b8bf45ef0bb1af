//! Fixed archive header: one selector byte followed by the header triple.
//!
//! ```text
//! offset 0      u8      codec selector
//! offset 1      u64 LE  meta_offset
//! offset 9      u64 LE  meta_original_size
//! offset 17     u64 LE  meta_compressed_size
//! offset 25     entry payloads, contiguous
//! ```

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::codec::read_full;
use crate::error::{ArchiveError, Result};

pub const SELECTOR_SIZE:      u64 = 1;
pub const HEADER_TRIPLE_SIZE: u64 = 3 * 8;
/// First byte after the header; the first entry payload starts here.
pub const HEADER_SIZE:        u64 = SELECTOR_SIZE + HEADER_TRIPLE_SIZE;

/// Location and sizes of the encoded metadata table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderTriple {
    pub meta_offset:          u64,
    pub meta_original_size:   u64,
    pub meta_compressed_size: u64,
}

impl HeaderTriple {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(self.meta_offset)?;
        writer.write_u64::<LittleEndian>(self.meta_original_size)?;
        writer.write_u64::<LittleEndian>(self.meta_compressed_size)?;
        Ok(())
    }

    /// Read the triple from the current position, which must be
    /// [`SELECTOR_SIZE`].
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut raw = [0u8; HEADER_TRIPLE_SIZE as usize];
        let got = read_full(&mut reader, &mut raw)?;
        if got < raw.len() {
            return Err(ArchiveError::Truncated {
                what:     "header triple",
                offset:   SELECTOR_SIZE,
                expected: HEADER_TRIPLE_SIZE,
                actual:   got as u64,
            });
        }
        Ok(Self {
            meta_offset:          LittleEndian::read_u64(&raw[0..8]),
            meta_original_size:   LittleEndian::read_u64(&raw[8..16]),
            meta_compressed_size: LittleEndian::read_u64(&raw[16..24]),
        })
    }
}
