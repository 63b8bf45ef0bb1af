//! Metadata table: entry name → (sizes, archive offset).
//!
//! # Wire format
//! The decoded metadata section is a packed sequence of records, no padding:
//!
//! ```text
//! u32 LE   name_len
//! [u8]     name (UTF-8, name_len bytes)
//! u64 LE   original_size
//! u64 LE   compressed_size
//! ```
//!
//! Offsets are not stored.  They are derived while parsing: the first record
//! sits at [`HEADER_SIZE`] and each following record starts where the
//! previous one's compressed bytes end.  Record order is therefore part of
//! the data; reordering records moves every payload.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::warn;
use std::collections::HashMap;
use std::io::{self, Write};

use crate::error::{ArchiveError, Result};
use crate::header::HEADER_SIZE;

/// Fixed bytes per record besides the name itself.
pub const RECORD_FIXED_SIZE: usize = 4 + 8 + 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    pub name:            String,
    pub original_size:   u64,
    pub compressed_size: u64,
    /// Absolute archive offset of the payload.  Derived, never serialized.
    pub offset:          u64,
}

#[derive(Debug, Clone)]
pub struct MetadataTable {
    entries: Vec<EntryDescriptor>,
    by_name: HashMap<String, usize>,
    /// One past the last payload byte; where the next payload would start.
    end:     u64,
}

impl Default for MetadataTable {
    fn default() -> Self {
        Self { entries: Vec::new(), by_name: HashMap::new(), end: HEADER_SIZE }
    }
}

impl MetadataTable {
    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, name: &str) -> Option<&EntryDescriptor> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// End of the data section implied by the records seen so far.
    pub fn data_end(&self) -> u64 { self.end }

    /// Entries in first-seen record order.
    pub fn iter(&self) -> impl Iterator<Item = &EntryDescriptor> {
        self.entries.iter()
    }

    /// Insert or replace by name.  A replaced entry keeps its slot.
    fn insert(&mut self, entry: EntryDescriptor) {
        match self.by_name.get(&entry.name) {
            Some(&i) => {
                warn!("metadata: duplicate entry {:?} overwrites the earlier record", entry.name);
                self.entries[i] = entry;
            }
            None => {
                self.by_name.insert(entry.name.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Append an entry whose payload starts at [`data_end`](Self::data_end).
    /// Writers use this; unlike parsing, a repeated name is an error.
    pub fn push(&mut self, name: String, original_size: u64, compressed_size: u64) -> Result<&EntryDescriptor> {
        if self.by_name.contains_key(&name) {
            return Err(ArchiveError::DuplicateEntry(name));
        }
        let offset = self.end;
        self.end = advance(offset, compressed_size)?;
        self.insert(EntryDescriptor { name, original_size, compressed_size, offset });
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Parse a decoded metadata buffer.
    ///
    /// An empty buffer is an empty table.  Duplicate names are last-write-wins,
    /// which is unusual for an archive index but matches what existing
    /// archives rely on.  The running offset still advances past a
    /// duplicate's payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut table   = Self::default();
        let mut cursor  = 0usize;

        while cursor < bytes.len() {
            let record_offset = cursor as u64;

            let name_len = LittleEndian::read_u32(take(bytes, cursor, 4, "record name length")?) as usize;
            cursor += 4;

            let name_bytes = take(bytes, cursor, name_len, "record name")?;
            let name = std::str::from_utf8(name_bytes)
                .map_err(|_| ArchiveError::InvalidName { record_offset })?
                .to_owned();
            cursor += name_len;

            let sizes = take(bytes, cursor, 16, "record sizes")?;
            let original_size   = LittleEndian::read_u64(&sizes[0..8]);
            let compressed_size = LittleEndian::read_u64(&sizes[8..16]);
            cursor += 16;

            let offset = table.end;
            table.end = advance(offset, compressed_size)?;
            table.insert(EntryDescriptor { name, original_size, compressed_size, offset });
        }
        Ok(table)
    }

    /// Serialize in the current order.  Offsets are dropped.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(
            self.entries.iter().map(|e| RECORD_FIXED_SIZE + e.name.len()).sum(),
        );
        for e in &self.entries {
            write_record(&mut out, &e.name, e.original_size, e.compressed_size)?;
        }
        Ok(out)
    }
}

/// Write one metadata record.
pub fn write_record<W: Write>(
    mut writer:      W,
    name:            &str,
    original_size:   u64,
    compressed_size: u64,
) -> io::Result<()> {
    let name_len = u32::try_from(name.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "entry name longer than u32::MAX"))?;
    writer.write_u32::<LittleEndian>(name_len)?;
    writer.write_all(name.as_bytes())?;
    writer.write_u64::<LittleEndian>(original_size)?;
    writer.write_u64::<LittleEndian>(compressed_size)?;
    Ok(())
}

fn advance(offset: u64, compressed_size: u64) -> Result<u64> {
    offset.checked_add(compressed_size).ok_or(ArchiveError::SizeTooLarge {
        what:  "entry offset",
        size:  compressed_size,
        limit: u64::MAX - offset,
    })
}

fn take<'a>(bytes: &'a [u8], at: usize, len: usize, what: &'static str) -> Result<&'a [u8]> {
    match at.checked_add(len) {
        Some(end) if end <= bytes.len() => Ok(&bytes[at..end]),
        _ => Err(ArchiveError::Truncated {
            what,
            offset:   at as u64,
            expected: len as u64,
            actual:   bytes.len().saturating_sub(at) as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, orig: u64, comp: u64) -> Vec<u8> {
        let mut v = Vec::new();
        write_record(&mut v, name, orig, comp).unwrap();
        v
    }

    #[test]
    fn empty_buffer_is_empty_table() {
        let t = MetadataTable::from_bytes(&[]).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.data_end(), HEADER_SIZE);
        assert!(t.get("anything").is_none());
    }

    #[test]
    fn offsets_accumulate_from_header_size() {
        let mut buf = record("a", 10, 4);
        buf.extend(record("bb", 7, 7));
        buf.extend(record("ccc", 0, 0));
        buf.extend(record("d", 1, 1));
        let t = MetadataTable::from_bytes(&buf).unwrap();

        let offsets: Vec<u64> = t.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![25, 29, 36, 36]);
        assert_eq!(t.get("bb").unwrap().original_size, 7);
    }

    #[test]
    fn record_order_changes_offsets() {
        let mut ab = record("a", 5, 5);
        ab.extend(record("b", 9, 9));
        let mut ba = record("b", 9, 9);
        ba.extend(record("a", 5, 5));

        let t1 = MetadataTable::from_bytes(&ab).unwrap();
        let t2 = MetadataTable::from_bytes(&ba).unwrap();
        assert_eq!((t1.get("a").unwrap().offset, t1.get("b").unwrap().offset), (25, 30));
        assert_eq!((t2.get("a").unwrap().offset, t2.get("b").unwrap().offset), (34, 25));
    }

    #[test]
    fn duplicate_name_is_last_write_wins() {
        let mut buf = record("x", 3, 3);
        buf.extend(record("y", 2, 2));
        buf.extend(record("x", 8, 8));
        let t = MetadataTable::from_bytes(&buf).unwrap();

        assert_eq!(t.len(), 2);
        let x = t.get("x").unwrap();
        assert_eq!((x.original_size, x.offset), (8, 30));
        assert_eq!(t.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn record_cut_short_is_truncated() {
        let buf = record("file", 11, 11);
        let err = MetadataTable::from_bytes(&buf[..buf.len() - 1]).unwrap_err();
        assert!(matches!(err, ArchiveError::Truncated { what: "record sizes", .. }));

        let err = MetadataTable::from_bytes(&[4, 0, 0, 0, b'f']).unwrap_err();
        assert!(matches!(err, ArchiveError::Truncated { what: "record name", expected: 4, actual: 1, .. }));
    }

    #[test]
    fn non_utf8_name_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&[0xC3, 0x28]);
        buf.extend_from_slice(&[0u8; 16]);
        let err = MetadataTable::from_bytes(&buf).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidName { record_offset: 0 }));
    }

    #[test]
    fn to_bytes_matches_parsed_input() {
        let mut buf = record("file", 11, 11);
        buf.extend(record("other", 100, 40));
        let t = MetadataTable::from_bytes(&buf).unwrap();
        assert_eq!(t.to_bytes().unwrap(), buf);
    }

    #[test]
    fn push_assigns_contiguous_offsets_and_rejects_duplicates() {
        let mut t = MetadataTable::default();
        assert_eq!(t.push("a".into(), 10, 6).unwrap().offset, 25);
        assert_eq!(t.push("b".into(), 3, 3).unwrap().offset, 31);
        assert_eq!(t.data_end(), 34);
        assert!(matches!(t.push("a".into(), 1, 1), Err(ArchiveError::DuplicateEntry(n)) if n == "a"));
        assert_eq!(t.data_end(), 34);
    }
}
