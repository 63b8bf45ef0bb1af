//! High-level [`Archive`] API — the primary embedding surface.
//!
//! ```no_run
//! use minarc::archive::Archive;
//! use minarc::io_stream::write_single_entry;
//!
//! // Write
//! let mut f = std::fs::File::create("out.marc")?;
//! write_single_entry(&mut f, "file", b"Hello, world!")?;
//!
//! // Read
//! let mut ar = Archive::open("out.marc", false)?;
//! assert_eq!(ar.get("file")?, b"Hello, world!");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::codec::CodecId;
use crate::error::{ArchiveError, Result};
use crate::index::{EntryDescriptor, MetadataTable};
use crate::io_stream::{ArchiveReader, DEFAULT_MAX_DECODED_SIZE};

// ── OpenOptions ───────────────────────────────────────────────────────────────

/// Configuration for [`Archive::open_with`].
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// Read the whole file into memory up front instead of streaming it.
    pub cache_in_memory:  bool,
    /// Upper bound on any decoded size the archive may declare.
    pub max_decoded_size: u64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            cache_in_memory:  false,
            max_decoded_size: DEFAULT_MAX_DECODED_SIZE,
        }
    }
}

// ── EntryInfo ─────────────────────────────────────────────────────────────────

/// Lightweight descriptor returned by [`Archive::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub name:            String,
    pub original_size:   u64,
    pub compressed_size: u64,
    pub offset:          u64,
}

impl From<&EntryDescriptor> for EntryInfo {
    fn from(e: &EntryDescriptor) -> Self {
        EntryInfo {
            name:            e.name.clone(),
            original_size:   e.original_size,
            compressed_size: e.compressed_size,
            offset:          e.offset,
        }
    }
}

// ── Backing ───────────────────────────────────────────────────────────────────

enum Backing {
    File(BufReader<File>),
    Memory(Cursor<Vec<u8>>),
}

impl Read for Backing {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Backing::File(f)   => f.read(buf),
            Backing::Memory(c) => c.read(buf),
        }
    }
}

impl Seek for Backing {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Backing::File(f)   => f.seek(pos),
            Backing::Memory(c) => c.seek(pos),
        }
    }
}

// ── Archive ───────────────────────────────────────────────────────────────────

pub struct Archive {
    path:   PathBuf,
    reader: ArchiveReader<Backing>,
    table:  MetadataTable,
}

impl Archive {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn open<P: AsRef<Path>>(path: P, cache_in_memory: bool) -> Result<Self> {
        Self::open_with(path, OpenOptions { cache_in_memory, ..Default::default() })
    }

    /// Open and eagerly load the metadata table.  A missing or corrupt
    /// metadata section fails here, never at first lookup.
    pub fn open_with<P: AsRef<Path>>(path: P, opts: OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let backing = if opts.cache_in_memory {
            let bytes = fs::read(&path)?;
            debug!("archive: cached {} ({} bytes)", path.display(), bytes.len());
            Backing::Memory(Cursor::new(bytes))
        } else {
            Backing::File(BufReader::new(File::open(&path)?))
        };

        let mut reader = ArchiveReader::with_limit(backing, opts.max_decoded_size)?;
        let table = reader.load_metadata_table()?;
        Ok(Self { path, reader, table })
    }

    // ── Read ──────────────────────────────────────────────────────────────────

    /// Decode the named entry.  A missing name is [`ArchiveError::NotFound`]
    /// and leaves the archive fully usable.
    pub fn get(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self.table.get(name)
            .ok_or_else(|| ArchiveError::NotFound(name.to_owned()))?;
        self.reader.load_entry(entry)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.get(name).is_some()
    }

    pub fn stat(&self, name: &str) -> Option<EntryInfo> {
        self.table.get(name).map(EntryInfo::from)
    }

    /// Entries in metadata record order.
    pub fn list(&self) -> Vec<EntryInfo> {
        self.table.iter().map(EntryInfo::from).collect()
    }

    /// Extract every entry into `dest`, creating it if necessary.  Entry
    /// names are used as relative paths.
    pub fn extract_all<P: AsRef<Path>>(&mut self, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        fs::create_dir_all(dest)?;
        let names: Vec<String> = self.table.iter().map(|e| e.name.clone()).collect();
        for name in names {
            if !Path::new(&name).components().all(|c| matches!(c, Component::Normal(_))) {
                return Err(io::Error::new(io::ErrorKind::InvalidInput,
                    format!("refusing to extract entry outside destination: {name:?}")).into());
            }
            let data = self.get(&name)?;
            let out = dest.join(&name);
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&out, &data)?;
            debug!("archive: extracted {name:?} ({} bytes)", data.len());
        }
        Ok(())
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path { &self.path }

    pub fn codec(&self) -> CodecId { self.reader.codec_id() }

    pub fn table(&self) -> &MetadataTable { &self.table }
}
