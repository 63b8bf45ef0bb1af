pub mod error;
pub mod header;
pub mod codec;
pub mod block;
pub mod buffer;
pub mod index;
pub mod io_stream;
pub mod archive;

pub use error::{ArchiveError, Result};
pub use header::{HeaderTriple, HEADER_SIZE};
pub use codec::{BlockCodec, CodecId, CodecError, get_codec};
pub use index::{EntryDescriptor, MetadataTable};
pub use io_stream::{ArchiveReader, ArchiveWriter, WriteOptions, write_single_entry};
pub use archive::{Archive, EntryInfo, OpenOptions};

/// Open an archive file.  See [`Archive::open`].
pub fn open_archive<P: AsRef<std::path::Path>>(path: P, cache_in_memory: bool) -> Result<Archive> {
    Archive::open(path, cache_in_memory)
}
