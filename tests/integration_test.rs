use minarc::archive::{Archive, OpenOptions};
use minarc::io_stream::{write_single_entry, ArchiveReader, ArchiveWriter, WriteOptions};
use minarc::{ArchiveError, CodecError, CodecId};
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use tempfile::{NamedTempFile, TempDir};

fn write_archive(opts: WriteOptions, entries: &[(&str, &[u8])]) -> NamedTempFile {
    let temp_file = NamedTempFile::new().unwrap();
    let file = File::create(temp_file.path()).unwrap();
    let mut writer = ArchiveWriter::with_options(file, opts).unwrap();
    for (name, data) in entries {
        writer.add_entry(name, data).unwrap();
    }
    writer.finish().unwrap();
    temp_file
}

fn lz4(block_size: u32) -> WriteOptions {
    WriteOptions { codec: CodecId::Lz4Block, block_size }
}

#[test]
fn test_hello_world_roundtrip_both_backings() {
    let temp_file = NamedTempFile::new().unwrap();
    write_single_entry(File::create(temp_file.path()).unwrap(), "file", b"hello world").unwrap();

    let bytes = std::fs::read(temp_file.path()).unwrap();
    assert_eq!(bytes.len(), 25 + 11 + 24);
    assert_eq!(bytes[0], 0x00);
    assert_eq!(&bytes[1..9], &36u64.to_le_bytes());

    for cache in [false, true] {
        let mut ar = Archive::open(temp_file.path(), cache).unwrap();
        assert_eq!(ar.codec(), CodecId::PassThrough);
        assert_eq!(ar.get("file").unwrap(), b"hello world");
    }
}

#[test]
fn test_multifile_lz4() {
    let files: Vec<(&str, &[u8])> = vec![
        ("alpha.txt", &b"Alpha file contents"[..]),
        ("beta.bin",  &b"Beta file contents with different data"[..]),
        ("empty",     &b""[..]),
        ("gamma.txt", &b"Gamma file contents here"[..]),
    ];
    let temp_file = write_archive(lz4(16), &files);

    let mut ar = Archive::open(temp_file.path(), false).unwrap();
    assert_eq!(ar.codec(), CodecId::Lz4Block);
    let listed: Vec<String> = ar.list().into_iter().map(|e| e.name).collect();
    assert_eq!(listed, vec!["alpha.txt", "beta.bin", "empty", "gamma.txt"]);

    // Reverse order to exercise seeking backwards.
    for (name, data) in files.iter().rev() {
        assert_eq!(ar.get(name).unwrap(), *data);
    }
}

#[test]
fn test_offsets_are_contiguous_from_header() {
    let temp_file = write_archive(lz4(1024), &[
        ("a", &[1u8; 3000][..]),
        ("b", &[2u8; 10][..]),
        ("c", &[3u8; 5000][..]),
    ]);
    let ar = Archive::open(temp_file.path(), true).unwrap();
    let list = ar.list();
    assert_eq!(list[0].offset, 25);
    for pair in list.windows(2) {
        assert_eq!(pair[1].offset, pair[0].offset + pair[0].compressed_size);
    }
    assert_eq!(ar.table().data_end(), list[2].offset + list[2].compressed_size);
}

#[test]
fn test_ten_thousand_bytes_in_three_blocks() {
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
    for block_size in [4096u32, 3334, 5000] {
        let temp_file = write_archive(lz4(block_size), &[("file", &payload[..])]);
        let raw = std::fs::read(temp_file.path()).unwrap();
        assert_eq!(&raw[25..29], &block_size.to_le_bytes());

        let mut ar = Archive::open(temp_file.path(), false).unwrap();
        assert_eq!(ar.get("file").unwrap(), payload, "block size {block_size}");
    }
}

#[test]
fn test_not_found_leaves_archive_usable() {
    let temp_file = write_archive(lz4(64), &[("present", &b"still here"[..])]);
    let mut ar = Archive::open(temp_file.path(), false).unwrap();

    let err = ar.get("missing").unwrap_err();
    assert!(err.is_not_found());
    assert!(!ar.contains("missing"));
    assert!(ar.stat("missing").is_none());

    assert_eq!(ar.get("present").unwrap(), b"still here");
}

#[test]
fn test_unknown_selector_fails_open() {
    let temp_file = write_archive(lz4(64), &[("x", &b"y"[..])]);
    let mut bytes = std::fs::read(temp_file.path()).unwrap();
    bytes[0] = 1;
    std::fs::write(temp_file.path(), &bytes).unwrap();

    for cache in [false, true] {
        match Archive::open(temp_file.path(), cache) {
            Err(ArchiveError::UnsupportedFormat { selector: 1 }) => {}
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_)  => panic!("archive with selector 1 opened"),
        }
    }
}

#[test]
fn test_corrupt_metadata_fails_at_open() {
    let temp_file = write_archive(WriteOptions { codec: CodecId::PassThrough, block_size: 0 }, &[("x", &b"payload"[..])]);
    let mut bytes = std::fs::read(temp_file.path()).unwrap();
    // Chop the last byte of the metadata record.
    bytes.pop();
    std::fs::write(temp_file.path(), &bytes).unwrap();

    match Archive::open(temp_file.path(), false) {
        Err(ArchiveError::Truncated { what: "metadata section", expected: 21, actual: 20, .. }) => {}
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_)  => panic!("archive with truncated metadata opened"),
    }
}

#[test]
fn test_truncated_entry_payload_is_rejected() {
    let temp_file = write_archive(lz4(64), &[("x", &[7u8; 500][..])]);
    let mut bytes = std::fs::read(temp_file.path()).unwrap();
    // Overwrite the first chunk length with a size far past the data.
    bytes[29..33].copy_from_slice(&u32::MAX.to_le_bytes());
    std::fs::write(temp_file.path(), &bytes).unwrap();

    let mut ar = Archive::open(temp_file.path(), false).unwrap();
    match ar.get("x") {
        Err(ArchiveError::Decode { offset: 25, source: CodecError::CorruptBlock { chunk: 0, .. } }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = Archive::open(dir.path().join("nope.marc"), false).err().unwrap();
    assert!(matches!(err, ArchiveError::Io(_)));
}

#[test]
fn test_size_limit_applies_to_entries() {
    let temp_file = write_archive(lz4(1024), &[("small", &[0u8; 100][..]), ("big", &[0u8; 10_000][..])]);
    let opts = OpenOptions { cache_in_memory: false, max_decoded_size: 1024 };
    let mut ar = Archive::open_with(temp_file.path(), opts).unwrap();

    assert!(matches!(ar.get("big"), Err(ArchiveError::SizeTooLarge { .. })));
    assert_eq!(ar.get("small").unwrap(), vec![0u8; 100]);
}

#[test]
fn test_extract_all() {
    let temp_file = write_archive(lz4(256), &[("one.txt", &b"first"[..]), ("two.txt", &b"second"[..])]);
    let dir = TempDir::new().unwrap();

    let mut ar = Archive::open(temp_file.path(), false).unwrap();
    ar.extract_all(dir.path()).unwrap();

    assert_eq!(std::fs::read(dir.path().join("one.txt")).unwrap(), b"first");
    assert_eq!(std::fs::read(dir.path().join("two.txt")).unwrap(), b"second");
}

#[test]
fn test_borrowed_stream_stays_with_caller() {
    let temp_file = write_archive(lz4(64), &[("k", &b"value"[..])]);
    let mut file = File::open(temp_file.path()).unwrap();

    {
        let mut reader = ArchiveReader::new(&mut file).unwrap();
        let table = reader.load_metadata_table().unwrap();
        assert_eq!(reader.load_entry(table.get("k").unwrap()).unwrap(), b"value");
    }

    // Reader is gone; the handle is still open and usable.
    file.seek(SeekFrom::Start(0)).unwrap();
    let mut selector = [0u8; 1];
    file.read_exact(&mut selector).unwrap();
    assert_eq!(selector[0], 2);
}

#[test]
fn test_in_memory_reader_into_inner() {
    let mut buf = Vec::new();
    write_single_entry(&mut buf, "file", b"abc").unwrap();
    let len = buf.len();

    let mut reader = ArchiveReader::new(Cursor::new(buf)).unwrap();
    reader.load_metadata_table().unwrap();
    assert_eq!(reader.into_inner().into_inner().len(), len);
}
