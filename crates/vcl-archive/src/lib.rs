//! Archive container format for VCL.
//!
//! An archive (`.vca`) is a single file holding zstd-compressed or stored
//! entries, a sorted path index, and a BLAKE3 trailer checksum.
//!
//! # Layout
//!
//! - **Header**: `VCLA` magic, u32 version, u32 entry count
//! - **Entries**: per file, a local header (method byte, varint size, varint
//!   stored size) followed by the stored bytes
//! - **Index**: see [`ArchiveIndex`]
//! - **Trailer**: u64 index offset, BLAKE3 of every preceding byte, `VCLE`
//!
//! # Components
//!
//! - [`ArchiveWriter`]: builds archives from in-memory data or a host tree
//! - [`ArchiveReader`]: opens an archive and streams entries with
//!   [`EntryReader`]
//! - [`OpenMode`]: shared file handle (serialized reads) or memory map
//!   (independent reads)

pub mod entry;
pub mod error;
pub mod index;
pub mod reader;
pub mod source;
mod varint;
pub mod writer;

pub use entry::{EntryKind, IndexEntry, Method};
pub use error::{ArchiveError, ArchiveResult};
pub use index::ArchiveIndex;
pub use reader::{ArchiveReader, EntryReader};
pub use source::OpenMode;
pub use writer::{ArchiveFile, ArchiveWriter};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use vcl_types::{EntryPath, ReadPolicy};

    fn path(p: &str) -> EntryPath {
        EntryPath::parse(p).unwrap()
    }

    fn sample_bytes(method: Method) -> Vec<u8> {
        let mut writer = ArchiveWriter::new().with_method(method);
        writer.add_file("org/example/A.class", b"class A").unwrap();
        writer.add_file("org/example/B.class", &vec![0xABu8; 100_000]).unwrap();
        writer.add_file("empty.txt", b"").unwrap();
        writer.finish_to_bytes().unwrap()
    }

    #[test]
    fn write_read_roundtrip() {
        for method in [Method::Zstd, Method::Stored] {
            let reader = ArchiveReader::from_bytes(sample_bytes(method)).unwrap();
            reader.verify_checksum().unwrap();
            assert_eq!(reader.read_policy(), ReadPolicy::Concurrent);
            assert_eq!(
                reader.read_entry(&path("org/example/A.class")).unwrap().unwrap(),
                b"class A"
            );
            assert_eq!(
                reader.read_entry(&path("org/example/B.class")).unwrap().unwrap(),
                vec![0xABu8; 100_000]
            );
            assert_eq!(reader.read_entry(&path("empty.txt")).unwrap().unwrap(), b"");
        }
    }

    #[test]
    fn zstd_compresses_repetitive_data() {
        let zstd = sample_bytes(Method::Zstd);
        let stored = sample_bytes(Method::Stored);
        assert!(zstd.len() < stored.len());
        assert!(zstd.len() < 100_000);
    }

    #[test]
    fn empty_archive() {
        let bytes = ArchiveWriter::new().finish_to_bytes().unwrap();
        let reader = ArchiveReader::from_bytes(bytes).unwrap();
        assert_eq!(reader.entry_count(), 0);
        reader.verify_checksum().unwrap();
    }

    #[test]
    fn missing_entry_reads_as_none() {
        let reader = ArchiveReader::from_bytes(sample_bytes(Method::Zstd)).unwrap();
        assert!(reader.read_entry(&path("nope.class")).unwrap().is_none());
        assert!(matches!(
            reader.open_entry(&path("nope.class")),
            Err(ArchiveError::EntryNotFound(_))
        ));
    }

    #[test]
    fn directories_cannot_be_opened() {
        let reader = ArchiveReader::from_bytes(sample_bytes(Method::Zstd)).unwrap();
        assert!(matches!(
            reader.open_entry(&path("org/example")),
            Err(ArchiveError::NotAFile(_))
        ));
        let root = EntryPath::root();
        let top: Vec<_> = reader.children(&root).map(|e| e.path.to_string()).collect();
        assert_eq!(top, vec!["/empty.txt", "/org"]);
    }

    #[test]
    fn bad_magic() {
        let mut data = sample_bytes(Method::Zstd);
        data[0..4].copy_from_slice(b"BADM");
        let err = ArchiveReader::from_bytes(data).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidMagic { .. }));
    }

    #[test]
    fn bad_version() {
        let mut data = sample_bytes(Method::Zstd);
        data[4..8].copy_from_slice(&99u32.to_be_bytes());
        let err = ArchiveReader::from_bytes(data).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedVersion(99)));
    }

    #[test]
    fn too_short() {
        let err = ArchiveReader::from_bytes(vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, ArchiveError::CorruptEntry { .. }));
    }

    #[test]
    fn flipped_content_byte_fails_crc_and_checksum() {
        let mut data = sample_bytes(Method::Stored);
        let reader = ArchiveReader::from_bytes(data.clone()).unwrap();
        let entry = reader.entry(&path("org/example/A.class")).unwrap().clone();
        // local header for a 7-byte stored entry is 3 bytes long
        let pos = entry.offset as usize + 3;
        data[pos] ^= 0xFF;

        let reader = ArchiveReader::from_bytes(data).unwrap();
        assert!(matches!(
            reader.verify_checksum(),
            Err(ArchiveError::ChecksumMismatch)
        ));
        let mut stream = reader.open_entry(&path("org/example/A.class")).unwrap();
        let mut out = Vec::new();
        let err = stream.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn concurrent_streams_on_shared_file_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("shared.vca");
        let mut writer = ArchiveWriter::new();
        let payloads: Vec<Vec<u8>> = (0..8u8)
            .map(|i| (0..50_000u32).map(|j| (j as u8).wrapping_mul(i + 1)).collect())
            .collect();
        for (i, p) in payloads.iter().enumerate() {
            writer.add_file(&format!("data/{i}.bin"), p).unwrap();
        }
        writer.write_to(&archive).unwrap();

        for mode in [OpenMode::Serialized, OpenMode::Mapped] {
            let reader = ArchiveReader::open(&archive, mode).unwrap();
            let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
            pool.scope(|s| {
                for round in 0..32usize {
                    let reader = &reader;
                    let payloads = &payloads;
                    s.spawn(move |_| {
                        let i = round % payloads.len();
                        let mut stream = reader.open_entry(&path(&format!("data/{i}.bin"))).unwrap();
                        let mut out = Vec::new();
                        let mut chunk = [0u8; 333];
                        loop {
                            let n = stream.read(&mut chunk).unwrap();
                            if n == 0 {
                                break;
                            }
                            out.extend_from_slice(&chunk[..n]);
                        }
                        assert_eq!(&out, &payloads[i]);
                    });
                }
            });
        }
    }

    /// Re-index `bytes` after `edit` and reseal the trailer.
    fn with_edited_index(bytes: &[u8], edit: impl FnOnce(&mut Vec<IndexEntry>)) -> Vec<u8> {
        let trailer_start = bytes.len() - 44;
        let index_offset =
            u64::from_be_bytes(bytes[trailer_start..trailer_start + 8].try_into().unwrap());
        let index = ArchiveIndex::from_bytes(&bytes[index_offset as usize..trailer_start]).unwrap();
        let mut entries = index.entries().to_vec();
        edit(&mut entries);

        let mut out = bytes[..index_offset as usize].to_vec();
        out.extend_from_slice(&ArchiveIndex::build(entries).to_bytes());
        out.extend_from_slice(&index_offset.to_be_bytes());
        let checksum = blake3::hash(&out);
        out.extend_from_slice(checksum.as_bytes());
        out.extend_from_slice(b"VCLE");
        out
    }

    fn edit_entry(entries: &mut [IndexEntry], p: &str, edit: impl FnOnce(&mut IndexEntry)) {
        let entry = entries.iter_mut().find(|e| e.path.as_str() == p).unwrap();
        edit(entry);
    }

    #[test]
    fn resealed_archive_still_opens() {
        let bytes = with_edited_index(&sample_bytes(Method::Stored), |_| {});
        let reader = ArchiveReader::from_bytes(bytes).unwrap();
        reader.verify_checksum().unwrap();
        assert_eq!(
            reader.read_entry(&path("org/example/A.class")).unwrap().unwrap(),
            b"class A"
        );
    }

    #[test]
    fn stored_entry_with_inflated_size_is_rejected_at_open() {
        let bytes = with_edited_index(&sample_bytes(Method::Stored), |entries| {
            edit_entry(entries, "org/example/A.class", |e| e.size = u64::MAX / 2);
        });
        let err = ArchiveReader::from_bytes(bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::IndexCorrupted(_)), "{err:?}");
    }

    #[test]
    fn entry_extending_past_body_is_rejected_at_open() {
        for csize in [u64::MAX - 3, 1 << 40] {
            let bytes = with_edited_index(&sample_bytes(Method::Zstd), |entries| {
                edit_entry(entries, "org/example/A.class", |e| e.compressed_size = csize);
            });
            let err = ArchiveReader::from_bytes(bytes).unwrap_err();
            assert!(matches!(err, ArchiveError::IndexCorrupted(_)), "{err:?}");
        }
    }

    #[test]
    fn entry_offset_inside_header_is_rejected_at_open() {
        let bytes = with_edited_index(&sample_bytes(Method::Stored), |entries| {
            edit_entry(entries, "org/example/A.class", |e| e.offset = 2);
        });
        let err = ArchiveReader::from_bytes(bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::IndexCorrupted(_)), "{err:?}");
    }

    #[test]
    fn zstd_entry_with_inflated_size_fails_without_reserving_it() {
        let bytes = with_edited_index(&sample_bytes(Method::Zstd), |entries| {
            edit_entry(entries, "org/example/A.class", |e| e.size = u64::MAX / 2);
        });
        let reader = ArchiveReader::from_bytes(bytes).unwrap();
        assert!(reader.read_entry(&path("org/example/A.class")).is_err());
    }
}
