use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use vcl_types::{ContentDigest, EntryPath, ReadPolicy};

use crate::entry::{EntryKind, IndexEntry, Method};
use crate::error::{ArchiveError, ArchiveResult};
use crate::index::{read_u32, read_u64, ArchiveIndex};
use crate::source::{OpenMode, Source};
use crate::varint::decode_varint;

pub(crate) const ARCHIVE_MAGIC: &[u8; 4] = b"VCLA";
pub(crate) const END_MAGIC: &[u8; 4] = b"VCLE";
pub(crate) const ARCHIVE_VERSION: u32 = 1;

const HEADER_LEN: u64 = 12;
const TRAILER_LEN: u64 = 8 + 32 + 4;
/// method byte + two varints of at most 10 bytes each
const MAX_LOCAL_HEADER: u64 = 21;
const CHECKSUM_CHUNK: usize = 64 * 1024;
/// Upper bound on buffer space reserved from a declared entry size.
const PREALLOC_LIMIT: u64 = 1024 * 1024;

/// Reads entries of one archive through its path index.
///
/// The index is parsed when the archive is opened and never changes, so
/// lookups take `&self` and need no locking. Entry content is read through
/// [`EntryReader`] streams; whether those streams share one file handle or
/// read independent slices depends on the [`OpenMode`].
#[derive(Debug)]
pub struct ArchiveReader {
    source: Arc<Source>,
    index: ArchiveIndex,
    checksum: ContentDigest,
}

impl ArchiveReader {
    /// Open from raw bytes.
    pub fn from_bytes(data: Vec<u8>) -> ArchiveResult<Self> {
        Self::from_source(Source::Bytes(data))
    }

    /// Open an archive file.
    pub fn open(path: &Path, mode: OpenMode) -> ArchiveResult<Self> {
        let reader = Self::from_source(Source::open(path, mode)?)?;
        tracing::debug!(
            "opened archive {:?} ({:?}, {} entries)",
            path,
            mode,
            reader.entry_count()
        );
        Ok(reader)
    }

    fn from_source(source: Source) -> ArchiveResult<Self> {
        let len = source.len();
        if len < HEADER_LEN + TRAILER_LEN {
            return Err(ArchiveError::CorruptEntry {
                offset: 0,
                reason: "archive too short".into(),
            });
        }

        let mut header = [0u8; HEADER_LEN as usize];
        source.read_exact_at(0, &mut header)?;
        if &header[0..4] != ARCHIVE_MAGIC {
            return Err(ArchiveError::InvalidMagic {
                expected: "VCLA".into(),
                actual: String::from_utf8_lossy(&header[0..4]).into(),
            });
        }
        let version = read_u32(&header, 4)?;
        if version != ARCHIVE_VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }

        let trailer_start = len - TRAILER_LEN;
        let mut trailer = [0u8; TRAILER_LEN as usize];
        source.read_exact_at(trailer_start, &mut trailer)?;
        if &trailer[40..44] != END_MAGIC {
            return Err(ArchiveError::InvalidMagic {
                expected: "VCLE".into(),
                actual: String::from_utf8_lossy(&trailer[40..44]).into(),
            });
        }
        let index_offset = read_u64(&trailer, 0)?;
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&trailer[8..40]);

        if index_offset < HEADER_LEN || index_offset > trailer_start {
            return Err(ArchiveError::IndexCorrupted(format!(
                "index offset {index_offset} outside archive body"
            )));
        }
        let mut index_bytes = vec![0u8; (trailer_start - index_offset) as usize];
        source.read_exact_at(index_offset, &mut index_bytes)?;
        let index = ArchiveIndex::from_bytes(&index_bytes)?;
        check_entry_bounds(&index, index_offset)?;

        Ok(Self {
            source: Arc::new(source),
            index,
            checksum: ContentDigest::from_hash(checksum),
        })
    }

    /// Recompute the BLAKE3 trailer checksum over the archive body.
    pub fn verify_checksum(&self) -> ArchiveResult<()> {
        let body_len = self.source.len() - 32 - END_MAGIC.len() as u64;
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; CHECKSUM_CHUNK];
        let mut offset = 0u64;
        while offset < body_len {
            let n = ((body_len - offset) as usize).min(CHECKSUM_CHUNK);
            self.source.read_exact_at(offset, &mut buf[..n])?;
            hasher.update(&buf[..n]);
            offset += n as u64;
        }
        if hasher.finalize().as_bytes() != self.checksum.as_bytes() {
            return Err(ArchiveError::ChecksumMismatch);
        }
        Ok(())
    }

    /// Trailer checksum recorded by the writer.
    pub fn checksum(&self) -> ContentDigest {
        self.checksum
    }

    pub fn read_policy(&self) -> ReadPolicy {
        self.source.policy()
    }

    pub fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    /// Look up an entry by path.
    pub fn entry(&self, path: &EntryPath) -> Option<&IndexEntry> {
        self.index.lookup(path)
    }

    pub fn entry_count(&self) -> usize {
        self.index.entry_count()
    }

    /// Immediate children of a directory.
    pub fn children<'a>(&'a self, dir: &'a EntryPath) -> impl Iterator<Item = &'a IndexEntry> + 'a {
        self.index.children(dir)
    }

    /// Open a stream over a file entry's uncompressed content.
    pub fn open_entry(&self, path: &EntryPath) -> ArchiveResult<EntryReader> {
        let entry = self
            .index
            .lookup(path)
            .ok_or_else(|| ArchiveError::EntryNotFound(path.clone()))?;
        if entry.kind != EntryKind::File {
            return Err(ArchiveError::NotAFile(path.clone()));
        }

        let corrupt = |reason: String| ArchiveError::CorruptEntry {
            offset: entry.offset,
            reason,
        };
        let available = self.source.len().saturating_sub(entry.offset);
        let mut header = vec![0u8; MAX_LOCAL_HEADER.min(available) as usize];
        self.source.read_exact_at(entry.offset, &mut header)?;

        let method = header
            .first()
            .and_then(|b| Method::from_method_byte(*b))
            .ok_or_else(|| corrupt("unknown method byte".into()))?;
        let (size, a) = decode_varint(&header[1..])?;
        let (compressed_size, b) = decode_varint(&header[1 + a..])?;
        if method != entry.method || size != entry.size || compressed_size != entry.compressed_size
        {
            return Err(corrupt("local header disagrees with index".into()));
        }

        let start = entry.offset + 1 + a as u64 + b as u64;
        let body_end = self.source.len() - TRAILER_LEN;
        match start.checked_add(compressed_size) {
            Some(end) if end <= body_end => {}
            _ => return Err(corrupt("stored data extends beyond archive body".into())),
        }

        let raw = RawEntry {
            source: Arc::clone(&self.source),
            path: entry.path.clone(),
            start,
            len: compressed_size,
            pos: 0,
            crc: crc32fast::Hasher::new(),
            expected_crc: entry.crc32,
            verified: false,
        };
        let decoder = match method {
            Method::Stored => Decoder::Stored(raw),
            Method::Zstd => Decoder::Zstd(Box::new(zstd::stream::read::Decoder::new(raw)?)),
        };
        Ok(EntryReader {
            decoder,
            path: entry.path.clone(),
            size,
            produced: 0,
        })
    }

    /// Read a whole entry. Returns `Ok(None)` if the path is absent.
    pub fn read_entry(&self, path: &EntryPath) -> ArchiveResult<Option<Vec<u8>>> {
        let mut reader = match self.open_entry(path) {
            Ok(reader) => reader,
            Err(ArchiveError::EntryNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut data = Vec::with_capacity(reader.size().min(PREALLOC_LIMIT) as usize);
        reader.read_to_end(&mut data)?;
        Ok(Some(data))
    }
}

/// Every file entry must sit between the header and `body_end`, where the
/// index begins. Stored entries hold exactly their declared size.
fn check_entry_bounds(index: &ArchiveIndex, body_end: u64) -> ArchiveResult<()> {
    for entry in index.entries() {
        if entry.kind != EntryKind::File {
            continue;
        }
        let end = entry
            .offset
            .checked_add(entry.compressed_size)
            .filter(|end| entry.offset >= HEADER_LEN && *end < body_end);
        if end.is_none() {
            return Err(ArchiveError::IndexCorrupted(format!(
                "entry {} at offset {} ({} bytes) outside archive body",
                entry.path, entry.offset, entry.compressed_size
            )));
        }
        if entry.method == Method::Stored && entry.size != entry.compressed_size {
            return Err(ArchiveError::IndexCorrupted(format!(
                "stored entry {} declares {} bytes but holds {}",
                entry.path, entry.size, entry.compressed_size
            )));
        }
    }
    Ok(())
}

/// Stored bytes of one entry, read in positioned chunks.
struct RawEntry {
    source: Arc<Source>,
    path: EntryPath,
    start: u64,
    len: u64,
    pos: u64,
    crc: crc32fast::Hasher,
    expected_crc: u32,
    verified: bool,
}

impl RawEntry {
    /// Consume whatever is left and check the CRC.
    fn finish(&mut self) -> io::Result<()> {
        let mut buf = [0u8; 4096];
        while self.pos < self.len {
            self.read(&mut buf)?;
        }
        if !self.verified {
            let actual = self.crc.clone().finalize();
            if actual != self.expected_crc {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    ArchiveError::CrcMismatch {
                        path: self.path.clone(),
                    },
                ));
            }
            self.verified = true;
        }
        Ok(())
    }
}

impl Read for RawEntry {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len {
            self.finish()?;
            return Ok(0);
        }
        let want = buf.len().min((self.len - self.pos) as usize);
        let n = self.source.read_at(self.start + self.pos, &mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("entry {} truncated", self.path),
            ));
        }
        self.crc.update(&buf[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

enum Decoder {
    Stored(RawEntry),
    Zstd(Box<zstd::stream::read::Decoder<'static, io::BufReader<RawEntry>>>),
}

impl Decoder {
    fn raw_mut(&mut self) -> &mut RawEntry {
        match self {
            Self::Stored(raw) => raw,
            Self::Zstd(decoder) => decoder.get_mut().get_mut(),
        }
    }
}

/// Stream over one entry's uncompressed content.
///
/// Streams are independent: each keeps its own position and only touches
/// the shared archive source through positioned reads. The stored bytes'
/// CRC32 and the uncompressed length are checked when the stream reaches
/// its end; a mismatch surfaces as an [`io::ErrorKind::InvalidData`] error.
pub struct EntryReader {
    decoder: Decoder,
    path: EntryPath,
    size: u64,
    produced: u64,
}

impl EntryReader {
    pub fn path(&self) -> &EntryPath {
        &self.path
    }

    /// Uncompressed size recorded in the index.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = match &mut self.decoder {
            Decoder::Stored(raw) => raw.read(buf)?,
            Decoder::Zstd(decoder) => decoder.read(buf)?,
        };
        self.produced += n as u64;
        if self.produced > self.size {
            return Err(invalid_length(&self.path, self.size, self.produced));
        }
        if n == 0 {
            self.decoder.raw_mut().finish()?;
            if self.produced != self.size {
                return Err(invalid_length(&self.path, self.size, self.produced));
            }
        }
        Ok(n)
    }
}

impl std::fmt::Debug for EntryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryReader")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("produced", &self.produced)
            .finish()
    }
}

fn invalid_length(path: &EntryPath, expected: u64, actual: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("entry {path}: expected {expected} bytes, got {actual}"),
    )
}
