use vcl_types::EntryPath;

use crate::entry::{EntryKind, IndexEntry, Method};
use crate::error::{ArchiveError, ArchiveResult};
use crate::varint::{decode_varint, encode_varint};

pub(crate) const INDEX_MAGIC: &[u8; 4] = b"VCLI";
pub(crate) const INDEX_VERSION: u32 = 1;

/// Path index of an archive.
///
/// Entries are kept sorted by path so lookups are a binary search and the
/// children of a directory form one contiguous run.
///
/// Layout:
/// - `VCLI` magic, u32 version, u32 entry count
/// - per entry: varint path length, path bytes, kind byte, method byte,
///   varint size, varint stored size, u64 offset, u32 crc32
#[derive(Clone, Debug, Default)]
pub struct ArchiveIndex {
    entries: Vec<IndexEntry>,
}

impl ArchiveIndex {
    /// Build an index from entries in any order.
    pub fn build(mut entries: Vec<IndexEntry>) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Self { entries }
    }

    /// Look up an entry by path.
    pub fn lookup(&self, path: &EntryPath) -> Option<&IndexEntry> {
        self.entries
            .binary_search_by(|probe| probe.path.cmp(path))
            .ok()
            .map(|pos| &self.entries[pos])
    }

    pub fn contains(&self, path: &EntryPath) -> bool {
        self.lookup(path).is_some()
    }

    /// Immediate children of `dir`, in path order.
    pub fn children<'a>(&'a self, dir: &'a EntryPath) -> impl Iterator<Item = &'a IndexEntry> + 'a {
        let start = if dir.is_root() {
            0
        } else {
            let prefix = format!("{}/", dir.as_str());
            self.entries
                .partition_point(|e| e.path.as_str() < prefix.as_str())
        };
        self.entries[start..]
            .iter()
            .take_while(move |e| e.path.starts_with(dir))
            .filter(move |e| e.path.parent().as_ref() == Some(dir))
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn file_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::File)
            .count()
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(INDEX_MAGIC);
        buf.extend_from_slice(&INDEX_VERSION.to_be_bytes());
        buf.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for entry in &self.entries {
            let path = entry.path.as_str().as_bytes();
            encode_varint(&mut buf, path.len() as u64);
            buf.extend_from_slice(path);
            buf.push(entry.kind.type_byte());
            buf.push(entry.method.method_byte());
            encode_varint(&mut buf, entry.size);
            encode_varint(&mut buf, entry.compressed_size);
            buf.extend_from_slice(&entry.offset.to_be_bytes());
            buf.extend_from_slice(&entry.crc32.to_be_bytes());
        }
        buf
    }

    /// Deserialize from bytes.
    pub fn from_bytes(data: &[u8]) -> ArchiveResult<Self> {
        if data.len() < 12 {
            return Err(ArchiveError::IndexCorrupted("too short".into()));
        }
        if &data[0..4] != INDEX_MAGIC {
            return Err(ArchiveError::InvalidMagic {
                expected: "VCLI".into(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }
        let version = read_u32(data, 4)?;
        if version != INDEX_VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }
        let count = read_u32(data, 8)? as usize;

        let mut pos = 12;
        let mut entries = Vec::with_capacity(count.min(data.len() / 16));
        for _ in 0..count {
            let (path_len, consumed) = decode_varint(data.get(pos..).unwrap_or_default())?;
            pos += consumed;
            let path_end = pos
                .checked_add(path_len as usize)
                .filter(|end| *end <= data.len())
                .ok_or_else(|| ArchiveError::IndexCorrupted("path truncated".into()))?;
            let raw_path = std::str::from_utf8(&data[pos..path_end])
                .map_err(|e| ArchiveError::IndexCorrupted(format!("path not UTF-8: {e}")))?;
            let path = EntryPath::parse(raw_path)?;
            pos = path_end;

            let kind_byte = *data
                .get(pos)
                .ok_or_else(|| ArchiveError::IndexCorrupted("kind truncated".into()))?;
            let kind = EntryKind::from_type_byte(kind_byte).ok_or_else(|| {
                ArchiveError::IndexCorrupted(format!("unknown kind byte: {kind_byte}"))
            })?;
            let method_byte = *data
                .get(pos + 1)
                .ok_or_else(|| ArchiveError::IndexCorrupted("method truncated".into()))?;
            let method = Method::from_method_byte(method_byte).ok_or_else(|| {
                ArchiveError::IndexCorrupted(format!("unknown method byte: {method_byte}"))
            })?;
            pos += 2;

            let (size, consumed) = decode_varint(data.get(pos..).unwrap_or_default())?;
            pos += consumed;
            let (compressed_size, consumed) = decode_varint(data.get(pos..).unwrap_or_default())?;
            pos += consumed;

            let offset = read_u64(data, pos)?;
            let crc32 = read_u32(data, pos + 8)?;
            pos += 12;

            entries.push(IndexEntry {
                path,
                kind,
                method,
                size,
                compressed_size,
                offset,
                crc32,
            });
        }

        if pos != data.len() {
            return Err(ArchiveError::IndexCorrupted(format!(
                "{} trailing bytes",
                data.len() - pos
            )));
        }
        Ok(Self::build(entries))
    }
}

pub(crate) fn read_u32(data: &[u8], pos: usize) -> ArchiveResult<u32> {
    data.get(pos..pos + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or_else(|| ArchiveError::IndexCorrupted(format!("u32 truncated at {pos}")))
}

pub(crate) fn read_u64(data: &[u8], pos: usize) -> ArchiveResult<u64> {
    data.get(pos..pos + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_be_bytes)
        .ok_or_else(|| ArchiveError::IndexCorrupted(format!("u64 truncated at {pos}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, offset: u64) -> IndexEntry {
        IndexEntry {
            path: EntryPath::parse(path).unwrap(),
            kind: EntryKind::File,
            method: Method::Zstd,
            size: 10,
            compressed_size: 7,
            offset,
            crc32: offset as u32 * 3,
        }
    }

    fn dir(path: &str) -> IndexEntry {
        IndexEntry {
            path: EntryPath::parse(path).unwrap(),
            kind: EntryKind::Directory,
            method: Method::Stored,
            size: 0,
            compressed_size: 0,
            offset: 0,
            crc32: 0,
        }
    }

    fn sample() -> ArchiveIndex {
        ArchiveIndex::build(vec![
            file("org/b/C.class", 300),
            dir("org"),
            file("README", 12),
            dir("org/b"),
            file("org/A.class", 100),
            dir("org-extra"),
            file("org/b/D.class", 400),
        ])
    }

    #[test]
    fn build_empty_index() {
        let idx = ArchiveIndex::build(vec![]);
        assert_eq!(idx.entry_count(), 0);
        assert!(idx.lookup(&EntryPath::parse("x").unwrap()).is_none());
        assert_eq!(idx.children(&EntryPath::root()).count(), 0);
    }

    #[test]
    fn lookup_finds_entries() {
        let idx = sample();
        let e = idx.lookup(&EntryPath::parse("org/A.class").unwrap()).unwrap();
        assert_eq!(e.offset, 100);
        assert!(idx.contains(&EntryPath::parse("org/b").unwrap()));
        assert!(!idx.contains(&EntryPath::parse("org/Z.class").unwrap()));
        assert_eq!(idx.file_count(), 4);
    }

    #[test]
    fn children_are_immediate_only() {
        let idx = sample();
        let root = EntryPath::root();
        let top: Vec<&str> = idx.children(&root).map(|e| e.path.as_str()).collect();
        assert_eq!(top, vec!["README", "org", "org-extra"]);

        let org = EntryPath::parse("org").unwrap();
        let names: Vec<&str> = idx.children(&org).map(|e| e.path.as_str()).collect();
        assert_eq!(names, vec!["org/A.class", "org/b"]);

        let b = EntryPath::parse("org/b").unwrap();
        assert_eq!(idx.children(&b).count(), 2);
    }

    #[test]
    fn serialization_roundtrip() {
        let idx = sample();
        let bytes = idx.to_bytes();
        let back = ArchiveIndex::from_bytes(&bytes).unwrap();
        assert_eq!(back.entries(), idx.entries());
    }

    #[test]
    fn from_bytes_bad_magic() {
        let err = ArchiveIndex::from_bytes(b"BADMxxxxxxxx").unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidMagic { .. }));
    }

    #[test]
    fn from_bytes_bad_version() {
        let mut data = Vec::new();
        data.extend_from_slice(INDEX_MAGIC);
        data.extend_from_slice(&99u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        let err = ArchiveIndex::from_bytes(&data).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedVersion(99)));
    }

    #[test]
    fn from_bytes_truncated() {
        let bytes = sample().to_bytes();
        let err = ArchiveIndex::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, ArchiveError::IndexCorrupted(_)));
        assert!(matches!(
            ArchiveIndex::from_bytes(b"VCLI").unwrap_err(),
            ArchiveError::IndexCorrupted(_)
        ));
    }
}
