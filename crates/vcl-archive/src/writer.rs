use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use vcl_types::{ContentDigest, EntryPath, TypeError};

use crate::entry::{EntryKind, IndexEntry, Method};
use crate::error::{ArchiveError, ArchiveResult};
use crate::index::ArchiveIndex;
use crate::reader::{ARCHIVE_MAGIC, ARCHIVE_VERSION, END_MAGIC};
use crate::varint::encode_varint;

/// Result of writing an archive to disk.
#[derive(Clone, Debug)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub entry_count: usize,
    pub checksum: ContentDigest,
}

/// Builds an archive from files and directories.
///
/// Parent directories of every added file are recorded implicitly, so a
/// reader can answer `is_directory` for every ancestor of a file.
pub struct ArchiveWriter {
    method: Method,
    level: i32,
    files: BTreeMap<EntryPath, Vec<u8>>,
    dirs: BTreeSet<EntryPath>,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            method: Method::default(),
            level: 3,
            files: BTreeMap::new(),
            dirs: BTreeSet::new(),
        }
    }

    /// Storage method applied to every file entry.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// zstd compression level.
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Add a file entry.
    pub fn add_file(&mut self, path: &str, data: &[u8]) -> ArchiveResult<()> {
        let path = parse_non_root(path)?;
        if self.files.contains_key(&path) || self.dirs.contains(&path) {
            return Err(ArchiveError::DuplicateEntry(path));
        }
        self.add_ancestors(&path)?;
        self.files.insert(path, data.to_vec());
        Ok(())
    }

    /// Add a directory entry. Adding an existing directory is a no-op.
    pub fn add_directory(&mut self, path: &str) -> ArchiveResult<()> {
        let path = parse_non_root(path)?;
        if self.files.contains_key(&path) {
            return Err(ArchiveError::DuplicateEntry(path));
        }
        self.add_ancestors(&path)?;
        self.dirs.insert(path);
        Ok(())
    }

    /// Add every file and directory below `root`. Returns the number of files
    /// added.
    pub fn add_tree(&mut self, root: &Path) -> ArchiveResult<usize> {
        let mut added = 0;
        for entry in walkdir::WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                ArchiveError::Io(std::io::Error::other(format!("walking {root:?}: {e}")))
            })?;
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            let name = relative.to_string_lossy().replace('\\', "/");
            if entry.file_type().is_dir() {
                self.add_directory(&name)?;
            } else if entry.file_type().is_file() {
                let data = std::fs::read(entry.path())?;
                self.add_file(&name, &data)?;
                added += 1;
            } else {
                tracing::debug!("skipping non-regular entry {:?}", entry.path());
            }
        }
        Ok(added)
    }

    /// Number of files queued.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write the archive to `path`.
    pub fn write_to(self, path: &Path) -> ArchiveResult<ArchiveFile> {
        let entry_count = self.files.len() + self.dirs.len();
        let bytes = self.finish_to_bytes()?;
        let checksum_start = bytes.len() - END_MAGIC.len() - 32;
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&bytes[checksum_start..checksum_start + 32]);
        std::fs::write(path, &bytes)?;
        tracing::debug!("wrote archive {:?} ({} entries, {} bytes)", path, entry_count, bytes.len());
        Ok(ArchiveFile {
            path: path.to_path_buf(),
            entry_count,
            checksum: ContentDigest::from_hash(checksum),
        })
    }

    /// Build the archive in memory (no disk I/O).
    pub fn finish_to_bytes(self) -> ArchiveResult<Vec<u8>> {
        let mut data = Vec::new();
        let mut index_entries = Vec::with_capacity(self.files.len() + self.dirs.len());

        // Header: magic + version + entry count
        data.extend_from_slice(ARCHIVE_MAGIC);
        data.extend_from_slice(&ARCHIVE_VERSION.to_be_bytes());
        data.extend_from_slice(&((self.files.len() + self.dirs.len()) as u32).to_be_bytes());

        for (path, content) in self.files {
            let offset = data.len() as u64;
            let stored = match self.method {
                Method::Stored => content.clone(),
                Method::Zstd => zstd::encode_all(content.as_slice(), self.level)
                    .map_err(|e| ArchiveError::CompressionFailed(e.to_string()))?,
            };

            // Local header: method byte, size, stored size
            data.push(self.method.method_byte());
            encode_varint(&mut data, content.len() as u64);
            encode_varint(&mut data, stored.len() as u64);

            let crc32 = crc32fast::hash(&stored);
            data.extend_from_slice(&stored);

            index_entries.push(IndexEntry {
                path,
                kind: EntryKind::File,
                method: self.method,
                size: content.len() as u64,
                compressed_size: stored.len() as u64,
                offset,
                crc32,
            });
        }

        for path in self.dirs {
            index_entries.push(IndexEntry {
                path,
                kind: EntryKind::Directory,
                method: Method::Stored,
                size: 0,
                compressed_size: 0,
                offset: 0,
                crc32: 0,
            });
        }

        let index_offset = data.len() as u64;
        data.extend_from_slice(&ArchiveIndex::build(index_entries).to_bytes());

        // Trailer: index offset, BLAKE3 of everything before it, end magic
        data.extend_from_slice(&index_offset.to_be_bytes());
        let checksum = *blake3::hash(&data).as_bytes();
        data.extend_from_slice(&checksum);
        data.extend_from_slice(END_MAGIC);
        Ok(data)
    }

    fn add_ancestors(&mut self, path: &EntryPath) -> ArchiveResult<()> {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.is_root() {
                break;
            }
            if self.files.contains_key(&dir) {
                return Err(ArchiveError::DuplicateEntry(dir));
            }
            current = dir.parent();
            self.dirs.insert(dir);
        }
        Ok(())
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_non_root(raw: &str) -> ArchiveResult<EntryPath> {
    let path = EntryPath::parse(raw)?;
    if path.is_root() {
        return Err(ArchiveError::InvalidPath(TypeError::InvalidPath {
            input: raw.to_string(),
            reason: "the archive root cannot be an entry".into(),
        }));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_parent_directories() {
        let mut writer = ArchiveWriter::new();
        writer.add_file("org/apache/A.class", b"a").unwrap();
        let bytes = writer.finish_to_bytes().unwrap();
        let reader = crate::ArchiveReader::from_bytes(bytes).unwrap();
        assert!(reader.entry(&EntryPath::parse("org").unwrap()).is_some());
        assert!(reader.entry(&EntryPath::parse("org/apache").unwrap()).is_some());
        assert_eq!(reader.entry_count(), 3);
    }

    #[test]
    fn duplicate_file_is_rejected() {
        let mut writer = ArchiveWriter::new();
        writer.add_file("a.txt", b"1").unwrap();
        let err = writer.add_file("/a.txt", b"2").unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntry(_)));
    }

    #[test]
    fn file_cannot_become_directory() {
        let mut writer = ArchiveWriter::new();
        writer.add_file("a", b"1").unwrap();
        assert!(matches!(
            writer.add_file("a/b", b"2"),
            Err(ArchiveError::DuplicateEntry(_))
        ));
        assert!(matches!(
            writer.add_directory("a"),
            Err(ArchiveError::DuplicateEntry(_))
        ));
    }

    #[test]
    fn root_is_not_an_entry() {
        let mut writer = ArchiveWriter::new();
        assert!(matches!(
            writer.add_file("/", b"x"),
            Err(ArchiveError::InvalidPath(_))
        ));
    }

    #[test]
    fn add_tree_copies_host_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("org/example")).unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        std::fs::write(dir.path().join("org/example/Main.class"), b"main").unwrap();
        std::fs::write(dir.path().join("app.properties"), b"k=v").unwrap();

        let mut writer = ArchiveWriter::new();
        assert_eq!(writer.add_tree(dir.path()).unwrap(), 2);
        let out = dir.path().join("out.vca");
        let file = writer.write_to(&out).unwrap();
        assert_eq!(file.entry_count, 5);

        let reader = crate::ArchiveReader::open(&out, crate::OpenMode::Serialized).unwrap();
        assert_eq!(reader.checksum(), file.checksum);
        assert!(reader.entry(&EntryPath::parse("empty").unwrap()).is_some());
        assert_eq!(
            reader
                .read_entry(&EntryPath::parse("org/example/Main.class").unwrap())
                .unwrap()
                .unwrap(),
            b"main"
        );
    }
}
