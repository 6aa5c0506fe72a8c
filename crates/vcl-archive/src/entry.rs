use vcl_types::{EntryPath, FileType, Metadata};

/// Kind tag of an index entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::File => 1,
            Self::Directory => 2,
        }
    }

    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::File),
            2 => Some(Self::Directory),
            _ => None,
        }
    }
}

/// How an entry's bytes are stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
    /// Raw bytes.
    Stored,
    /// A zstd stream.
    #[default]
    Zstd,
}

impl Method {
    pub fn method_byte(&self) -> u8 {
        match self {
            Self::Stored => 0,
            Self::Zstd => 1,
        }
    }

    pub fn from_method_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Stored),
            1 => Some(Self::Zstd),
            _ => None,
        }
    }
}

/// One entry of the archive index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: EntryPath,
    pub kind: EntryKind,
    pub method: Method,
    /// Uncompressed size.
    pub size: u64,
    /// Stored size.
    pub compressed_size: u64,
    /// Offset of the entry's local header. Zero for directories.
    pub offset: u64,
    /// CRC32 of the stored bytes.
    pub crc32: u32,
}

impl IndexEntry {
    pub fn metadata(&self) -> Metadata {
        match self.kind {
            EntryKind::File => Metadata::file(self.size).with_crc32(self.crc32),
            EntryKind::Directory => Metadata::directory(),
        }
    }

    pub fn file_type(&self) -> FileType {
        self.metadata().file_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_bytes() {
        assert_eq!(EntryKind::File.type_byte(), 1);
        assert_eq!(EntryKind::from_type_byte(2), Some(EntryKind::Directory));
        assert!(EntryKind::from_type_byte(0).is_none());
        assert!(EntryKind::from_type_byte(255).is_none());
    }

    #[test]
    fn method_bytes() {
        assert_eq!(Method::from_method_byte(Method::Zstd.method_byte()), Some(Method::Zstd));
        assert_eq!(Method::from_method_byte(0), Some(Method::Stored));
        assert!(Method::from_method_byte(9).is_none());
        assert_eq!(Method::default(), Method::Zstd);
    }

    #[test]
    fn directory_metadata_has_no_size() {
        let e = IndexEntry {
            path: EntryPath::parse("org").unwrap(),
            kind: EntryKind::Directory,
            method: Method::Stored,
            size: 0,
            compressed_size: 0,
            offset: 0,
            crc32: 0,
        };
        assert_eq!(e.file_type(), FileType::Directory);
        assert_eq!(e.metadata().crc32, None);
    }
}
