use serde::{Deserialize, Serialize};

/// Kind of node a resolved entry refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
}

/// Metadata of one entry, fixed once its backing store is open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub file_type: FileType,
    /// Uncompressed length in bytes. Zero for directories.
    pub size: u64,
    /// CRC32 of the stored bytes, when the backing store records one.
    pub crc32: Option<u32>,
}

impl Metadata {
    pub fn file(size: u64) -> Self {
        Self {
            file_type: FileType::File,
            size,
            crc32: None,
        }
    }

    pub fn directory() -> Self {
        Self {
            file_type: FileType::Directory,
            size: 0,
            crc32: None,
        }
    }

    pub fn with_crc32(mut self, crc32: u32) -> Self {
        self.crc32 = Some(crc32);
        self
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// How a backing store serves concurrent reads of its content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPolicy {
    /// Readers are independent: positioned reads never share a cursor.
    Concurrent,
    /// One underlying reader is shared and each read op holds its lock.
    Serialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        let f = Metadata::file(42).with_crc32(7);
        assert!(f.is_file());
        assert_eq!(f.size, 42);
        assert_eq!(f.crc32, Some(7));

        let d = Metadata::directory();
        assert!(d.is_directory());
        assert_eq!(d.size, 0);
    }

    #[test]
    fn file_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FileType::Directory).unwrap(), "\"directory\"");
    }
}
