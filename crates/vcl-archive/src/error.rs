use thiserror::Error;
use vcl_types::{EntryPath, TypeError};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid archive magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("unsupported archive version: {0}")]
    UnsupportedVersion(u32),

    #[error("archive checksum mismatch")]
    ChecksumMismatch,

    #[error("entry not found in archive: {0}")]
    EntryNotFound(EntryPath),

    #[error("archive entry is not a file: {0}")]
    NotAFile(EntryPath),

    #[error("duplicate archive entry: {0}")]
    DuplicateEntry(EntryPath),

    #[error("corrupt archive entry at offset {offset}: {reason}")]
    CorruptEntry { offset: u64, reason: String },

    #[error("CRC32 mismatch for entry {path}")]
    CrcMismatch { path: EntryPath },

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("invalid entry path: {0}")]
    InvalidPath(#[from] TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
