use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use vcl_types::ReadPolicy;

/// How an archive file is opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// One file handle shared by every stream. Each positioned read holds the
    /// handle's lock for its seek and read.
    #[default]
    Serialized,
    /// Memory-mapped. Streams read independent slices without locking.
    Mapped,
}

/// Random-access bytes backing an archive.
pub(crate) enum Source {
    Bytes(Vec<u8>),
    Mapped(memmap2::Mmap),
    File { file: Mutex<File>, len: u64 },
}

impl Source {
    pub(crate) fn open(path: &Path, mode: OpenMode) -> io::Result<Self> {
        let file = File::open(path)?;
        match mode {
            OpenMode::Serialized => {
                let len = file.metadata()?.len();
                Ok(Self::File {
                    file: Mutex::new(file),
                    len,
                })
            }
            OpenMode::Mapped => {
                // SAFETY: archives are read-only inputs; the map is never
                // written through and callers must not truncate the file
                // while it is open.
                let map = unsafe { memmap2::Mmap::map(&file)? };
                Ok(Self::Mapped(map))
            }
        }
    }

    pub(crate) fn len(&self) -> u64 {
        match self {
            Self::Bytes(b) => b.len() as u64,
            Self::Mapped(m) => m.len() as u64,
            Self::File { len, .. } => *len,
        }
    }

    pub(crate) fn policy(&self) -> ReadPolicy {
        match self {
            Self::Bytes(_) | Self::Mapped(_) => ReadPolicy::Concurrent,
            Self::File { .. } => ReadPolicy::Serialized,
        }
    }

    /// Read up to `buf.len()` bytes at `offset`. One call is one read op.
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Bytes(b) => Ok(copy_from(b, offset, buf)),
            Self::Mapped(m) => Ok(copy_from(m, offset, buf)),
            Self::File { file, .. } => {
                let mut file = file
                    .lock()
                    .map_err(|_| io::Error::other("archive file lock poisoned"))?;
                file.seek(SeekFrom::Start(offset))?;
                file.read(buf)
            }
        }
    }

    pub(crate) fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(offset, buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("archive truncated at offset {offset}"),
                    ))
                }
                Ok(n) => {
                    offset += n as u64;
                    buf = &mut buf[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn copy_from(data: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    let start = (offset as usize).min(data.len());
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    n
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Bytes(_) => "bytes",
            Self::Mapped(_) => "mapped",
            Self::File { .. } => "file",
        };
        f.debug_struct("Source")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}
