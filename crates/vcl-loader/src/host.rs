//! The host runtime's side of class loading: parent delegation and turning
//! bytecode into class objects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use vcl_store::FileHandle;
use vcl_types::{ContentDigest, FileUri};

use crate::error::{LoaderError, LoaderResult};

/// Class file magic number.
pub const CLASS_MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

/// A class produced by a [`ClassDefiner`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefinedClass {
    pub name: String,
    /// Length of the bytecode.
    pub len: usize,
    pub digest: ContentDigest,
    /// Where the bytecode came from.
    pub source: FileUri,
    /// Identity assigned by the definer; distinct for every definition.
    pub id: u64,
}

/// Shared reference to a defined class.
pub type ClassRef = Arc<DefinedClass>;

/// The loader a [`VfsClassLoader`](crate::VfsClassLoader) asks first.
pub trait DelegateLoader: Send + Sync {
    /// `Ok(None)` when the delegate does not know the class.
    fn load_class(&self, name: &str) -> LoaderResult<Option<ClassRef>>;

    /// Every resource the delegate has under `name`. May be empty.
    fn get_resources(&self, name: &str) -> LoaderResult<Vec<FileHandle>>;

    fn get_resource(&self, name: &str) -> LoaderResult<Option<FileHandle>> {
        Ok(self.get_resources(name)?.into_iter().next())
    }
}

/// A parent that never finds anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoParent;

impl DelegateLoader for NoParent {
    fn load_class(&self, _name: &str) -> LoaderResult<Option<ClassRef>> {
        Ok(None)
    }

    fn get_resources(&self, _name: &str) -> LoaderResult<Vec<FileHandle>> {
        Ok(Vec::new())
    }
}

/// Turns bytecode into a class object.
pub trait ClassDefiner: Send + Sync {
    fn define_class(&self, name: &str, bytes: &[u8], source: &FileUri) -> LoaderResult<ClassRef>;
}

/// Accepts anything that starts with the class file magic.
#[derive(Debug, Default)]
pub struct BytecodeDefiner {
    next_id: AtomicU64,
}

impl BytecodeDefiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of classes defined so far.
    pub fn defined(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

impl ClassDefiner for BytecodeDefiner {
    fn define_class(&self, name: &str, bytes: &[u8], source: &FileUri) -> LoaderResult<ClassRef> {
        if !bytes.starts_with(&CLASS_MAGIC) {
            return Err(LoaderError::Define {
                name: name.to_string(),
                reason: format!("{source} is not a class file"),
            });
        }
        Ok(Arc::new(DefinedClass {
            name: name.to_string(),
            len: bytes.len(),
            digest: ContentDigest::of(bytes),
            source: source.clone(),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> FileUri {
        FileUri::parse("mem:///t!/a/B.class").unwrap()
    }

    #[test]
    fn defines_class_files() {
        let definer = BytecodeDefiner::new();
        let a = definer
            .define_class("a.B", b"\xCA\xFE\xBA\xBE\x00\x00", &source())
            .unwrap();
        let b = definer
            .define_class("a.B", b"\xCA\xFE\xBA\xBE\x00\x00", &source())
            .unwrap();
        assert_eq!(a.len, 6);
        assert_eq!(a.digest, b.digest);
        assert_ne!(a.id, b.id);
        assert_eq!(definer.defined(), 2);
    }

    #[test]
    fn rejects_non_class_bytes() {
        let err = BytecodeDefiner::new()
            .define_class("a.B", b"PK\x03\x04", &source())
            .unwrap_err();
        assert!(matches!(err, LoaderError::Define { .. }));
    }

    #[test]
    fn no_parent_finds_nothing() {
        assert!(NoParent.load_class("java.lang.Object").unwrap().is_none());
        assert!(NoParent.get_resources("x").unwrap().is_empty());
        assert!(NoParent.get_resource("x").unwrap().is_none());
    }
}
