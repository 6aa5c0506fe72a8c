use std::sync::Arc;

use vcl_types::{ContentDigest, EntryPath, FileType, FileUri, Metadata, RootLocator};

use crate::content::ContentStream;
use crate::error::StoreResult;
use crate::instance::StoreInstance;

/// Immutable reference to one entry of an opened store.
///
/// Metadata is captured at resolution; stores are static, so it never goes
/// stale. Content always goes back through the owning instance. Two handles
/// are equal when they name the same path of the same instance.
#[derive(Clone)]
pub struct FileHandle {
    instance: Arc<StoreInstance>,
    path: EntryPath,
    metadata: Metadata,
}

impl FileHandle {
    pub(crate) fn new(instance: Arc<StoreInstance>, path: EntryPath, metadata: Metadata) -> Self {
        Self {
            instance,
            path,
            metadata,
        }
    }

    pub fn instance(&self) -> &Arc<StoreInstance> {
        &self.instance
    }

    pub fn locator(&self) -> &RootLocator {
        self.instance.locator()
    }

    pub fn path(&self) -> &EntryPath {
        &self.path
    }

    pub fn uri(&self) -> FileUri {
        self.instance.locator().file_uri(&self.path)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn file_type(&self) -> FileType {
        self.metadata.file_type
    }

    pub fn is_file(&self) -> bool {
        self.metadata.is_file()
    }

    pub fn is_directory(&self) -> bool {
        self.metadata.is_directory()
    }

    pub fn size(&self) -> u64 {
        self.metadata.size
    }

    /// Whether the entry is still reachable. `false` once the owning store
    /// has been closed.
    pub fn exists(&self) -> bool {
        self.instance.exists(&self.path).unwrap_or(false)
    }

    /// Resolve a path relative to this handle.
    pub fn resolve(&self, relative: &str) -> StoreResult<FileHandle> {
        self.instance.resolve(&self.path.join(relative)?)
    }

    /// Handles for the immediate children of a directory.
    pub fn children(&self) -> StoreResult<Vec<FileHandle>> {
        self.instance
            .list(&self.path)?
            .iter()
            .map(|child| self.instance.resolve(child))
            .collect()
    }

    pub fn open_content(&self) -> StoreResult<ContentStream> {
        self.instance.open_content(self)
    }

    /// Read the whole content into memory.
    pub fn read_to_vec(&self) -> StoreResult<Vec<u8>> {
        self.open_content()?.read_to_vec()
    }

    /// BLAKE3 digest of the content.
    pub fn digest(&self) -> StoreResult<ContentDigest> {
        Ok(ContentDigest::of(&self.read_to_vec()?))
    }
}

impl PartialEq for FileHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance) && self.path == other.path
    }
}

impl Eq for FileHandle {}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("uri", &self.uri().to_string())
            .field("file_type", &self.metadata.file_type)
            .field("size", &self.metadata.size)
            .finish()
    }
}

impl std::fmt::Display for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri())
    }
}
