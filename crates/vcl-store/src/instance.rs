use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;
use vcl_types::{EntryPath, Metadata, ReadPolicy, RootLocator};

use crate::content::ContentStream;
use crate::error::{StoreError, StoreResult};
use crate::handle::FileHandle;
use crate::traits::BackingStore;

/// The live, opened representation of one root.
///
/// Exactly one instance exists per root locator in a registry. The registry
/// owns it; handles, streams and loaders hold `Arc` references. Everything
/// except [`close`](Self::close) is a read-only lookup and safe to call from
/// any number of threads.
pub struct StoreInstance {
    locator: RootLocator,
    store: Box<dyn BackingStore>,
    closed: AtomicBool,
}

impl StoreInstance {
    pub fn new(locator: RootLocator, store: Box<dyn BackingStore>) -> Self {
        Self {
            locator,
            store,
            closed: AtomicBool::new(false),
        }
    }

    pub fn locator(&self) -> &RootLocator {
        &self.locator
    }

    pub fn scheme(&self) -> &str {
        self.locator.scheme()
    }

    pub fn read_policy(&self) -> ReadPolicy {
        self.store.read_policy()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::StoreClosed(self.locator.to_string()));
        }
        Ok(())
    }

    /// Resolve `path` to a handle. Fails with `NotFound` if it does not exist.
    pub fn resolve(self: &Arc<Self>, path: &EntryPath) -> StoreResult<FileHandle> {
        let metadata = self.metadata(path)?;
        Ok(FileHandle::new(Arc::clone(self), path.clone(), metadata))
    }

    /// Parse and resolve a path string.
    pub fn resolve_str(self: &Arc<Self>, path: &str) -> StoreResult<FileHandle> {
        self.resolve(&EntryPath::parse(path)?)
    }

    /// Handle on the store root.
    pub fn root(self: &Arc<Self>) -> StoreResult<FileHandle> {
        self.resolve(&EntryPath::root())
    }

    pub fn exists(&self, path: &EntryPath) -> StoreResult<bool> {
        self.ensure_open()?;
        Ok(self.store.metadata(path)?.is_some())
    }

    pub fn metadata(&self, path: &EntryPath) -> StoreResult<Metadata> {
        self.ensure_open()?;
        self.store
            .metadata(path)?
            .ok_or_else(|| StoreError::NotFound(self.locator.file_uri(path).to_string()))
    }

    /// Immediate children of a directory.
    pub fn list(&self, dir: &EntryPath) -> StoreResult<Vec<EntryPath>> {
        let metadata = self.metadata(dir)?;
        if !metadata.is_directory() {
            return Err(StoreError::NotFound(format!(
                "{} is not a directory",
                self.locator.file_uri(dir)
            )));
        }
        self.store.list(dir)
    }

    /// Open a content stream for a handle resolved from this instance.
    pub fn open_content(self: &Arc<Self>, handle: &FileHandle) -> StoreResult<ContentStream> {
        self.ensure_open()?;
        let uri = self.locator.file_uri(handle.path()).to_string();
        if !Arc::ptr_eq(self, handle.instance()) {
            return Err(StoreError::NotFound(format!(
                "{uri} belongs to {}",
                handle.instance().locator()
            )));
        }
        if !handle.is_file() {
            return Err(StoreError::NotAFile(uri));
        }
        let inner = self.store.open(handle.path())?;
        debug!("opened content stream {}", uri);
        Ok(ContentStream::new(Arc::clone(self), uri, handle.size(), inner))
    }

    /// Close the instance. Returns `true` for the call that actually closed
    /// it; later calls are no-ops.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.store.close();
        debug!("closed store instance {}", self.locator);
        true
    }
}

impl std::fmt::Debug for StoreInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreInstance")
            .field("locator", &self.locator)
            .field("read_policy", &self.read_policy())
            .field("closed", &self.is_closed())
            .finish()
    }
}
