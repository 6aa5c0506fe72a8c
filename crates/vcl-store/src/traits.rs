use std::io::Read;

use vcl_types::{EntryPath, Metadata, ReadPolicy, RootLocator};

use crate::error::StoreResult;

/// Opens backing stores of one scheme.
///
/// A provider serves every root of its scheme and keeps no per-root state.
/// `open` may run concurrently for different locators; the registry never
/// runs it twice at once for the same locator. It must return a fully
/// initialized store: whatever index the store needs is built before `open`
/// returns.
pub trait StoreProvider: Send + Sync {
    /// Scheme this provider registers under by default.
    fn scheme(&self) -> &str;

    /// Open the backing store named by `locator`.
    fn open(&self, locator: &RootLocator) -> StoreResult<Box<dyn BackingStore>>;
}

/// One opened backing store, as implemented by a provider.
///
/// Stores are read-only and static: metadata never changes after `open`.
/// Every method may be called from any thread.
pub trait BackingStore: Send + Sync {
    /// Metadata of `path`, or `Ok(None)` if it does not exist.
    /// The root must report as a directory.
    fn metadata(&self, path: &EntryPath) -> StoreResult<Option<Metadata>>;

    /// Immediate children of a directory, in path order.
    fn list(&self, dir: &EntryPath) -> StoreResult<Vec<EntryPath>>;

    /// Open an independent byte stream over a file's content.
    fn open(&self, path: &EntryPath) -> StoreResult<Box<dyn Read + Send>>;

    /// How concurrent reads of this store are served.
    fn read_policy(&self) -> ReadPolicy;

    /// Release resources. Called once, by the owning instance.
    fn close(&self) {}
}
