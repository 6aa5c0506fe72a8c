use std::io::Read;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;
use vcl_archive::{ArchiveError, ArchiveReader, OpenMode};
use vcl_types::{EntryPath, Metadata, ReadPolicy, RootLocator};

use crate::error::{StoreError, StoreResult};
use crate::traits::{BackingStore, StoreProvider};

/// Opens `.vca` archives named by `<scheme>:///path/to/archive.vca`.
///
/// With [`OpenMode::Serialized`] every store keeps one shared file handle and
/// each read op takes its lock (policy `Serialized`). With
/// [`OpenMode::Mapped`] the archive is memory-mapped and streams read
/// independent slices (policy `Concurrent`).
#[derive(Clone, Debug)]
pub struct ArchiveProvider {
    scheme: String,
    mode: OpenMode,
    verify_checksums: bool,
}

impl ArchiveProvider {
    pub fn new() -> Self {
        Self {
            scheme: "jar".into(),
            mode: OpenMode::default(),
            verify_checksums: true,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Recompute the trailer checksum when a store is opened.
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}

impl Default for ArchiveProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreProvider for ArchiveProvider {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn open(&self, locator: &RootLocator) -> StoreResult<Box<dyn BackingStore>> {
        let fail = |e: ArchiveError| StoreError::OpenFailure {
            locator: locator.clone(),
            reason: e.to_string(),
        };
        let reader = ArchiveReader::open(&locator.to_path_buf(), self.mode).map_err(fail)?;
        if self.verify_checksums {
            reader.verify_checksum().map_err(fail)?;
        }
        info!(
            "opened archive {} ({} entries, {:?})",
            locator,
            reader.entry_count(),
            reader.read_policy()
        );
        Ok(Box::new(ArchiveStore {
            policy: reader.read_policy(),
            reader: RwLock::new(Some(Arc::new(reader))),
            locator: locator.clone(),
        }))
    }
}

/// An opened archive. Closing drops the reader; streams already open keep
/// the underlying source alive until they are dropped.
struct ArchiveStore {
    locator: RootLocator,
    policy: ReadPolicy,
    reader: RwLock<Option<Arc<ArchiveReader>>>,
}

impl ArchiveStore {
    fn reader(&self) -> StoreResult<Arc<ArchiveReader>> {
        self.reader
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| StoreError::StoreClosed(self.locator.to_string()))
    }

    fn uri(&self, path: &EntryPath) -> String {
        self.locator.file_uri(path).to_string()
    }
}

impl BackingStore for ArchiveStore {
    fn metadata(&self, path: &EntryPath) -> StoreResult<Option<Metadata>> {
        if path.is_root() {
            return Ok(Some(Metadata::directory()));
        }
        Ok(self.reader()?.entry(path).map(|e| e.metadata()))
    }

    fn list(&self, dir: &EntryPath) -> StoreResult<Vec<EntryPath>> {
        Ok(self
            .reader()?
            .children(dir)
            .map(|e| e.path.clone())
            .collect())
    }

    fn open(&self, path: &EntryPath) -> StoreResult<Box<dyn Read + Send>> {
        match self.reader()?.open_entry(path) {
            Ok(stream) => Ok(Box::new(stream)),
            Err(ArchiveError::EntryNotFound(_)) => Err(StoreError::NotFound(self.uri(path))),
            Err(ArchiveError::NotAFile(_)) => Err(StoreError::NotAFile(self.uri(path))),
            Err(e) => Err(StoreError::ReadFailure {
                path: self.uri(path),
                reason: e.to_string(),
            }),
        }
    }

    fn read_policy(&self) -> ReadPolicy {
        self.policy
    }

    fn close(&self) {
        self.reader
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
