use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use tracing::info;
use vcl_types::{EntryPath, Metadata, ReadPolicy, RootLocator};

use crate::error::{StoreError, StoreResult};
use crate::traits::{BackingStore, StoreProvider};

/// Serves a host directory tree (`file:///srv/classes`).
///
/// The tree is walked once when the store is opened and the resulting index
/// is what every lookup answers from. Content opens are independent `File`
/// handles, so reads never contend.
#[derive(Clone, Debug)]
pub struct HostDirProvider {
    scheme: String,
}

impl HostDirProvider {
    pub fn new() -> Self {
        Self {
            scheme: "file".into(),
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }
}

impl Default for HostDirProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreProvider for HostDirProvider {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn open(&self, locator: &RootLocator) -> StoreResult<Box<dyn BackingStore>> {
        let root = locator.to_path_buf();
        let fail = |reason: String| StoreError::OpenFailure {
            locator: locator.clone(),
            reason,
        };
        if !root.is_dir() {
            return Err(fail(format!("{} is not a directory", root.display())));
        }

        let mut entries = HashMap::new();
        let mut children: BTreeMap<EntryPath, Vec<EntryPath>> = BTreeMap::new();
        entries.insert(EntryPath::root(), Metadata::directory());
        for entry in walkdir::WalkDir::new(&root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| fail(e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map_err(|e| fail(e.to_string()))?;
            let path = EntryPath::parse(&relative.to_string_lossy())?;
            let metadata = if entry.file_type().is_dir() {
                Metadata::directory()
            } else if entry.file_type().is_file() {
                let len = entry.metadata().map_err(|e| fail(e.to_string()))?.len();
                Metadata::file(len)
            } else {
                continue;
            };
            if let Some(parent) = path.parent() {
                children.entry(parent).or_default().push(path.clone());
            }
            entries.insert(path, metadata);
        }

        info!("indexed host directory {} ({} entries)", locator, entries.len());
        Ok(Box::new(HostDirStore {
            locator: locator.clone(),
            root,
            entries,
            children,
        }))
    }
}

struct HostDirStore {
    locator: RootLocator,
    root: PathBuf,
    entries: HashMap<EntryPath, Metadata>,
    children: BTreeMap<EntryPath, Vec<EntryPath>>,
}

impl BackingStore for HostDirStore {
    fn metadata(&self, path: &EntryPath) -> StoreResult<Option<Metadata>> {
        Ok(self.entries.get(path).copied())
    }

    fn list(&self, dir: &EntryPath) -> StoreResult<Vec<EntryPath>> {
        Ok(self.children.get(dir).cloned().unwrap_or_default())
    }

    fn open(&self, path: &EntryPath) -> StoreResult<Box<dyn Read + Send>> {
        let uri = || self.locator.file_uri(path).to_string();
        match self.entries.get(path) {
            None => return Err(StoreError::NotFound(uri())),
            Some(m) if !m.is_file() => return Err(StoreError::NotAFile(uri())),
            Some(_) => {}
        }
        let file = File::open(self.root.join(path.as_str())).map_err(|e| {
            StoreError::ReadFailure {
                path: uri(),
                reason: e.to_string(),
            }
        })?;
        Ok(Box::new(file))
    }

    fn read_policy(&self) -> ReadPolicy {
        ReadPolicy::Concurrent
    }
}
