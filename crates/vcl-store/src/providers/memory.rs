use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use vcl_types::{EntryPath, Metadata, ReadPolicy, RootLocator};

use crate::error::{StoreError, StoreResult};
use crate::traits::{BackingStore, StoreProvider};

/// In-memory trees keyed by locator (`mem:///fixtures`).
///
/// Intended for tests and embedding. Trees are registered up front with
/// [`insert_tree`](Self::insert_tree); opening a locator with no tree fails.
/// Every successful or failed `open` is counted.
#[derive(Debug)]
pub struct MemoryProvider {
    scheme: String,
    trees: RwLock<HashMap<RootLocator, Arc<MemoryTree>>>,
    opens: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            scheme: "mem".into(),
            trees: RwLock::new(HashMap::new()),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Register the tree served for `locator`, replacing any previous one.
    /// Parent directories of every file are created implicitly.
    pub fn insert_tree<I, P, D>(&self, locator: RootLocator, files: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (P, D)>,
        P: AsRef<str>,
        D: Into<Vec<u8>>,
    {
        let mut tree = MemoryTree::default();
        for (path, data) in files {
            tree.insert(EntryPath::parse(path.as_ref())?, data.into());
        }
        self.trees
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(locator, Arc::new(tree));
        Ok(())
    }

    /// Number of times `open` has been called.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreProvider for MemoryProvider {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn open(&self, locator: &RootLocator) -> StoreResult<Box<dyn BackingStore>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let tree = self
            .trees
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(locator)
            .cloned()
            .ok_or_else(|| StoreError::OpenFailure {
                locator: locator.clone(),
                reason: "no in-memory tree registered".into(),
            })?;
        Ok(Box::new(MemoryStore {
            locator: locator.clone(),
            tree,
        }))
    }
}

#[derive(Debug)]
struct MemoryTree {
    entries: BTreeMap<EntryPath, Node>,
}

#[derive(Debug)]
enum Node {
    File(Arc<[u8]>),
    Directory,
}

impl Default for MemoryTree {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(EntryPath::root(), Node::Directory);
        Self { entries }
    }
}

impl MemoryTree {
    fn insert(&mut self, path: EntryPath, data: Vec<u8>) {
        let mut parent = path.parent();
        while let Some(dir) = parent {
            parent = dir.parent();
            self.entries.entry(dir).or_insert(Node::Directory);
        }
        self.entries.insert(path, Node::File(data.into()));
    }
}

struct MemoryStore {
    locator: RootLocator,
    tree: Arc<MemoryTree>,
}

impl BackingStore for MemoryStore {
    fn metadata(&self, path: &EntryPath) -> StoreResult<Option<Metadata>> {
        Ok(self.tree.entries.get(path).map(|node| match node {
            Node::File(data) => Metadata::file(data.len() as u64),
            Node::Directory => Metadata::directory(),
        }))
    }

    fn list(&self, dir: &EntryPath) -> StoreResult<Vec<EntryPath>> {
        Ok(self
            .tree
            .entries
            .keys()
            .filter(|p| p.parent().as_ref() == Some(dir))
            .cloned()
            .collect())
    }

    fn open(&self, path: &EntryPath) -> StoreResult<Box<dyn Read + Send>> {
        match self.tree.entries.get(path) {
            Some(Node::File(data)) => Ok(Box::new(Cursor::new(Arc::clone(data)))),
            Some(Node::Directory) => Err(StoreError::NotAFile(
                self.locator.file_uri(path).to_string(),
            )),
            None => Err(StoreError::NotFound(self.locator.file_uri(path).to_string())),
        }
    }

    fn read_policy(&self) -> ReadPolicy {
        ReadPolicy::Concurrent
    }
}
