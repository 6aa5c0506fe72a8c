use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};
use vcl_registry::Resolver;
use vcl_store::{ContentStream, FileHandle, StoreError};
use vcl_types::{class_path_for, resource_path_for, EntryPath};

use crate::error::{LoaderError, LoaderResult};
use crate::host::{BytecodeDefiner, ClassDefiner, ClassRef, DelegateLoader, NoParent};

/// Where a class request is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Requested,
    Resolved,
    ReadBytes,
    Defined,
    NotFound,
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Requested => "requested",
            Self::Resolved => "resolved",
            Self::ReadBytes => "read-bytes",
            Self::Defined => "defined",
            Self::NotFound => "not-found",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Loads classes and resources from an ordered list of store directories.
///
/// The parent is asked first; only when it has nothing does the loader search
/// its own roots, and the first root holding the entry wins. Everything a
/// loader defines is remembered, so asking twice returns the same class.
/// Loaders share nothing with each other except the registry behind their
/// resolver.
pub struct VfsClassLoader {
    resolver: Resolver,
    roots: Vec<FileHandle>,
    parent: Arc<dyn DelegateLoader>,
    definer: Arc<dyn ClassDefiner>,
    defined: Mutex<HashMap<String, ClassRef>>,
}

impl VfsClassLoader {
    /// A loader searching `roots` (directory URIs, e.g. `jar:///lib.vca` or
    /// `file:///srv/classes`) with no parent.
    pub fn new<S: AsRef<str>>(resolver: Resolver, roots: &[S]) -> LoaderResult<Self> {
        let roots = roots
            .iter()
            .map(|uri| {
                let handle = resolver.resolve_file(uri.as_ref())?;
                if !handle.is_directory() {
                    return Err(LoaderError::InvalidRoot(handle.uri().to_string()));
                }
                Ok(handle)
            })
            .collect::<LoaderResult<Vec<_>>>()?;
        Ok(Self::from_handles(resolver, roots))
    }

    /// A loader over already resolved root directories.
    pub fn from_handles(resolver: Resolver, roots: Vec<FileHandle>) -> Self {
        Self {
            resolver,
            roots,
            parent: Arc::new(NoParent),
            definer: Arc::new(BytecodeDefiner::new()),
            defined: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_parent(mut self, parent: Arc<dyn DelegateLoader>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_definer(mut self, definer: Arc<dyn ClassDefiner>) -> Self {
        self.definer = definer;
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn roots(&self) -> &[FileHandle] {
        &self.roots
    }

    /// A class this loader has already defined.
    pub fn loaded_class(&self, name: &str) -> Option<ClassRef> {
        self.lock_defined().get(name).cloned()
    }

    /// Number of classes this loader has defined.
    pub fn defined_count(&self) -> usize {
        self.lock_defined().len()
    }

    fn lock_defined(&self) -> std::sync::MutexGuard<'_, HashMap<String, ClassRef>> {
        self.defined.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load `name` (`a.b.C`): already defined here, else the parent, else
    /// this loader's own roots.
    pub fn load_class(&self, name: &str) -> LoaderResult<Option<ClassRef>> {
        trace_state(name, LoadState::Requested);
        if let Some(class) = self.loaded_class(name) {
            return Ok(Some(class));
        }
        if let Some(class) = self.parent.load_class(name)? {
            debug!("{} loaded by parent", name);
            return Ok(Some(class));
        }
        self.find_class(name)
    }

    /// Search only this loader's roots for `name` and define it.
    pub fn find_class(&self, name: &str) -> LoaderResult<Option<ClassRef>> {
        let outcome = self.define_from_roots(name);
        match &outcome {
            Ok(Some(_)) => trace_state(name, LoadState::Defined),
            Ok(None) => trace_state(name, LoadState::NotFound),
            Err(err) => {
                warn!("loading {} failed: {}", name, err);
                trace_state(name, LoadState::Failed);
            }
        }
        outcome
    }

    fn define_from_roots(&self, name: &str) -> LoaderResult<Option<ClassRef>> {
        let path = class_path_for(name).map_err(|e| LoaderError::invalid_name(name, e))?;
        let Some(handle) = self.locate(&path)? else {
            return Ok(None);
        };
        trace_state(name, LoadState::Resolved);

        let bytes = handle.read_to_vec()?;
        trace_state(name, LoadState::ReadBytes);

        let class = self.definer.define_class(name, &bytes, &handle.uri())?;
        let mut defined = self.lock_defined();
        Ok(Some(Arc::clone(
            defined.entry(name.to_string()).or_insert(class),
        )))
    }

    /// First root holding a file at `path`.
    fn locate(&self, path: &EntryPath) -> LoaderResult<Option<FileHandle>> {
        for root in &self.roots {
            match root.resolve(path.as_str()) {
                Ok(handle) if handle.is_file() => return Ok(Some(handle)),
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    /// Resource `name` from this loader's own roots.
    pub fn find_resource(&self, name: &str) -> LoaderResult<Option<FileHandle>> {
        let path = resource_path_for(name).map_err(|e| LoaderError::invalid_name(name, e))?;
        self.locate(&path)
    }

    /// Open resource `name`, asking the parent first.
    pub fn get_resource(&self, name: &str) -> LoaderResult<Option<ContentStream>> {
        let handle = match self.parent.get_resource(name)? {
            Some(handle) => Some(handle),
            None => self.find_resource(name)?,
        };
        handle.map(|h| h.open_content()).transpose().map_err(Into::into)
    }

    /// Every match for `name`: the parent's first, then one per root in
    /// order. The roots are searched lazily as the iterator advances; call
    /// again to start over.
    pub fn get_resources(&self, name: &str) -> LoaderResult<Resources> {
        let path = resource_path_for(name).map_err(|e| LoaderError::invalid_name(name, e))?;
        Ok(Resources {
            inherited: self.parent.get_resources(name)?.into_iter(),
            roots: self.roots.clone().into_iter(),
            path,
        })
    }
}

impl DelegateLoader for VfsClassLoader {
    fn load_class(&self, name: &str) -> LoaderResult<Option<ClassRef>> {
        VfsClassLoader::load_class(self, name)
    }

    fn get_resources(&self, name: &str) -> LoaderResult<Vec<FileHandle>> {
        VfsClassLoader::get_resources(self, name)?.collect()
    }

    fn get_resource(&self, name: &str) -> LoaderResult<Option<FileHandle>> {
        if let Some(handle) = self.parent.get_resource(name)? {
            return Ok(Some(handle));
        }
        self.find_resource(name)
    }
}

impl fmt::Debug for VfsClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roots: Vec<String> = self.roots.iter().map(|r| r.to_string()).collect();
        f.debug_struct("VfsClassLoader")
            .field("roots", &roots)
            .field("defined", &self.defined_count())
            .finish()
    }
}

fn trace_state(name: &str, state: LoadState) {
    debug!(class = name, %state, "class load transition");
}

/// Lazy sequence of resource matches, see [`VfsClassLoader::get_resources`].
pub struct Resources {
    inherited: std::vec::IntoIter<FileHandle>,
    roots: std::vec::IntoIter<FileHandle>,
    path: EntryPath,
}

impl Iterator for Resources {
    type Item = LoaderResult<FileHandle>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(handle) = self.inherited.next() {
            return Some(Ok(handle));
        }
        for root in self.roots.by_ref() {
            match root.resolve(self.path.as_str()) {
                Ok(handle) if handle.is_file() => return Some(Ok(handle)),
                Ok(_) => {}
                Err(StoreError::NotFound(_)) => {}
                Err(err) => return Some(Err(err.into())),
            }
        }
        None
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resources")
            .field("path", &self.path)
            .field("inherited", &self.inherited.len())
            .field("roots", &self.roots.len())
            .finish()
    }
}
