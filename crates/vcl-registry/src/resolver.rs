use std::sync::Arc;

use vcl_store::{FileHandle, StoreResult};
use vcl_types::{FileUri, RootLocator};

use crate::registry::StoreRegistry;

/// Turns URI strings into handles, opening roots on demand.
#[derive(Clone, Debug)]
pub struct Resolver {
    registry: Arc<StoreRegistry>,
}

impl Resolver {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    /// Resolve `<scheme>://<path>!/<entry>`. Without the `!` part the URI
    /// names the store root.
    pub fn resolve_file(&self, uri: &str) -> StoreResult<FileHandle> {
        let uri = FileUri::parse(uri)?;
        self.registry.get_or_create(&uri.root)?.resolve(&uri.entry)
    }

    /// Handle on the root directory of `<scheme>://<path>`.
    pub fn resolve_root(&self, locator: &str) -> StoreResult<FileHandle> {
        let locator = RootLocator::parse(locator)?;
        self.registry.get_or_create(&locator)?.root()
    }

    /// Like [`resolve_file`](Self::resolve_file), with a missing entry
    /// reported as `None`.
    pub fn find_file(&self, uri: &str) -> StoreResult<Option<FileHandle>> {
        match self.resolve_file(uri) {
            Ok(handle) => Ok(Some(handle)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use vcl_archive::ArchiveWriter;
    use vcl_store::StoreError;

    use super::*;
    use crate::config::RegistryConfig;

    fn resolver_with_archive(dir: &std::path::Path, config: &RegistryConfig) -> (Resolver, String) {
        let mut writer = ArchiveWriter::new();
        writer.add_file("pkg/Thing.class", b"\xCA\xFE\xBA\xBEthing").unwrap();
        writer.add_file("pkg/thing.txt", b"hello").unwrap();
        let path = dir.join("lib.vca");
        writer.write_to(&path).unwrap();
        let root = format!("jar://{}", path.to_string_lossy());
        (
            Resolver::new(Arc::new(StoreRegistry::with_config(config))),
            root,
        )
    }

    #[test]
    fn resolves_entries_and_roots() {
        let dir = tempfile::tempdir().unwrap();
        let (resolver, root) = resolver_with_archive(dir.path(), &RegistryConfig::default());

        let handle = resolver
            .resolve_file(&format!("{root}!/pkg/thing.txt"))
            .unwrap();
        assert_eq!(handle.read_to_vec().unwrap(), b"hello");

        let root_handle = resolver.resolve_root(&root).unwrap();
        assert!(root_handle.is_directory());
        assert!(Arc::ptr_eq(handle.instance(), root_handle.instance()));

        let again = resolver
            .resolve_file(&format!("{root}!/pkg/./sub/../thing.txt"))
            .unwrap();
        assert_eq!(again, handle);
        assert_eq!(resolver.registry().stats().opens_started, 1);
    }

    #[test]
    fn find_file_maps_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = RegistryConfig {
            read_policy: vcl_archive::OpenMode::Mapped,
            ..RegistryConfig::default()
        };
        let (resolver, root) = resolver_with_archive(dir.path(), &config);

        assert!(resolver
            .find_file(&format!("{root}!/pkg/Nope.class"))
            .unwrap()
            .is_none());
        assert!(resolver
            .find_file(&format!("{root}!/pkg/Thing.class"))
            .unwrap()
            .is_some());
        assert!(matches!(
            resolver.find_file("zip:///x.zip!/a"),
            Err(StoreError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            resolver.resolve_file("no-separator"),
            Err(StoreError::InvalidLocator(_))
        ));
    }
}
