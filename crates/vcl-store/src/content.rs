use std::io::{self, Read};
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::instance::StoreInstance;

/// Upper bound on buffer space reserved from a recorded size.
const PREALLOC_LIMIT: u64 = 1024 * 1024;

/// Read-only byte stream over one entry's content.
///
/// Each stream is independent of every other stream over the same entry.
/// Every `read` first checks that the owning instance is still open, so a
/// stream outliving a registry shutdown fails with `StoreClosed` instead of
/// touching released resources.
pub struct ContentStream {
    instance: Arc<StoreInstance>,
    uri: String,
    size: u64,
    inner: Box<dyn Read + Send>,
}

impl ContentStream {
    pub(crate) fn new(
        instance: Arc<StoreInstance>,
        uri: String,
        size: u64,
        inner: Box<dyn Read + Send>,
    ) -> Self {
        Self {
            instance,
            uri,
            size,
            inner,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Uncompressed size as recorded by the store.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the rest of the stream into memory.
    pub fn read_to_vec(mut self) -> StoreResult<Vec<u8>> {
        let mut data = Vec::with_capacity(self.size.min(PREALLOC_LIMIT) as usize);
        self.read_to_end(&mut data)
            .map_err(|e| classify_read_error(&self.uri, e))?;
        Ok(data)
    }
}

impl Read for ContentStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.instance.is_closed() {
            return Err(io::Error::other(StoreError::StoreClosed(
                self.instance.locator().to_string(),
            )));
        }
        self.inner.read(buf)
    }
}

impl std::fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStream")
            .field("uri", &self.uri)
            .field("size", &self.size)
            .finish()
    }
}

/// Turn an I/O error from a content stream back into a typed store error.
pub fn classify_read_error(uri: &str, error: io::Error) -> StoreError {
    if let Some(store_error) = error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<StoreError>())
    {
        return store_error.clone();
    }
    StoreError::ReadFailure {
        path: uri.to_string(),
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use vcl_types::RootLocator;

    use super::*;
    use crate::providers::MemoryProvider;
    use crate::traits::StoreProvider;

    #[test]
    fn recorded_size_does_not_drive_reservation() {
        let locator = RootLocator::parse("mem:///sizes").unwrap();
        let provider = MemoryProvider::new();
        provider
            .insert_tree(locator.clone(), [("a.txt", b"abc".to_vec())])
            .unwrap();
        let instance = Arc::new(StoreInstance::new(
            locator.clone(),
            provider.open(&locator).unwrap(),
        ));
        let stream = ContentStream::new(
            instance,
            "mem:///sizes!/a.txt".into(),
            u64::MAX,
            Box::new(io::Cursor::new(b"abc".to_vec())),
        );
        let data = stream.read_to_vec().unwrap();
        assert_eq!(data, b"abc");
        assert!(data.capacity() as u64 <= PREALLOC_LIMIT);
    }
}
