//! Built-in store providers.

mod archive;
mod host;
mod memory;

pub use archive::ArchiveProvider;
pub use host::HostDirProvider;
pub use memory::MemoryProvider;
