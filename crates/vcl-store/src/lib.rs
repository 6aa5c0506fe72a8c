//! Backing-store contract for the VCL class loader.
//!
//! A [`StoreProvider`] opens one kind of root (archive, host directory,
//! in-memory tree) into a [`BackingStore`]. The registry wraps each opened
//! store in a [`StoreInstance`], the single live representation of its root.
//! Lookups through an instance produce [`FileHandle`]s, and file handles
//! open independent [`ContentStream`]s.
//!
//! # Providers
//!
//! - [`ArchiveProvider`] -- `.vca` archives, serialized or memory-mapped reads
//! - [`HostDirProvider`] -- host directory trees, indexed on open
//! - [`MemoryProvider`] -- in-memory trees for tests and embedding
//!
//! # Rules
//!
//! 1. Stores are read-only and static once opened.
//! 2. A missing path is `NotFound` and never poisons the instance.
//! 3. Once an instance is closed every operation on it, including reads on
//!    streams opened earlier, fails with `StoreClosed`.

pub mod content;
pub mod error;
pub mod handle;
pub mod instance;
pub mod providers;
pub mod traits;

pub use content::{classify_read_error, ContentStream};
pub use error::{StoreError, StoreResult};
pub use handle::FileHandle;
pub use instance::StoreInstance;
pub use providers::{ArchiveProvider, HostDirProvider, MemoryProvider};
pub use traits::{BackingStore, StoreProvider};
