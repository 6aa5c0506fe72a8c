//! Class loading over VCL stores.
//!
//! A [`VfsClassLoader`] maps class names to `.class` entries, searches its
//! root directories in order after asking its parent, reads the bytecode
//! through the shared registry and hands it to a [`ClassDefiner`]. Any number
//! of loaders may target the same archive from any number of threads; the
//! registry underneath opens the archive once and keeps every read intact.

pub mod error;
pub mod host;
pub mod loader;

pub use error::{LoaderError, LoaderResult};
pub use host::{
    BytecodeDefiner, ClassDefiner, ClassRef, DefinedClass, DelegateLoader, NoParent, CLASS_MAGIC,
};
pub use loader::{LoadState, Resources, VfsClassLoader};
