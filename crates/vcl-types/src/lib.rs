//! Foundation types for VCL, the virtual-filesystem class loading core.
//!
//! Every other VCL crate depends on `vcl-types`. Nothing in here performs I/O
//! except [`RootLocator::parse`], which reads the working directory to make
//! relative backing paths absolute.
//!
//! # Key Types
//!
//! - [`RootLocator`] -- Normalized `scheme://path` key identifying one backing store
//! - [`FileUri`] -- A root locator plus an entry path (`jar:///lib.vca!/a/B.class`)
//! - [`EntryPath`] -- Normalized relative path inside a backing store
//! - [`Metadata`] / [`FileType`] -- What a resolved entry is and how large it is
//! - [`ContentDigest`] -- BLAKE3 digest of entry content

pub mod digest;
pub mod error;
pub mod locator;
pub mod metadata;
pub mod names;
pub mod path;

pub use digest::ContentDigest;
pub use error::TypeError;
pub use locator::{FileUri, RootLocator};
pub use metadata::{FileType, Metadata, ReadPolicy};
pub use names::{class_name_for, class_path_for, resource_path_for};
pub use path::EntryPath;
