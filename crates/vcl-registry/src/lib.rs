//! Store registry for VCL.
//!
//! [`StoreRegistry`] owns every opened [`vcl_store::StoreInstance`] and
//! guarantees there is at most one per root locator, however many threads
//! ask for it at once. [`Resolver`] sits on top and turns URI strings into
//! handles.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vcl_registry::{Resolver, StoreRegistry};
//!
//! let registry = Arc::new(StoreRegistry::with_default_providers());
//! let _scope = registry.scope();
//! let resolver = Resolver::new(Arc::clone(&registry));
//! let class = resolver.resolve_file("jar:///opt/app/lib.vca!/org/app/Main.class")?;
//! let bytes = class.read_to_vec()?;
//! # Ok::<(), vcl_store::StoreError>(())
//! ```

pub mod config;
pub mod registry;
pub mod resolver;

pub use config::{ConfigError, RegistryConfig};
pub use registry::{RegistryScope, RegistryStats, StoreRegistry};
pub use resolver::Resolver;
