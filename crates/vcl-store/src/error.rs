use vcl_types::{RootLocator, TypeError};

/// Errors from backing-store operations.
///
/// `Clone` so that one failed open can be handed to every caller that was
/// waiting on it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No provider is registered for the locator's scheme.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// The provider could not open the root (bad archive, I/O, permissions).
    #[error("failed to open {locator}: {reason}")]
    OpenFailure { locator: RootLocator, reason: String },

    /// The path does not exist in an otherwise healthy store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Content was requested from a directory.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Reading content failed after the entry was resolved.
    #[error("failed to read {path}: {reason}")]
    ReadFailure { path: String, reason: String },

    /// The store (or the registry owning it) has been shut down.
    #[error("store closed: {0}")]
    StoreClosed(String),

    /// The locator or path could not be parsed.
    #[error("invalid locator: {0}")]
    InvalidLocator(#[from] TypeError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::StoreClosed(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
