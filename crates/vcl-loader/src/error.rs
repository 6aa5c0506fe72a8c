use vcl_store::StoreError;

/// Errors that abort one load attempt.
///
/// A class or resource that simply is not there is `Ok(None)`, never an
/// error, so delegation can move on to the next loader.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoaderError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A configured root does not resolve to a directory.
    #[error("root is not a directory: {0}")]
    InvalidRoot(String),

    #[error("failed to define {name}: {reason}")]
    Define { name: String, reason: String },
}

impl LoaderError {
    pub fn invalid_name(name: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;
