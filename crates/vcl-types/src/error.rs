use thiserror::Error;

/// Errors produced by type operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid locator {input:?}: {reason}")]
    InvalidLocator { input: String, reason: String },

    #[error("invalid scheme: {0:?}")]
    InvalidScheme(String),

    #[error("path escapes the store root: {0}")]
    PathEscapesRoot(String),

    #[error("invalid path {input:?}: {reason}")]
    InvalidPath { input: String, reason: String },

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
