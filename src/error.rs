//! Error types for the value store.

use crate::rows::Path;
use thiserror::Error;

/// Invalid access to a location in the value tree.
///
/// Each variant carries a fixed message; none of them is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("Attempt to browse children of a non-existing value.")]
    BrowseNonExisting,

    #[error("Attempt to browse children of a non-complex value.")]
    BrowseNonComplex,

    #[error("Attempt to write a child of a non-existing value.")]
    WriteNonExisting,

    #[error("Attempt to write a child of a non-complex value.")]
    WriteNonComplex,
}

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    InvalidAccess(#[from] AccessError),

    #[error("Row already exists: parent={parent}, key={key}")]
    DuplicateRow { parent: Path, key: String },

    #[error("Index {index} out of bounds (part count {count})")]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Line does not match pattern for row: {0}")]
    MalformedRow(String),

    #[error("Malformed path: {0}")]
    MalformedPath(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("No provider for store URL: {0}")]
    UnknownUrl(String),

    #[error("Not a row-table store")]
    NotRowTable,
}

impl StoreError {
    /// Whether this is one of the fixed invalid-access errors.
    pub fn access(&self) -> Option<AccessError> {
        match self {
            StoreError::InvalidAccess(e) => Some(*e),
            _ => None,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
