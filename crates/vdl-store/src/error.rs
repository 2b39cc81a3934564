use thiserror::Error;
use vdl_keys::KeyError;

/// Errors from store operations.
///
/// Only `NotFound`, `DocExists`, and `MalformedKey` are semantically
/// meaningful to callers; everything the engine reports is folded into
/// `Backend` and surfaced opaquely.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key or document is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// `create` was called for a document that already has a version.
    #[error("document already exists: {0}")]
    DocExists(String),

    /// A key failed to decode.
    #[error("malformed key: {0}")]
    MalformedKey(#[from] KeyError),

    /// Failure in the underlying storage engine.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// I/O error outside the engine proper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this is the `NotFound` classification.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
