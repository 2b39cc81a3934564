use thiserror::Error;

/// Errors from encoding or decoding version keys.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The string does not match the `token-parent-doc` key structure.
    #[error("malformed version key: {0}")]
    Malformed(String),

    /// The document id is empty or otherwise unusable in a key.
    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),
}

/// Result alias for key codec operations.
pub type KeyResult<T> = Result<T, KeyError>;
