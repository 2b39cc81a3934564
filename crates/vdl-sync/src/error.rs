use thiserror::Error;
use vdl_keys::KeyError;
use vdl_store::StoreError;

/// Errors from export, merge, or wire codec operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Failure fetching or streaming from the remote peer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote stream violated the JSON-array wire format.
    #[error("codec error: {0}")]
    Codec(String),

    /// A remote record carried a key that does not decode.
    #[error("malformed key in stream: {0}")]
    Key(#[from] KeyError),

    /// Local store failure while exporting or applying records.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result alias for replication operations.
pub type SyncResult<T> = Result<T, SyncError>;
