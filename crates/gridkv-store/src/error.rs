use std::io;

use gridkv_kv::KvError;
use gridkv_types::{BlobId, IdError};

/// Errors from chunk engine operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required argument (the declared length) was not supplied.
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    /// The source produced a different number of bytes than declared.
    #[error("bytes read {actual} doesn't match expected {expected}")]
    LengthMismatch { expected: u64, actual: u64 },

    /// The identifier is empty or not in canonical form.
    #[error("invalid blob id: {0:?}")]
    InvalidIdentifier(String),

    /// No descriptor is stored under the identifier.
    #[error("blob not found: {0}")]
    NotFound(BlobId),

    /// Writing to the output sink failed. Bytes already forwarded stay forwarded.
    #[error("sink write failed after {written} bytes: {source}")]
    SinkWrite {
        written: u64,
        #[source]
        source: io::Error,
    },

    /// Reading from the input source failed.
    #[error("source read failed: {0}")]
    Source(#[source] io::Error),

    /// The blob would need more chunks than the key format can number.
    #[error("blob needs {needed} chunks, more than the limit of {limit}")]
    TooManyChunks { needed: u64, limit: u64 },

    /// A stored descriptor could not be encoded or decoded.
    #[error("descriptor codec error: {0}")]
    Codec(String),

    /// Key-space allocation or layout failure.
    #[error("key space error: {0}")]
    KeySpace(String),

    /// The engine configuration is unusable.
    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// Failure in the underlying key-value store.
    #[error("kv error: {0}")]
    Kv(#[from] KvError),
}

impl From<IdError> for StoreError {
    fn from(e: IdError) -> Self {
        match e {
            IdError::InvalidIdentifier(raw) => StoreError::InvalidIdentifier(raw),
        }
    }
}

/// Result alias for chunk engine operations.
pub type StoreResult<T> = Result<T, StoreError>;
