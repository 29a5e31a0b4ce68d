/// Errors from the underlying key-value store.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// A concurrent transaction committed a write this transaction read.
    #[error("transaction conflict")]
    Conflict,

    /// The transaction body kept conflicting and was abandoned.
    #[error("transaction abandoned after {attempts} conflicting attempts")]
    RetryLimitExceeded { attempts: u32 },

    /// A prefix that has no strict upper bound (empty or all `0xFF`).
    #[error("prefix has no upper bound: {0:02x?}")]
    InvalidPrefix(Vec<u8>),

    /// Failure reported by the storage engine.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for key-value operations.
pub type KvResult<T> = Result<T, KvError>;
