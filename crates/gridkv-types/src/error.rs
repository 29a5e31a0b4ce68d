use thiserror::Error;

/// Errors produced while parsing identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid blob id: {0:?}")]
    InvalidIdentifier(String),
}
