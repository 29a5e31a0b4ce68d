//! Foundation types for gridkv.
//!
//! Every blob stored by gridkv is named by a [`BlobId`]: a 32-character
//! lowercase hexadecimal string. The same bytes double as the key prefix of
//! the blob's chunks, so the format is a storage contract and is validated
//! everywhere an identifier crosses an API boundary.

pub mod error;
pub mod id;

pub use error::IdError;
pub use id::{BlobId, BLOB_ID_LEN};
