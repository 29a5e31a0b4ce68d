use chrono::{DateTime, Utc};
use gridkv_types::BlobId;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Metadata record describing one stored blob.
///
/// Stored as a MessagePack map keyed by field name, so records written by
/// older or newer versions still decode: missing fields take their default
/// and unknown fields are ignored. The wire names (`chunkSize`, `chunks`,
/// `created`, ...) are part of the storage format.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Descriptor {
    /// Identifier of the blob, `None` while unbound or after destruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<BlobId>,
    pub name: String,
    /// Total number of bytes; authoritative after a write.
    pub length: u64,
    /// Chunking granularity used when the blob was written.
    pub chunk_size: u64,
    #[serde(rename = "chunks")]
    pub chunk_count: u64,
    #[serde(rename = "created", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// BLAKE3 hex digest of the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub mime_type: String,
}

impl Descriptor {
    /// An unbound descriptor for a blob about to be written.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            length,
            ..Self::default()
        }
    }

    /// A descriptor that only knows its identifier.
    pub fn with_id(id: BlobId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// The identifier, or `InvalidIdentifier` if the descriptor is unbound.
    pub fn require_id(&self) -> StoreResult<&BlobId> {
        self.id
            .as_ref()
            .ok_or_else(|| StoreError::InvalidIdentifier(String::new()))
    }

    pub fn is_bound(&self) -> bool {
        self.id.is_some()
    }

    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| StoreError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| StoreError::Codec(e.to_string()))
    }
}
