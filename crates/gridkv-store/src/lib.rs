//! Chunked blob storage on top of an ordered transactional key-value store.
//!
//! The store's values are size-limited, so every blob is cut into
//! fixed-size chunks keyed by its [`BlobId`] plus a sortable sequence
//! number, and described by a [`Descriptor`] kept in a separate key space.
//! This is the grid-filesystem idea applied to a transactional engine
//! instead of a filesystem.
//!
//! # Components
//!
//! - [`keyspace`] -- disjoint chunk and metadata subspaces, chunk key format
//! - [`descriptor`] -- the blob descriptor and its MessagePack codec
//! - [`engine`] -- [`ChunkEngine`]: make, stream, destroy, and descriptor access
//!
//! # Guarantees
//!
//! 1. A blob's chunks and descriptor become visible together or not at all.
//! 2. Reads observe a single consistent snapshot of a blob's chunks.
//! 3. Chunks are immutable; blobs are write-once.
//! 4. Identifiers are validated before any store access.
//!
//! [`BlobId`]: gridkv_types::BlobId

pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod keyspace;

pub use config::{EngineConfig, DEFAULT_CHUNK_SIZE, MAX_VALUE_SIZE};
pub use descriptor::Descriptor;
pub use engine::ChunkEngine;
pub use error::{StoreError, StoreResult};
pub use keyspace::{KeySpace, Subspace, CHUNK_SEQUENCE_WIDTH, MAX_CHUNK_COUNT};
