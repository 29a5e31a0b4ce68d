//! Key-space layout.
//!
//! Two disjoint subspaces are carved out of the store's key space: one for
//! chunk records, one for descriptors. Subspace prefixes are allocated by a
//! small directory layer that records, under the reserved `0xFE` prefix, the
//! short prefix assigned to each named node. Allocation is idempotent, so
//! every process opening the same root sees the same prefixes.
//!
//! ```text
//! chunk key:  <chunk prefix> <32-char id> ':' <10-digit zero-padded sequence>
//! meta key:   <meta prefix>  <32-char id>
//! node key:   0xFE <root> '/' <node name>            -> allocated prefix
//! counter:    0xFE 0x00 "prefix-counter"             -> last prefix (u32 BE)
//! ```

use gridkv_kv::{KeyRange, KvStore, KvTransaction};
use gridkv_types::BlobId;
use tracing::info;

use crate::error::{StoreError, StoreResult};

/// Width of the decimal sequence suffix of chunk keys.
pub const CHUNK_SEQUENCE_WIDTH: usize = 10;

/// Largest number of chunks a single blob may have.
///
/// This is a format contract: the sequence suffix does not widen, so keys
/// only sort in sequence order up to this count.
pub const MAX_CHUNK_COUNT: u64 = 9_999_999_999;

const DIRECTORY_PREFIX: u8 = 0xFE;
const PREFIX_COUNTER_KEY: &[u8] = b"\xFE\x00prefix-counter";
const SEQUENCE_SEPARATOR: u8 = b':';

/// Allocated prefixes are big-endian counters; stop before they could
/// reach the reserved directory byte.
const MAX_PREFIX_COUNTER: u32 = (DIRECTORY_PREFIX as u32) << 24;

/// A namespaced region of the key space identified by a raw prefix.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Get the raw prefix bytes.
    pub fn raw_prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// The prefix followed by `suffix`.
    pub fn pack(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.prefix.len() + suffix.len());
        key.extend_from_slice(&self.prefix);
        key.extend_from_slice(suffix);
        key
    }

    /// The key with this subspace's prefix removed, if it belongs here.
    pub fn unpack<'k>(&self, key: &'k [u8]) -> Option<&'k [u8]> {
        key.strip_prefix(self.prefix.as_slice())
    }

    /// Range of every key in this subspace.
    pub fn range(&self) -> StoreResult<KeyRange> {
        Ok(KeyRange::prefix(&self.prefix)?)
    }

    /// Range of every key in this subspace that starts with `suffix`.
    pub fn range_of(&self, suffix: &[u8]) -> StoreResult<KeyRange> {
        Ok(KeyRange::prefix(&self.pack(suffix))?)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    fn overlaps(&self, other: &Subspace) -> bool {
        self.prefix.starts_with(&other.prefix) || other.prefix.starts_with(&self.prefix)
    }
}

/// The chunk and metadata subspaces used by one chunk engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySpace {
    chunks: Subspace,
    meta: Subspace,
}

impl KeySpace {
    /// Open the subspaces registered under `root`, allocating them on first use.
    pub fn create_or_open<S: KvStore>(store: &S, root: &str) -> StoreResult<Self> {
        if root.is_empty() {
            return Err(StoreError::KeySpace("key space root must not be empty".into()));
        }
        let (chunks, meta) = store.transact(|tx| {
            let chunks = open_node(tx, root, "chunks")?;
            let meta = open_node(tx, root, "meta")?;
            Ok::<_, StoreError>((chunks, meta))
        })?;

        info!(
            root,
            chunks = ?chunks.as_slice(),
            meta = ?meta.as_slice(),
            "key space opened"
        );
        Self::with_prefixes(chunks, meta)
    }

    /// Build a key space from explicit prefixes.
    ///
    /// Prefixes must be non-empty, must not overlap, and must stay out of
    /// the reserved directory range.
    pub fn with_prefixes(
        chunks: impl Into<Vec<u8>>,
        meta: impl Into<Vec<u8>>,
    ) -> StoreResult<Self> {
        let chunks = Subspace::new(chunks);
        let meta = Subspace::new(meta);
        for subspace in [&chunks, &meta] {
            match subspace.raw_prefix().first() {
                None => {
                    return Err(StoreError::KeySpace(
                        "subspace prefix must not be empty".into(),
                    ))
                }
                Some(&DIRECTORY_PREFIX) => {
                    return Err(StoreError::KeySpace(format!(
                        "prefix {:02x?} is inside the reserved directory range",
                        subspace.raw_prefix()
                    )))
                }
                Some(_) => {}
            }
        }
        if chunks.overlaps(&meta) {
            return Err(StoreError::KeySpace(format!(
                "chunk prefix {:02x?} overlaps meta prefix {:02x?}",
                chunks.raw_prefix(),
                meta.raw_prefix()
            )));
        }
        Ok(Self { chunks, meta })
    }

    pub fn chunks(&self) -> &Subspace {
        &self.chunks
    }

    pub fn meta(&self) -> &Subspace {
        &self.meta
    }

    /// Key of chunk `sequence` of blob `id`.
    ///
    /// For a fixed id, raw-byte key order equals ascending sequence order
    /// for every sequence up to [`MAX_CHUNK_COUNT`].
    pub fn chunk_key(&self, id: &BlobId, sequence: u64) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(id.as_bytes().len() + 1 + CHUNK_SEQUENCE_WIDTH);
        suffix.extend_from_slice(id.as_bytes());
        suffix.push(SEQUENCE_SEPARATOR);
        let digits = format!("{sequence:0width$}", width = CHUNK_SEQUENCE_WIDTH);
        suffix.extend_from_slice(digits.as_bytes());
        self.chunks.pack(&suffix)
    }

    /// Range covering every chunk of blob `id`.
    pub fn chunk_range(&self, id: &BlobId) -> StoreResult<KeyRange> {
        let mut suffix = id.as_bytes().to_vec();
        suffix.push(SEQUENCE_SEPARATOR);
        self.chunks.range_of(&suffix)
    }

    /// Key of the descriptor of blob `id`.
    pub fn meta_key(&self, id: &BlobId) -> Vec<u8> {
        self.meta.pack(id.as_bytes())
    }
}

fn node_key(root: &str, name: &str) -> Vec<u8> {
    let mut key = vec![DIRECTORY_PREFIX];
    key.extend_from_slice(root.as_bytes());
    key.push(b'/');
    key.extend_from_slice(name.as_bytes());
    key
}

/// Look up the prefix of a directory node, allocating a fresh one if absent.
fn open_node(tx: &mut dyn KvTransaction, root: &str, name: &str) -> StoreResult<Vec<u8>> {
    let key = node_key(root, name);
    if let Some(prefix) = tx.get(&key)? {
        return Ok(prefix);
    }

    let last = match tx.get(PREFIX_COUNTER_KEY)? {
        Some(raw) => {
            let bytes: [u8; 4] = raw
                .as_slice()
                .try_into()
                .map_err(|_| StoreError::KeySpace(format!("corrupt prefix counter: {raw:02x?}")))?;
            u32::from_be_bytes(bytes)
        }
        None => 0,
    };
    let next = last
        .checked_add(1)
        .filter(|&next| next < MAX_PREFIX_COUNTER)
        .ok_or_else(|| StoreError::KeySpace("prefix space exhausted".into()))?;

    let prefix = next.to_be_bytes();
    tx.set(PREFIX_COUNTER_KEY, &prefix)?;
    tx.set(&key, &prefix)?;
    Ok(prefix.to_vec())
}
