use std::io::{self, Read, Write};
use std::sync::Arc;

use chrono::Utc;
use gridkv_kv::{KvStore, KvTransaction};
use gridkv_types::BlobId;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::descriptor::Descriptor;
use crate::error::{StoreError, StoreResult};
use crate::keyspace::{KeySpace, MAX_CHUNK_COUNT};

/// Stores blobs as ordered chunk records plus a descriptor.
///
/// Every durable operation runs in exactly one store transaction. Because
/// the store re-runs transaction bodies on conflict, bodies here only touch
/// the transaction: the input source is drained before the write
/// transaction starts, and output is forwarded to the sink only after the
/// read transaction has finished.
pub struct ChunkEngine<S> {
    store: Arc<S>,
    keyspace: KeySpace,
    config: EngineConfig,
}

/// A source split into chunks, ready to be committed.
struct ChunkedPayload {
    chunks: Vec<Vec<u8>>,
    length: u64,
    content_hash: String,
}

impl<S: KvStore> ChunkEngine<S> {
    pub fn new(store: Arc<S>, keyspace: KeySpace, config: EngineConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            keyspace,
            config,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn keyspace(&self) -> &KeySpace {
        &self.keyspace
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- Write ----

    /// Write a new blob of `descriptor.length` bytes read from `source`.
    ///
    /// Reads at most the declared length, so a framed source is left
    /// positioned right after the blob. On success the descriptor is bound
    /// to a fresh identifier and filled in; on any error nothing is stored
    /// and the descriptor is left untouched.
    pub fn make<R: Read>(&self, descriptor: &mut Descriptor, source: R) -> StoreResult<()> {
        if descriptor.length == 0 {
            return Err(StoreError::MissingArgument("length"));
        }
        let payload = self.read_chunks(source, descriptor.length)?;

        let id = BlobId::generate();
        let mut staged = descriptor.clone();
        staged.id = Some(id.clone());
        staged.length = payload.length;
        staged.chunk_size = self.config.chunk_size as u64;
        staged.chunk_count = payload.chunks.len() as u64;
        staged.created_at = Some(Utc::now());
        staged.content_hash = Some(payload.content_hash);

        self.store.transact(|tx| {
            for (sequence, chunk) in payload.chunks.iter().enumerate() {
                tx.set(&self.keyspace.chunk_key(&id, sequence as u64), chunk)?;
            }
            self.write_meta(tx, &id, &staged)
        })?;

        info!(
            id = %id,
            bytes = staged.length,
            chunks = staged.chunk_count,
            "blob stored"
        );
        *descriptor = staged;
        Ok(())
    }

    /// Write a new blob and return its descriptor.
    pub fn create<R: Read>(
        &self,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        length: u64,
        source: R,
    ) -> StoreResult<Descriptor> {
        let mut descriptor = Descriptor::new(name, mime_type, length);
        self.make(&mut descriptor, source)?;
        Ok(descriptor)
    }

    fn read_chunks<R: Read>(&self, mut source: R, declared: u64) -> StoreResult<ChunkedPayload> {
        let chunk_size = self.config.chunk_size;
        let needed = declared.div_ceil(chunk_size as u64);
        if needed > MAX_CHUNK_COUNT {
            return Err(StoreError::TooManyChunks {
                needed,
                limit: MAX_CHUNK_COUNT,
            });
        }

        let mut chunks = Vec::new();
        let mut length = 0u64;
        let mut hasher = blake3::Hasher::new();
        loop {
            let mut buf = vec![0u8; chunk_size];
            let filled = fill(&mut source, &mut buf, declared - length)?;
            if filled == 0 {
                break;
            }
            length += filled as u64;
            hasher.update(&buf[..filled]);
            if filled < chunk_size {
                // Short fill: source ended or declared length reached.
                buf.truncate(filled);
                chunks.push(buf);
                break;
            }
            chunks.push(buf);
        }

        if length != declared {
            return Err(StoreError::LengthMismatch {
                expected: declared,
                actual: length,
            });
        }
        Ok(ChunkedPayload {
            chunks,
            length,
            content_hash: hasher.finalize().to_hex().to_string(),
        })
    }

    // ---- Read ----

    /// Forward every chunk of the blob to `sink` in sequence order.
    ///
    /// Chunks are read from one snapshot and handed to the sink after the
    /// read transaction ends. Sets `descriptor.length` to the number of
    /// bytes forwarded. An identifier with no chunks yields zero bytes and
    /// no error; use [`ChunkEngine::find`] to tell a missing blob apart.
    pub fn stream<W: Write>(&self, descriptor: &mut Descriptor, mut sink: W) -> StoreResult<u64> {
        let id = descriptor.require_id()?.clone();
        let range = self.keyspace.chunk_range(&id)?;
        let chunks = self.store.transact(|tx| tx.scan_range(&range))?;

        let mut written = 0u64;
        for (_, value) in &chunks {
            if let Err(source) = forward(&mut sink, value, &mut written) {
                descriptor.length = written;
                return Err(StoreError::SinkWrite { written, source });
            }
        }
        if let Err(source) = sink.flush() {
            descriptor.length = written;
            return Err(StoreError::SinkWrite { written, source });
        }

        descriptor.length = written;
        debug!(id = %id, bytes = written, chunks = chunks.len(), "blob streamed");
        Ok(written)
    }

    /// Stream the blob named by a raw identifier string.
    pub fn stream_id<W: Write>(&self, id: &str, sink: W) -> StoreResult<u64> {
        let mut descriptor = Descriptor::with_id(BlobId::parse(id)?);
        self.stream(&mut descriptor, sink)
    }

    // ---- Delete ----

    /// Remove the blob's chunks and descriptor in one transaction, then
    /// unbind the descriptor.
    pub fn destroy(&self, descriptor: &mut Descriptor) -> StoreResult<()> {
        let id = descriptor.require_id()?.clone();
        let range = self.keyspace.chunk_range(&id)?;
        let meta_key = self.keyspace.meta_key(&id);
        self.store.transact(|tx| {
            tx.clear_range(&range)?;
            tx.clear(&meta_key)
        })?;

        descriptor.id = None;
        info!(id = %id, "blob destroyed");
        Ok(())
    }

    /// Destroy the blob named by a raw identifier string.
    pub fn destroy_id(&self, id: &str) -> StoreResult<()> {
        let mut descriptor = Descriptor::with_id(BlobId::parse(id)?);
        self.destroy(&mut descriptor)
    }

    // ---- Metadata ----

    /// Load the stored descriptor into `descriptor`, overwriting its fields.
    ///
    /// Fails with `NotFound` (leaving `descriptor` untouched) when no record
    /// exists for the identifier.
    pub fn meta(&self, descriptor: &mut Descriptor) -> StoreResult<()> {
        let id = descriptor.require_id()?.clone();
        let key = self.keyspace.meta_key(&id);
        let bytes = self
            .store
            .transact(|tx| tx.get(&key))?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let mut stored = Descriptor::decode(&bytes)?;
        stored.id = Some(id);
        *descriptor = stored;
        Ok(())
    }

    /// Look up a blob's descriptor by raw identifier. Used for existence checks.
    pub fn find(&self, id: &str) -> StoreResult<Descriptor> {
        let mut descriptor = Descriptor::with_id(BlobId::parse(id)?);
        self.meta(&mut descriptor)?;
        Ok(descriptor)
    }

    /// Persist `descriptor`, replacing any prior record for its identifier.
    pub fn set_meta(&self, descriptor: &Descriptor) -> StoreResult<()> {
        let id = descriptor.require_id()?;
        self.store.transact(|tx| self.write_meta(tx, id, descriptor))
    }

    /// Remove the descriptor record and unbind `descriptor`.
    ///
    /// Idempotent: succeeds whether or not a record exists. Store failures
    /// are logged and swallowed so a repeated delete is always safe.
    pub fn destroy_meta(&self, descriptor: &mut Descriptor) -> StoreResult<()> {
        let id = descriptor.require_id()?.clone();
        let key = self.keyspace.meta_key(&id);
        if let Err(e) = self.store.transact(|tx| tx.clear(&key)) {
            warn!(id = %id, error = %e, "failed to clear descriptor");
        }
        descriptor.id = None;
        Ok(())
    }

    fn write_meta(
        &self,
        tx: &mut dyn KvTransaction,
        id: &BlobId,
        descriptor: &Descriptor,
    ) -> StoreResult<()> {
        let encoded = descriptor.encode()?;
        tx.set(&self.keyspace.meta_key(id), &encoded)?;
        Ok(())
    }
}

impl<S> std::fmt::Debug for ChunkEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkEngine")
            .field("keyspace", &self.keyspace)
            .field("config", &self.config)
            .finish()
    }
}

/// Read into `buf` until it is full, the source ends, or `remaining` bytes
/// have been read. Returns the number of bytes placed in `buf`.
fn fill<R: Read>(source: &mut R, buf: &mut [u8], remaining: u64) -> StoreResult<usize> {
    let limit = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
    let mut offset = 0;
    while offset < limit {
        match source.read(&mut buf[offset..limit]) {
            Ok(0) => break,
            Ok(n) => offset += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StoreError::Source(e)),
        }
    }
    Ok(offset)
}

/// Write all of `buf` to `sink`, adding every byte the sink accepts to
/// `written`, including those accepted before a failure.
fn forward<W: Write>(sink: &mut W, mut buf: &[u8], written: &mut u64) -> io::Result<()> {
    while !buf.is_empty() {
        match sink.write(buf) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                *written += n as u64;
                buf = &buf[n..];
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
