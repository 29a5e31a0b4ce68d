use std::sync::Arc;

use gridkv_kv::{Backend, MemoryKvStore, RedbKvStore};
use gridkv_store::{ChunkEngine, KeySpace, StoreError};

use crate::config::ServerConfig;
use crate::error::ServerResult;

/// Engine type shared by all handlers.
pub type Engine = ChunkEngine<Backend>;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    keyspace_root: Arc<str>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, keyspace_root: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            keyspace_root: keyspace_root.into(),
        }
    }

    /// Open the configured backend and key space and build an engine on them.
    pub fn from_config(config: &ServerConfig) -> ServerResult<Self> {
        let backend = match &config.data_path {
            Some(path) => Backend::from(RedbKvStore::open(path).map_err(StoreError::from)?),
            None => Backend::from(MemoryKvStore::with_max_retries(config.max_retries)),
        };
        let keyspace = KeySpace::create_or_open(&backend, &config.keyspace_root)?;
        let engine = ChunkEngine::new(Arc::new(backend), keyspace, config.engine_config())?;
        Ok(Self::new(Arc::new(engine), config.keyspace_root.as_str()))
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn keyspace_root(&self) -> &str {
        &self.keyspace_root
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.engine.store().name())
            .field("keyspace_root", &self.keyspace_root)
            .finish()
    }
}
