use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use gridkv_kv::memory::DEFAULT_MAX_RETRIES;
use gridkv_store::{EngineConfig, DEFAULT_CHUNK_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Default key-space root under which chunk and descriptor prefixes live.
pub const DEFAULT_KEYSPACE_ROOT: &str = "datamode";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// redb database file. `None` keeps everything in memory.
    pub data_path: Option<PathBuf>,
    pub keyspace_root: String,
    pub chunk_size: usize,
    /// Largest accepted request body, in bytes.
    pub max_upload_size: usize,
    /// Conflict retries for the in-memory backend.
    pub max_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            data_path: None,
            keyspace_root: DEFAULT_KEYSPACE_ROOT.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_size: 64 * 1024 * 1024,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ServerConfig {
    /// Read a TOML config file. Keys it leaves out take their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::with_chunk_size(self.chunk_size)
    }
}
