use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Largest value the underlying store accepts, in bytes.
pub const MAX_VALUE_SIZE: usize = 100_000;

/// Configuration for the chunk engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of every chunk except possibly the last one of a blob.
    pub chunk_size: usize,
    /// Upper bound on a single stored value; `chunk_size` must not exceed it.
    pub max_value_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_value_size: MAX_VALUE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Default configuration with a different chunk size.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.chunk_size == 0 {
            return Err(StoreError::Config("chunk_size must be positive".into()));
        }
        if self.chunk_size > self.max_value_size {
            return Err(StoreError::Config(format!(
                "chunk_size {} exceeds max_value_size {}",
                self.chunk_size, self.max_value_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size, 50_000);
        assert_eq!(config.max_value_size, 100_000);
        config.validate().unwrap();
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = EngineConfig::with_chunk_size(0).validate().unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn oversized_chunks_are_rejected() {
        let err = EngineConfig::with_chunk_size(MAX_VALUE_SIZE + 1)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("exceeds max_value_size"));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"chunk_size": 4096}"#).unwrap();
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.max_value_size, MAX_VALUE_SIZE);
    }
}
