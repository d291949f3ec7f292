use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Configuration for a [`Writer`](crate::Writer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Buffer growth granularity in bytes.
    pub chunk_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
        }
    }
}

/// Configuration for a [`Reader`](crate::Reader).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Maximum number of materialized strings and objects kept. 0 disables
    /// the cache.
    pub cache_capacity: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
        }
    }
}

/// Combined store configuration, usually loaded from `ccat.toml`.
///
/// ```toml
/// [writer]
/// chunk_size = 1024
///
/// [reader]
/// cache_capacity = 256
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub writer: WriterConfig,
    pub reader: ReaderConfig,
}

impl StoreConfig {
    /// Parse from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> StorageResult<Self> {
        toml::from_str(text).map_err(|e| StorageError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> StorageResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML text.
    pub fn to_toml_string(&self) -> StorageResult<String> {
        toml::to_string(self).map_err(|e| StorageError::Config(e.to_string()))
    }
}
