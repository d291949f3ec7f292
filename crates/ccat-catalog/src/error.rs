use ccat_store::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("unsupported catalog version: {0}")]
    UnsupportedVersion(u32),

    #[error("catalog checksum mismatch")]
    ChecksumMismatch,

    #[error("CRC32 mismatch for catalog blob: expected {expected:08x}, got {actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("truncated catalog: need {needed} bytes, have {len}")]
    Truncated { needed: usize, len: usize },

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("blob size mismatch: header says {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("catalog exceeds the addressable size")]
    TooLarge,

    #[error("corrupt catalog: {0}")]
    Corrupt(String),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
