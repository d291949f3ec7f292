//! Catalog container format.
//!
//! ```text
//! [4]  magic "CCAT"
//! [4]  version u32
//! [4]  flags u32           bit 0: blob is zstd-compressed
//! [4]  header id u32       CatalogHeader inside the blob
//! [8]  blob length u64     uncompressed
//! [8]  stored length u64
//! [4]  crc32 of the stored blob
//! [n]  stored blob
//! [32] BLAKE3 of everything above
//! ```
//!
//! All integers are big-endian.

use std::path::Path;

use bytes::Bytes;
use ccat_hash::ContentHasher;
use ccat_types::Id;
use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult};

pub const MAGIC: &[u8; 4] = b"CCAT";
pub const VERSION: u32 = 1;
pub const FLAG_ZSTD: u32 = 1;

const PREAMBLE_LEN: usize = 36;
const CHECKSUM_LEN: usize = 32;
const COMPRESSION_LEVEL: i32 = 3;

/// A finished catalog blob plus the id of its header record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogFile {
    header: Id,
    blob: Bytes,
    compressed: bool,
}

impl CatalogFile {
    pub fn new(header: Id, blob: Bytes) -> Self {
        Self {
            header,
            blob,
            compressed: false,
        }
    }

    /// Store the blob zstd-compressed when encoded.
    pub fn with_compression(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    pub fn header(&self) -> Id {
        self.header
    }

    /// The uncompressed store buffer.
    pub fn blob(&self) -> &Bytes {
        &self.blob
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Encode the container.
    pub fn to_bytes(&self) -> CatalogResult<Vec<u8>> {
        let stored = if self.compressed {
            zstd::encode_all(&self.blob[..], COMPRESSION_LEVEL)
                .map_err(|e| CatalogError::CompressionFailed(e.to_string()))?
        } else {
            self.blob.to_vec()
        };
        let flags = if self.compressed { FLAG_ZSTD } else { 0 };

        let mut out = Vec::with_capacity(PREAMBLE_LEN + stored.len() + CHECKSUM_LEN);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(&flags.to_be_bytes());
        out.extend_from_slice(&self.header.as_u32().to_be_bytes());
        out.extend_from_slice(&(self.blob.len() as u64).to_be_bytes());
        out.extend_from_slice(&(stored.len() as u64).to_be_bytes());
        out.extend_from_slice(&crc32fast::hash(&stored).to_be_bytes());
        out.extend_from_slice(&stored);

        let checksum = ContentHasher::raw_hash(&out);
        out.extend_from_slice(&checksum);
        Ok(out)
    }

    /// Decode and verify a container.
    pub fn from_bytes(data: &[u8]) -> CatalogResult<Self> {
        if data.len() < PREAMBLE_LEN + CHECKSUM_LEN {
            return Err(CatalogError::Truncated {
                needed: PREAMBLE_LEN + CHECKSUM_LEN,
                len: data.len(),
            });
        }
        if &data[0..4] != MAGIC {
            return Err(CatalogError::InvalidMagic {
                expected: String::from_utf8_lossy(MAGIC).into(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }
        let version = be_u32(&data[4..8]);
        if version != VERSION {
            return Err(CatalogError::UnsupportedVersion(version));
        }

        let (body, trailer) = data.split_at(data.len() - CHECKSUM_LEN);
        if ContentHasher::raw_hash(body) != trailer {
            warn!(len = data.len(), "catalog checksum mismatch");
            return Err(CatalogError::ChecksumMismatch);
        }

        let flags = be_u32(&data[8..12]);
        let header = Id::new(be_u32(&data[12..16]));
        let blob_len = be_u64(&data[16..24]);
        let stored_len = be_u64(&data[24..32]);
        let expected_crc = be_u32(&data[32..36]);

        let stored = &body[PREAMBLE_LEN..];
        if stored.len() as u64 != stored_len {
            return Err(CatalogError::SizeMismatch {
                expected: stored_len,
                actual: stored.len() as u64,
            });
        }
        let actual_crc = crc32fast::hash(stored);
        if actual_crc != expected_crc {
            warn!(expected_crc, actual_crc, "catalog blob CRC mismatch");
            return Err(CatalogError::CrcMismatch {
                expected: expected_crc,
                actual: actual_crc,
            });
        }

        let compressed = flags & FLAG_ZSTD != 0;
        let blob = if compressed {
            zstd::decode_all(stored).map_err(|e| CatalogError::DecompressionFailed(e.to_string()))?
        } else {
            stored.to_vec()
        };
        if blob.len() as u64 != blob_len {
            return Err(CatalogError::SizeMismatch {
                expected: blob_len,
                actual: blob.len() as u64,
            });
        }
        if blob.len() > u32::MAX as usize {
            return Err(CatalogError::TooLarge);
        }

        debug!(bytes = blob.len(), compressed, "decoded catalog container");
        Ok(Self {
            header,
            blob: Bytes::from(blob),
            compressed,
        })
    }

    pub fn write_to(&self, path: &Path) -> CatalogResult<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> CatalogResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(buf)
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(compressed: bool) -> CatalogFile {
        let blob: Vec<u8> = (0..4096u32).flat_map(|i| (i % 7).to_le_bytes()).collect();
        CatalogFile::new(Id::new(12), Bytes::from(blob)).with_compression(compressed)
    }

    #[test]
    fn roundtrip_plain() {
        let file = sample(false);
        let bytes = file.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(bytes.len(), PREAMBLE_LEN + file.blob().len() + CHECKSUM_LEN);
        assert_eq!(CatalogFile::from_bytes(&bytes).unwrap(), file);
    }

    #[test]
    fn roundtrip_compressed() {
        let file = sample(true);
        let bytes = file.to_bytes().unwrap();
        assert!(bytes.len() < file.blob().len());
        let decoded = CatalogFile::from_bytes(&bytes).unwrap();
        assert!(decoded.is_compressed());
        assert_eq!(decoded.header(), Id::new(12));
        assert_eq!(decoded.blob(), file.blob());
    }

    #[test]
    fn empty_blob() {
        let file = CatalogFile::new(Id::new(0), Bytes::new());
        let bytes = file.to_bytes().unwrap();
        assert_eq!(CatalogFile::from_bytes(&bytes).unwrap(), file);
    }

    #[test]
    fn bad_magic() {
        let mut bytes = sample(false).to_bytes().unwrap();
        bytes[0..4].copy_from_slice(b"NOPE");
        let err = CatalogFile::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidMagic { .. }));
    }

    #[test]
    fn bad_version() {
        let mut bytes = sample(false).to_bytes().unwrap();
        bytes[4..8].copy_from_slice(&99u32.to_be_bytes());
        let err = CatalogFile::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedVersion(99)));
    }

    #[test]
    fn flipped_blob_byte_fails_checksum() {
        let mut bytes = sample(true).to_bytes().unwrap();
        bytes[PREAMBLE_LEN + 3] ^= 0xFF;
        let err = CatalogFile::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CatalogError::ChecksumMismatch));
    }

    #[test]
    fn resigned_corruption_fails_crc() {
        let mut bytes = sample(false).to_bytes().unwrap();
        bytes[PREAMBLE_LEN] ^= 0xFF;
        let end = bytes.len() - CHECKSUM_LEN;
        let checksum = ContentHasher::raw_hash(&bytes[..end]);
        bytes[end..].copy_from_slice(&checksum);
        let err = CatalogFile::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CatalogError::CrcMismatch { .. }));
    }

    #[test]
    fn too_short() {
        let err = CatalogFile::from_bytes(b"CCAT").unwrap_err();
        assert!(matches!(err, CatalogError::Truncated { len: 4, .. }));
    }

    #[test]
    fn disk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.ccat");
        let file = sample(true);
        file.write_to(&path).unwrap();
        assert!(path.exists());
        assert_eq!(CatalogFile::read_from(&path).unwrap(), file);
    }
}
