use ccat_types::Id;

use crate::error::StorageResult;

/// Growable contiguous byte storage behind a [`Writer`](crate::Writer).
///
/// Capacity grows in whole multiples of the configured chunk size so a long
/// run of small appends does not reallocate on every call. Appends return the
/// [`Id`] of their first byte; ids stay valid across reallocation because they
/// are offsets, not pointers.
#[derive(Clone, Debug)]
pub struct ByteBuffer {
    data: Vec<u8>,
    chunk_size: usize,
}

impl ByteBuffer {
    /// Create an empty buffer growing by `chunk_size` bytes at a time.
    ///
    /// A zero chunk size is treated as one byte.
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            data: Vec::with_capacity(chunk_size),
            chunk_size,
        }
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Currently allocated capacity.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// The growth granularity.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// All bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Take the written bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Append bytes and return the id of the first one.
    pub fn append(&mut self, bytes: &[u8]) -> StorageResult<Id> {
        let id = self.claim(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(id)
    }

    /// Append `len` zero bytes and return the id of the first one.
    pub fn append_zeroed(&mut self, len: usize) -> StorageResult<Id> {
        let id = self.claim(len)?;
        self.data.resize(self.data.len() + len, 0);
        Ok(id)
    }

    /// Overwrite bytes in place. The range must already be written.
    pub(crate) fn patch(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Borrow `len` bytes starting at `offset`, if they exist.
    pub fn slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.data.get(offset..end)
    }

    fn claim(&mut self, additional: usize) -> StorageResult<Id> {
        let start = Id::from_offset(self.data.len())?;
        let end = self.data.len().saturating_add(additional);
        // The last byte must itself be addressable.
        Id::from_offset(end.saturating_sub(1))?;
        if end > self.data.capacity() {
            let target = end.div_ceil(self.chunk_size) * self.chunk_size;
            self.data.reserve_exact(target - self.data.len());
        }
        Ok(start)
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new(crate::config::WriterConfig::default().chunk_size)
    }
}
