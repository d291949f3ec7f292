use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use bytemuck::Pod;
use bytes::Bytes;
use ccat_types::{Id, TypeTag};
use tracing::debug;

use crate::adapter::{AdapterRegistry, SerializationAdapter};
use crate::cache::ReadCache;
use crate::config::ReaderConfig;
use crate::error::{StorageError, StorageResult};
use crate::string::{decode_record, StringRecord};
use crate::varint::{decode_optional_id, decode_varint};
use crate::writer::ensure_sized;

const ID_SIZE: usize = std::mem::size_of::<u32>();

/// Random-access reader over a finalized buffer.
///
/// Every read is a pure function of the bytes and the id it is given; the
/// reader holds no knowledge of which ids are roots. Strings and objects may be
/// kept in a bounded cache, in which case repeated reads of one id return the
/// same `Arc`.
///
/// `Reader` is `Send + Sync` and can be shared between threads.
pub struct Reader {
    data: Bytes,
    cache: ReadCache,
    registry: Arc<AdapterRegistry>,
}

struct ObjectHeader {
    tag: Option<TypeTag>,
    payload: Id,
}

impl Reader {
    /// Wrap `data` with a cache of `cache_capacity` entries (0 disables it).
    pub fn new(data: impl Into<Bytes>, cache_capacity: u64, registry: Arc<AdapterRegistry>) -> Self {
        let data = data.into();
        debug!(bytes = data.len(), cache_capacity, adapters = registry.len(), "opened reader");
        Self {
            data,
            cache: ReadCache::new(cache_capacity),
            registry,
        }
    }

    /// Wrap `data` using a [`ReaderConfig`].
    pub fn from_config(data: impl Into<Bytes>, config: &ReaderConfig, registry: Arc<AdapterRegistry>) -> Self {
        Self::new(data, config.cache_capacity, registry)
    }

    /// Wrap `data` without adapters; object reads will fail.
    pub fn without_adapters(data: impl Into<Bytes>, cache_capacity: u64) -> Self {
        Self::new(data, cache_capacity, Arc::new(AdapterRegistry::empty()))
    }

    /// Buffer size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The underlying bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// The adapters used for object reads.
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Configured cache capacity in entries.
    pub fn cache_capacity(&self) -> u64 {
        self.cache.capacity()
    }

    // -----------------------------------------------------------------------
    // Values and arrays
    // -----------------------------------------------------------------------

    /// Copy the `size_of::<T>()` bytes at `id` into a `T`.
    pub fn read_value<T: Pod>(&self, id: Id) -> StorageResult<T> {
        ensure_sized::<T>()?;
        let bytes = self.slice(id, std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Read an array written by `write_array` or `reserve_array`.
    pub fn read_value_array<T: Pod>(&self, id: Id) -> StorageResult<Vec<T>> {
        ensure_sized::<T>()?;
        let size = std::mem::size_of::<T>();
        let payload = self.array_payload(id, size)?;
        Ok(payload
            .chunks_exact(size)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    fn slice(&self, id: Id, len: usize) -> StorageResult<&[u8]> {
        let invalid = || StorageError::InvalidId {
            id,
            needed: len,
            len: self.data.len(),
        };
        if id.is_null() {
            return Err(invalid());
        }
        let end = id.offset().checked_add(len).ok_or_else(invalid)?;
        self.data.get(id.offset()..end).ok_or_else(invalid)
    }

    fn array_payload(&self, id: Id, element_size: usize) -> StorageResult<&[u8]> {
        self.slice(id, 1)?;
        let tail = &self.data[id.offset()..];
        let (len, consumed) = decode_varint(tail, id)?;
        let len = usize::try_from(len).map_err(|_| StorageError::corrupt(id, "array length overflow"))?;
        if len % element_size != 0 {
            return Err(StorageError::InvalidId {
                id,
                needed: len.next_multiple_of(element_size),
                len: self.data.len(),
            });
        }
        tail.get(consumed..consumed.saturating_add(len))
            .ok_or_else(|| StorageError::corrupt(id, "array extends beyond buffer"))
    }

    // -----------------------------------------------------------------------
    // Strings
    // -----------------------------------------------------------------------

    /// Rebuild the string at `id`, joining prefix chains with `separator`.
    ///
    /// Returns `None` for [`Id::NULL`]. `separator` must be the one the string
    /// was written with whenever the record is prefix-chained.
    pub fn read_string(&self, id: Id, separator: Option<char>) -> StorageResult<Option<Arc<str>>> {
        if id.is_null() {
            return Ok(None);
        }
        if let Some(hit) = self.cache.get_string(id, separator) {
            return Ok(Some(hit));
        }

        let chain = self.string_chain(id, separator)?;
        let total = chain_length(&chain, separator);
        let mut text = String::with_capacity(total);
        for (i, (record_id, record)) in chain.iter().rev().enumerate() {
            if i > 0 {
                if let Some(sep) = separator {
                    text.push(sep);
                }
            }
            record.push_to(&mut text, *record_id)?;
        }

        let text: Arc<str> = Arc::from(text);
        self.cache.insert_string(id, separator, Arc::clone(&text));
        Ok(Some(text))
    }

    /// UTF-8 length of the string at `id`, without building it.
    ///
    /// Equals `read_string(id, separator)`'s length; 0 for [`Id::NULL`].
    pub fn compute_string_length(&self, id: Id, separator: Option<char>) -> StorageResult<usize> {
        if id.is_null() {
            return Ok(0);
        }
        if let Some(hit) = self.cache.get_string(id, separator) {
            return Ok(hit.len());
        }
        let chain = self.string_chain(id, separator)?;
        Ok(chain_length(&chain, separator))
    }

    /// Records of a string from `id` back to its root literal.
    fn string_chain(&self, id: Id, separator: Option<char>) -> StorageResult<Vec<(Id, StringRecord<'_>)>> {
        let mut chain = Vec::new();
        let mut current = id;
        loop {
            let record = decode_record(&self.data, current)?;
            chain.push((current, record));
            match record.parent {
                None => return Ok(chain),
                Some(_) if separator.is_none() => return Err(StorageError::MissingSeparator(id)),
                Some(parent) => current = parent,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    /// Read an object of type `T`.
    ///
    /// A stored tag selects the adapter and must belong to `T`; untagged
    /// objects use the adapter registered for `T`. Returns `None` for
    /// [`Id::NULL`].
    pub fn read_object<T: Any + Send + Sync>(&self, id: Id) -> StorageResult<Option<Arc<T>>> {
        let expected = (TypeId::of::<T>(), type_name::<T>());
        match self.read_object_with(id, Some(expected))? {
            None => Ok(None),
            Some(object) => object.downcast::<T>().map(Some).map_err(|_| StorageError::TypeMismatch {
                id,
                expected: type_name::<T>(),
                found: "object of another type",
            }),
        }
    }

    /// Read an object whose type is resolved from its stored tag.
    pub fn read_object_dyn(&self, id: Id) -> StorageResult<Option<Arc<dyn Any + Send + Sync>>> {
        self.read_object_with(id, None)
    }

    /// Read an array written by `write_objects`, as `T`.
    ///
    /// [`Id::NULL`] reads as an empty array.
    pub fn read_object_array<T: Any + Send + Sync>(&self, id: Id) -> StorageResult<Vec<Arc<T>>> {
        let mut out = Vec::new();
        self.process_object_array::<T, _, _>(id, &mut out, |object, out, index, count| {
            if index == 0 {
                out.reserve(count);
            }
            out.push(object);
        })?;
        Ok(out)
    }

    /// Read an array written by `write_objects` with per-element type tags.
    pub fn read_object_array_dyn(&self, id: Id) -> StorageResult<Vec<Arc<dyn Any + Send + Sync>>> {
        let ids = self.element_ids(id)?;
        let mut out = Vec::with_capacity(ids.len() / ID_SIZE);
        for raw in ids.chunks_exact(ID_SIZE) {
            let element = element_id(raw);
            out.push(require(element, self.read_object_dyn(element)?)?);
        }
        Ok(out)
    }

    /// Stream the elements of an object array to `visitor` without building
    /// an intermediate collection.
    ///
    /// The visitor receives `(element, context, index, count)`.
    pub fn process_object_array<T, C, F>(&self, id: Id, context: &mut C, mut visitor: F) -> StorageResult<()>
    where
        T: Any + Send + Sync,
        F: FnMut(Arc<T>, &mut C, usize, usize),
    {
        let ids = self.element_ids(id)?;
        let count = ids.len() / ID_SIZE;
        for (index, raw) in ids.chunks_exact(ID_SIZE).enumerate() {
            let element = element_id(raw);
            let object = require(element, self.read_object::<T>(element)?)?;
            visitor(object, context, index, count);
        }
        Ok(())
    }

    fn element_ids(&self, id: Id) -> StorageResult<&[u8]> {
        if id.is_null() {
            return Ok(&[]);
        }
        self.array_payload(id, ID_SIZE)
    }

    fn read_object_with(
        &self,
        id: Id,
        expected: Option<(TypeId, &'static str)>,
    ) -> StorageResult<Option<Arc<dyn Any + Send + Sync>>> {
        if id.is_null() {
            return Ok(None);
        }
        let header = self.object_header(id)?;
        let adapter = self.resolve_adapter(id, header.tag, expected)?;
        let tag = adapter.tag();
        if let Some(hit) = self.cache.get_object(id, tag) {
            return Ok(Some(hit));
        }

        let object = adapter.deserialize(self, header.payload)?;
        self.cache.insert_object(id, tag, Arc::clone(&object));
        Ok(Some(object))
    }

    fn resolve_adapter(
        &self,
        id: Id,
        tag: Option<TypeTag>,
        expected: Option<(TypeId, &'static str)>,
    ) -> StorageResult<&Arc<dyn SerializationAdapter>> {
        match (tag, expected) {
            (Some(tag), expected) => {
                let adapter = self.registry.by_tag(tag)?;
                match expected {
                    Some((object_type, name)) if adapter.object_type() != object_type => {
                        Err(StorageError::TypeMismatch {
                            id,
                            expected: name,
                            found: adapter.type_name(),
                        })
                    }
                    _ => Ok(adapter),
                }
            }
            (None, Some((object_type, name))) => self.registry.by_type(object_type, name),
            (None, None) => Err(StorageError::MissingTypeTag(id)),
        }
    }

    fn object_header(&self, id: Id) -> StorageResult<ObjectHeader> {
        self.slice(id, 1)?;
        let tail = &self.data[id.offset()..];
        let (tag_field, consumed) = decode_varint(tail, id)?;
        let (payload, _) = decode_optional_id(&tail[consumed..], id)?;
        let tag = match tag_field {
            0 => None,
            raw => Some(TypeTag::new(
                u32::try_from(raw - 1).map_err(|_| StorageError::corrupt(id, "type tag out of range"))?,
            )),
        };
        Ok(ObjectHeader {
            tag,
            payload: payload.unwrap_or(Id::NULL),
        })
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("len", &self.data.len())
            .field("cache", &self.cache)
            .field("adapters", &self.registry)
            .finish()
    }
}

fn require<O>(id: Id, object: Option<O>) -> StorageResult<O> {
    object.ok_or_else(|| StorageError::corrupt(id, "null element in object array"))
}

fn element_id(raw: &[u8]) -> Id {
    Id::new(bytemuck::pod_read_unaligned::<u32>(raw))
}

fn chain_length(chain: &[(Id, StringRecord<'_>)], separator: Option<char>) -> usize {
    let text: usize = chain.iter().map(|(_, r)| r.utf8_len()).sum();
    let joints = chain.len().saturating_sub(1);
    text + joints * separator.map_or(0, char::len_utf8)
}
