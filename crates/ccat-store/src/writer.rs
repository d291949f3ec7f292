use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::Pod;
use bytes::Bytes;
use ccat_hash::ContentHasher;
use ccat_types::{Id, TypeError, TypeTag};
use tracing::{debug, warn};

use crate::adapter::AdapterRegistry;
use crate::buffer::ByteBuffer;
use crate::config::WriterConfig;
use crate::dedup::DedupIndex;
use crate::error::{StorageError, StorageResult};
use crate::prefix::PrefixTable;
use crate::string::encode_record;
use crate::varint::{encode_optional_id, encode_varint};

/// Handle to a reserved, not yet written slot.
///
/// Returned by [`Writer::reserve`] and [`Writer::reserve_array`]. The id is
/// final as soon as the reservation exists, so it can be stored in other
/// records before the slot's content is known. The size is binding: the patch
/// must supply exactly that many bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reservation {
    id: Id,
    payload: usize,
    size: usize,
}

impl Reservation {
    /// Id the patched record will be read from.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Reserved payload size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotKind {
    Value,
    Array,
}

#[derive(Clone, Copy, Debug)]
struct ReservedSlot {
    payload: usize,
    size: usize,
    kind: SlotKind,
    patched: bool,
}

/// Counters describing what a writer has done.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Records appended to the buffer.
    pub records_written: u64,
    /// Writes answered with an existing id.
    pub dedup_hits: u64,
    /// Bytes not appended thanks to deduplication.
    pub bytes_deduplicated: u64,
    /// Slots handed out by `reserve*`.
    pub reservations: u64,
    /// Slots filled by `write_reserved*`.
    pub patches: u64,
    /// String writes answered from the prefix table.
    pub prefix_hits: u64,
}

/// Serializes values, arrays, strings and object graphs into one buffer.
///
/// Every write returns the [`Id`] of its record. Writing byte-identical
/// content again returns the earlier id without growing the buffer;
/// reserved slots are the exception until they are patched.
///
/// A writer is single-owner: all mutation goes through `&mut self`.
pub struct Writer {
    buffer: ByteBuffer,
    dedup: DedupIndex,
    prefixes: PrefixTable,
    reservations: HashMap<Id, ReservedSlot>,
    registry: Arc<AdapterRegistry>,
    stats: WriterStats,
}

impl Writer {
    /// Create a writer without object adapters.
    pub fn new(config: WriterConfig) -> Self {
        Self::with_adapters(config, Arc::new(AdapterRegistry::empty()))
    }

    /// Create a writer growing by `chunk_size` bytes, without adapters.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self::new(WriterConfig { chunk_size })
    }

    /// Create a writer that encodes objects with `registry`.
    pub fn with_adapters(config: WriterConfig, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            buffer: ByteBuffer::new(config.chunk_size),
            dedup: DedupIndex::new(),
            prefixes: PrefixTable::new(),
            reservations: HashMap::new(),
            registry,
            stats: WriterStats::default(),
        }
    }

    /// Current buffer size in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The adapters this writer dispatches objects to.
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// String prefixes registered so far.
    pub fn prefixes(&self) -> &PrefixTable {
        &self.prefixes
    }

    /// Activity counters.
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    // -----------------------------------------------------------------------
    // Values and arrays
    // -----------------------------------------------------------------------

    /// Write a fixed-layout value as its raw bytes.
    pub fn write<T: Pod>(&mut self, value: &T) -> StorageResult<Id> {
        ensure_sized::<T>()?;
        self.append_deduped(&ContentHasher::VALUE, bytemuck::bytes_of(value))
    }

    /// Write a contiguous array; the element count is recoverable on read.
    pub fn write_array<T: Pod>(&mut self, values: &[T]) -> StorageResult<Id> {
        ensure_sized::<T>()?;
        let payload: &[u8] = bytemuck::cast_slice(values);
        let mut record = Vec::with_capacity(payload.len() + 5);
        encode_varint(&mut record, payload.len() as u64);
        record.extend_from_slice(payload);
        self.append_deduped(&ContentHasher::ARRAY, &record)
    }

    // -----------------------------------------------------------------------
    // Reservations
    // -----------------------------------------------------------------------

    /// Reserve a zeroed slot for one `T`, to be filled by [`Writer::write_reserved`].
    pub fn reserve<T: Pod>(&mut self) -> StorageResult<Reservation> {
        ensure_sized::<T>()?;
        let size = std::mem::size_of::<T>();
        let id = self.buffer.append_zeroed(size)?;
        Ok(self.track(id, id.offset(), size, SlotKind::Value))
    }

    /// Reserve a zeroed array slot of `count` elements, to be filled by
    /// [`Writer::write_reserved_array`].
    pub fn reserve_array<T: Pod>(&mut self, count: usize) -> StorageResult<Reservation> {
        ensure_sized::<T>()?;
        let size = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(StorageError::BufferOverflow(TypeError::OffsetOverflow(usize::MAX)))?;
        let mut header = Vec::with_capacity(5);
        encode_varint(&mut header, size as u64);
        let id = self.buffer.append(&header)?;
        let payload = self.buffer.append_zeroed(size)?;
        Ok(self.track(id, payload.offset(), size, SlotKind::Array))
    }

    /// Fill a slot reserved with [`Writer::reserve`].
    pub fn write_reserved<T: Pod>(&mut self, reservation: Reservation, value: &T) -> StorageResult<Id> {
        self.patch(reservation, bytemuck::bytes_of(value))
    }

    /// Fill a slot reserved with [`Writer::reserve_array`].
    pub fn write_reserved_array<T: Pod>(
        &mut self,
        reservation: Reservation,
        values: &[T],
    ) -> StorageResult<Id> {
        self.patch(reservation, bytemuck::cast_slice(values))
    }

    /// Number of reservations not yet patched.
    pub fn pending_reservations(&self) -> usize {
        self.reservations.values().filter(|s| !s.patched).count()
    }

    fn track(&mut self, id: Id, payload: usize, size: usize, kind: SlotKind) -> Reservation {
        self.reservations.insert(
            id,
            ReservedSlot {
                payload,
                size,
                kind,
                patched: false,
            },
        );
        self.stats.reservations += 1;
        Reservation { id, payload, size }
    }

    fn patch(&mut self, reservation: Reservation, bytes: &[u8]) -> StorageResult<Id> {
        let id = reservation.id;
        let slot = *self
            .reservations
            .get(&id)
            .filter(|s| s.payload == reservation.payload && s.size == reservation.size)
            .ok_or(StorageError::UnknownReservation(id))?;
        if slot.patched {
            return Err(StorageError::ReservationAlreadyPatched(id));
        }
        if bytes.len() != slot.size {
            return Err(StorageError::SizeMismatch {
                id,
                reserved: slot.size,
                actual: bytes.len(),
            });
        }

        self.buffer.patch(slot.payload, bytes);
        if let Some(s) = self.reservations.get_mut(&id) {
            s.patched = true;
        }
        self.stats.patches += 1;

        // Now that the content is final, later writes may reuse it.
        let (hasher, start) = match slot.kind {
            SlotKind::Value => (&ContentHasher::VALUE, slot.payload),
            SlotKind::Array => (&ContentHasher::ARRAY, id.offset()),
        };
        let end = slot.payload + slot.size;
        let record = &self.buffer.as_slice()[start..end];
        self.dedup.insert(hasher.hash(record), id, end - start);
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Strings
    // -----------------------------------------------------------------------

    /// Write a string, sharing prefixes with earlier strings split on the
    /// same `separator`.
    ///
    /// `None` returns [`Id::NULL`]; the empty string gets a real record.
    /// Every separator-delimited prefix of `value` is registered, so a later
    /// string with the same leading tokens only stores its unmatched tail.
    /// A string is split at its separators even on first write; only a
    /// separator-free string is a single literal.
    pub fn write_string(&mut self, value: Option<&str>, separator: Option<char>) -> StorageResult<Id> {
        let Some(text) = value else {
            return Ok(Id::NULL);
        };
        let Some(separator) = separator else {
            return self.write_string_record(None, text);
        };
        if let Some(id) = self.prefixes.get(text, separator) {
            self.stats.prefix_hits += 1;
            return Ok(id);
        }

        let boundaries: Vec<usize> = text.match_indices(separator).map(|(i, _)| i).collect();
        let mut parent = self.prefixes.longest_prefix(text, separator);
        let first = match parent {
            Some((end, _)) => boundaries.partition_point(|&b| b <= end),
            None => 0,
        };

        let sep_len = separator.len_utf8();
        let mut last = Id::NULL;
        for end in boundaries[first..].iter().copied().chain(std::iter::once(text.len())) {
            let id = match parent {
                None => self.write_string_record(None, &text[..end])?,
                Some((parent_end, parent_id)) => {
                    self.write_string_record(Some(parent_id), &text[parent_end + sep_len..end])?
                }
            };
            self.prefixes.insert(&text[..end], separator, id);
            parent = Some((end, id));
            last = id;
        }
        Ok(last)
    }

    fn write_string_record(&mut self, parent: Option<Id>, text: &str) -> StorageResult<Id> {
        let record = encode_record(parent, text);
        self.append_deduped(&ContentHasher::STRING, &record)
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    /// Write an object through the adapter registered for its runtime type.
    ///
    /// With `write_type` the adapter's tag is stored, so the object can be read
    /// back without naming its type.
    pub fn write_object(&mut self, object: &dyn Any, write_type: bool) -> StorageResult<Id> {
        let adapter = self
            .registry
            .lookup_type(object.type_id())
            .cloned()
            .ok_or_else(|| StorageError::UnregisteredType(format!("{:?}", object.type_id())))?;
        let payload = adapter.serialize(self, object)?;
        let tag = write_type.then(|| adapter.tag());
        self.write_object_header(tag, payload)
    }

    /// Write every object, then an id array referencing them.
    ///
    /// With `write_type` each element carries its own tag, which allows
    /// heterogeneous arrays.
    pub fn write_objects<'a, I>(&mut self, objects: I, write_type: bool) -> StorageResult<Id>
    where
        I: IntoIterator<Item = &'a dyn Any>,
    {
        let ids = objects
            .into_iter()
            .map(|object| self.write_object(object, write_type).map(|id| id.as_u32()))
            .collect::<StorageResult<Vec<u32>>>()?;
        self.write_array(&ids)
    }

    fn write_object_header(&mut self, tag: Option<TypeTag>, payload: Id) -> StorageResult<Id> {
        let mut header = Vec::with_capacity(10);
        match tag {
            Some(tag) => encode_varint(&mut header, tag.value() as u64 + 1),
            None => encode_varint(&mut header, 0),
        }
        encode_optional_id(&mut header, Some(payload));
        self.append_deduped(&ContentHasher::OBJECT, &header)
    }

    // -----------------------------------------------------------------------
    // Finalization
    // -----------------------------------------------------------------------

    /// Snapshot of everything written so far.
    ///
    /// Can be called repeatedly; the writer keeps accepting writes and later
    /// snapshots extend earlier ones.
    pub fn serialize_to_bytes(&self) -> Bytes {
        self.log_finalize();
        Bytes::copy_from_slice(self.buffer.as_slice())
    }

    /// Consume the writer and hand over its buffer without copying.
    pub fn into_bytes(self) -> Bytes {
        self.log_finalize();
        Bytes::from(self.buffer.into_inner())
    }

    fn log_finalize(&self) {
        let pending = self.pending_reservations();
        if pending > 0 {
            warn!(pending, "finalizing with unpatched reservations");
        }
        debug!(
            bytes = self.buffer.len(),
            records = self.stats.records_written,
            dedup_hits = self.stats.dedup_hits,
            bytes_deduplicated = self.stats.bytes_deduplicated,
            prefixes = self.prefixes.len(),
            "serialized buffer"
        );
    }

    fn append_deduped(&mut self, hasher: &ContentHasher, bytes: &[u8]) -> StorageResult<Id> {
        let key = hasher.hash(bytes);
        if let Some(id) = self.dedup.find(&key, bytes, self.buffer.as_slice()) {
            self.stats.dedup_hits += 1;
            self.stats.bytes_deduplicated += bytes.len() as u64;
            return Ok(id);
        }
        let id = self.buffer.append(bytes)?;
        self.dedup.insert(key, id, bytes.len());
        self.stats.records_written += 1;
        Ok(id)
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new(WriterConfig::default())
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("len", &self.buffer.len())
            .field("prefixes", &self.prefixes.len())
            .field("pending_reservations", &self.pending_reservations())
            .field("adapters", &self.registry.len())
            .finish()
    }
}

pub(crate) fn ensure_sized<T>() -> StorageResult<()> {
    if std::mem::size_of::<T>() == 0 {
        return Err(StorageError::ZeroSizedType(std::any::type_name::<T>()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_values_share_an_id() {
        let mut writer = Writer::with_chunk_size(64);
        let a = writer.write(&42u32).unwrap();
        let len = writer.len();
        let b = writer.write(&42u32).unwrap();
        assert_eq!(a, b);
        assert_eq!(writer.len(), len);
        assert_eq!(writer.stats().dedup_hits, 1);
    }

    #[test]
    fn distinct_values_get_distinct_ids() {
        let mut writer = Writer::default();
        let a = writer.write(&1u64).unwrap();
        let b = writer.write(&2u64).unwrap();
        assert_ne!(a, b);
        assert_eq!(writer.len(), 16);
    }

    #[test]
    fn value_and_array_with_equal_bytes_stay_separate() {
        let mut writer = Writer::default();
        let value = writer.write(&7u32).unwrap();
        let array = writer.write_array(&[7u32]).unwrap();
        assert_ne!(value, array);
    }

    #[test]
    fn zero_sized_types_are_rejected() {
        let mut writer = Writer::default();
        assert!(matches!(writer.write(&()), Err(StorageError::ZeroSizedType(_))));
        assert!(matches!(writer.reserve::<()>(), Err(StorageError::ZeroSizedType(_))));
    }

    // -----------------------------------------------------------------------
    // Reservations
    // -----------------------------------------------------------------------

    #[test]
    fn reservation_size_is_binding() {
        let mut writer = Writer::default();
        let slot = writer.reserve::<u64>().unwrap();
        assert_eq!(slot.size(), 8);
        let err = writer.write_reserved(slot, &1u32).unwrap_err();
        assert!(matches!(err, StorageError::SizeMismatch { reserved: 8, actual: 4, .. }));

        let array = writer.reserve_array::<u16>(3).unwrap();
        let err = writer.write_reserved_array(array, &[1u16, 2]).unwrap_err();
        assert!(matches!(err, StorageError::SizeMismatch { reserved: 6, actual: 4, .. }));
    }

    #[test]
    fn reservation_is_patched_once() {
        let mut writer = Writer::default();
        let slot = writer.reserve::<u32>().unwrap();
        writer.write_reserved(slot, &5u32).unwrap();
        let err = writer.write_reserved(slot, &6u32).unwrap_err();
        assert!(matches!(err, StorageError::ReservationAlreadyPatched(_)));
    }

    #[test]
    fn foreign_reservation_is_rejected() {
        let mut other = Writer::default();
        other.write(&0u64).unwrap();
        let foreign = other.reserve::<u32>().unwrap();

        let mut writer = Writer::default();
        let err = writer.write_reserved(foreign, &1u32).unwrap_err();
        assert!(matches!(err, StorageError::UnknownReservation(_)));
    }

    #[test]
    fn unpatched_reservation_is_not_a_dedup_target() {
        let mut writer = Writer::default();
        let slot = writer.reserve::<u32>().unwrap();
        let zero = writer.write(&0u32).unwrap();
        assert_ne!(zero, slot.id());
        assert_eq!(writer.pending_reservations(), 1);
    }

    #[test]
    fn patched_reservation_becomes_a_dedup_target() {
        let mut writer = Writer::default();
        let slot = writer.reserve::<u32>().unwrap();
        writer.write_reserved(slot, &99u32).unwrap();
        let len = writer.len();
        assert_eq!(writer.write(&99u32).unwrap(), slot.id());
        assert_eq!(writer.len(), len);
        assert_eq!(writer.pending_reservations(), 0);
    }

    #[test]
    fn patched_array_reservation_becomes_a_dedup_target() {
        let mut writer = Writer::default();
        let slot = writer.reserve_array::<u32>(2).unwrap();
        writer.write_reserved_array(slot, &[3u32, 4]).unwrap();
        assert_eq!(writer.write_array(&[3u32, 4]).unwrap(), slot.id());
    }

    // -----------------------------------------------------------------------
    // Strings
    // -----------------------------------------------------------------------

    #[test]
    fn null_string_is_null_id() {
        let mut writer = Writer::default();
        assert_eq!(writer.write_string(None, Some('/')).unwrap(), Id::NULL);
        assert!(writer.is_empty());
    }

    #[test]
    fn empty_string_is_a_record() {
        let mut writer = Writer::default();
        let id = writer.write_string(Some(""), None).unwrap();
        assert!(!id.is_null());
        assert_eq!(writer.len(), 2);
    }

    #[test]
    fn prefixes_are_registered() {
        let mut writer = Writer::default();
        writer.write_string(Some("a/b/c"), Some('/')).unwrap();
        let table = writer.prefixes();
        assert_eq!(table.len(), 3);
        assert!(table.get("a", '/').is_some());
        assert!(table.get("a/b", '/').is_some());
        assert_eq!(table.entry(2).unwrap().tokens, 3);
    }

    #[test]
    fn first_write_splits_on_every_separator() {
        let mut writer = Writer::default();
        writer.write_string(Some("Assets/Hero.prefab"), Some('/')).unwrap();
        // "Assets" literal [tag][len][6] + "Hero.prefab" chain [tag][parent][len][11].
        assert_eq!(writer.len(), 8 + 14);
        assert_eq!(writer.prefixes().len(), 2);

        let mut plain = Writer::default();
        plain.write_string(Some("Assets"), Some('/')).unwrap();
        assert_eq!(plain.len(), 8);
    }

    #[test]
    fn repeated_string_hits_prefix_table() {
        let mut writer = Writer::default();
        let a = writer.write_string(Some("x/y"), Some('/')).unwrap();
        let len = writer.len();
        let b = writer.write_string(Some("x/y"), Some('/')).unwrap();
        assert_eq!(a, b);
        assert_eq!(writer.len(), len);
        assert_eq!(writer.stats().prefix_hits, 1);
    }

    #[test]
    fn shared_prefix_costs_less_than_raw() {
        let mut writer = Writer::default();
        writer.write_string(Some("a/b/c"), Some('/')).unwrap();
        let before = writer.len();
        writer.write_string(Some("a/b/d"), Some('/')).unwrap();
        assert!(writer.len() - before < "a/b/d".len());
    }

    #[test]
    fn snapshots_are_repeatable() {
        let mut writer = Writer::default();
        writer.write(&1u32).unwrap();
        let first = writer.serialize_to_bytes();
        assert_eq!(first, writer.serialize_to_bytes());
        writer.write(&2u32).unwrap();
        let second = writer.serialize_to_bytes();
        assert_eq!(&second[..first.len()], &first[..]);
        assert_eq!(second.len(), 8);
    }
}
