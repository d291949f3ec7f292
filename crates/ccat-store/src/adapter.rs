use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use ccat_types::{Id, TypeTag};

use crate::error::{StorageError, StorageResult};
use crate::reader::Reader;
use crate::writer::Writer;

/// Encode/decode strategy for one object type.
///
/// All type-specific layout lives in adapters; the writer and reader only
/// dispatch on [`TypeId`] (writes, typed reads) or on the stored [`TypeTag`]
/// (polymorphic reads).
///
/// Implementations must be deterministic: logically equal objects must
/// serialize to identical bytes, otherwise the writer cannot deduplicate them.
pub trait SerializationAdapter: Send + Sync {
    /// Stable tag embedded in type-preserving object records.
    fn tag(&self) -> TypeTag;

    /// Runtime type this adapter encodes.
    fn object_type(&self) -> TypeId;

    /// Human-readable type name for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Adapters for types that may appear while this type is encoded or
    /// decoded. Registries follow these transitively.
    fn dependencies(&self) -> Vec<Arc<dyn SerializationAdapter>> {
        Vec::new()
    }

    /// Write `object` and return the id of its payload.
    fn serialize(&self, writer: &mut Writer, object: &dyn Any) -> StorageResult<Id>;

    /// Rebuild an object from the payload at `id`.
    fn deserialize(&self, reader: &Reader, id: Id) -> StorageResult<Arc<dyn Any + Send + Sync>>;
}

/// Downcast the object handed to [`SerializationAdapter::serialize`].
pub fn expect_object<'a, T: Any>(
    object: &'a dyn Any,
    adapter: &dyn SerializationAdapter,
) -> StorageResult<&'a T> {
    object
        .downcast_ref::<T>()
        .ok_or_else(|| StorageError::TypeMismatch {
            id: Id::NULL,
            expected: adapter.type_name(),
            found: "foreign object",
        })
}

/// Mapping from type tags and runtime types to adapters.
///
/// Built once and shared by writers and readers behind an `Arc`.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    by_tag: HashMap<TypeTag, Arc<dyn SerializationAdapter>>,
    by_type: HashMap<TypeId, TypeTag>,
}

impl AdapterRegistry {
    /// A registry with no adapters. Object reads and writes will fail.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from root adapters and everything they depend on.
    pub fn build<I>(adapters: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = Arc<dyn SerializationAdapter>>,
    {
        let mut registry = Self::empty();
        for adapter in adapters {
            registry.register(adapter)?;
        }
        Ok(registry)
    }

    /// Register an adapter and its transitive dependencies.
    pub fn register(&mut self, adapter: Arc<dyn SerializationAdapter>) -> StorageResult<()> {
        let mut pending = VecDeque::from([adapter]);
        while let Some(adapter) = pending.pop_front() {
            if self.insert_one(&adapter)? {
                pending.extend(adapter.dependencies());
            }
        }
        Ok(())
    }

    /// Returns `false` when the exact adapter pairing is already present.
    fn insert_one(&mut self, adapter: &Arc<dyn SerializationAdapter>) -> StorageResult<bool> {
        let tag = adapter.tag();
        let object_type = adapter.object_type();

        if let Some(existing) = self.by_tag.get(&tag) {
            if existing.object_type() == object_type {
                return Ok(false);
            }
            return Err(StorageError::ConflictingAdapter {
                tag,
                existing: existing.type_name(),
                incoming: adapter.type_name(),
            });
        }
        if let Some(existing_tag) = self.by_type.get(&object_type) {
            return Err(StorageError::ConflictingAdapter {
                tag: *existing_tag,
                existing: self.by_tag[existing_tag].type_name(),
                incoming: adapter.type_name(),
            });
        }

        tracing::debug!(%tag, type_name = adapter.type_name(), "registered adapter");
        self.by_tag.insert(tag, Arc::clone(adapter));
        self.by_type.insert(object_type, tag);
        Ok(true)
    }

    /// Adapter for a stored tag.
    pub fn by_tag(&self, tag: TypeTag) -> StorageResult<&Arc<dyn SerializationAdapter>> {
        self.by_tag.get(&tag).ok_or(StorageError::UnknownTypeTag(tag))
    }

    /// Adapter for a runtime type, if registered.
    pub fn lookup_type(&self, object_type: TypeId) -> Option<&Arc<dyn SerializationAdapter>> {
        self.by_type
            .get(&object_type)
            .and_then(|tag| self.by_tag.get(tag))
    }

    /// Adapter for a runtime type. `type_name` only feeds the error message.
    pub fn by_type(
        &self,
        object_type: TypeId,
        type_name: &str,
    ) -> StorageResult<&Arc<dyn SerializationAdapter>> {
        self.lookup_type(object_type)
            .ok_or_else(|| StorageError::UnregisteredType(type_name.to_string()))
    }

    /// Typed lookup convenience.
    pub fn for_type<T: Any>(&self) -> StorageResult<&Arc<dyn SerializationAdapter>> {
        self.by_type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Returns `true` if a tag is registered.
    pub fn contains(&self, tag: TypeTag) -> bool {
        self.by_tag.contains_key(&tag)
    }

    /// Registered tags in ascending order.
    pub fn tags(&self) -> Vec<TypeTag> {
        let mut tags: Vec<TypeTag> = self.by_tag.keys().copied().collect();
        tags.sort();
        tags
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    /// Returns `true` if no adapter is registered.
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for tag in self.tags() {
            map.entry(&tag.value(), &self.by_tag[&tag].type_name());
        }
        map.finish()
    }
}
