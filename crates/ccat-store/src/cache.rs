use std::any::Any;
use std::sync::Arc;

use ccat_types::{Id, TypeTag};
use moka::sync::Cache;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum CacheKey {
    String { id: Id, separator: Option<char> },
    Object { id: Id, tag: TypeTag },
}

#[derive(Clone)]
enum CacheValue {
    String(Arc<str>),
    Object(Arc<dyn Any + Send + Sync>),
}

/// Bounded cache of materialized strings and objects.
///
/// Strings are keyed by record id and separator, objects by record id and the
/// tag of the adapter that decoded them. Untagged headers of different types
/// can share an id, so the id alone does not identify an object.
///
/// Backed by a concurrent `moka` cache so a shared [`Reader`](crate::Reader)
/// can populate it from several threads. Two threads missing on the same id
/// both decode it; decode is a pure function of the bytes, so either result
/// is correct. Capacity 0 disables caching entirely.
pub struct ReadCache {
    inner: Option<Cache<CacheKey, CacheValue>>,
    capacity: u64,
}

impl ReadCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: (capacity > 0).then(|| Cache::new(capacity)),
            capacity,
        }
    }

    /// Configured capacity in entries.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns `true` unless the capacity is 0.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Approximate number of cached entries.
    pub fn entry_count(&self) -> u64 {
        self.inner.as_ref().map_or(0, |c| c.entry_count())
    }

    pub(crate) fn get_string(&self, id: Id, separator: Option<char>) -> Option<Arc<str>> {
        match self.inner.as_ref()?.get(&CacheKey::String { id, separator })? {
            CacheValue::String(s) => Some(s),
            CacheValue::Object(_) => None,
        }
    }

    pub(crate) fn insert_string(&self, id: Id, separator: Option<char>, value: Arc<str>) {
        if let Some(cache) = &self.inner {
            cache.insert(CacheKey::String { id, separator }, CacheValue::String(value));
        }
    }

    pub(crate) fn get_object(&self, id: Id, tag: TypeTag) -> Option<Arc<dyn Any + Send + Sync>> {
        match self.inner.as_ref()?.get(&CacheKey::Object { id, tag })? {
            CacheValue::Object(o) => Some(o),
            CacheValue::String(_) => None,
        }
    }

    pub(crate) fn insert_object(&self, id: Id, tag: TypeTag, value: Arc<dyn Any + Send + Sync>) {
        if let Some(cache) = &self.inner {
            cache.insert(CacheKey::Object { id, tag }, CacheValue::Object(value));
        }
    }
}

impl std::fmt::Debug for ReadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadCache")
            .field("capacity", &self.capacity)
            .field("entries", &self.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_cache_stores_nothing() {
        let cache = ReadCache::new(0);
        assert!(!cache.is_enabled());
        cache.insert_string(Id::new(1), None, Arc::from("x"));
        assert!(cache.get_string(Id::new(1), None).is_none());
    }

    #[test]
    fn string_hit_returns_same_instance() {
        let cache = ReadCache::new(8);
        let value: Arc<str> = Arc::from("Assets/Hero.prefab");
        cache.insert_string(Id::new(4), Some('/'), Arc::clone(&value));
        let hit = cache.get_string(Id::new(4), Some('/')).unwrap();
        assert!(Arc::ptr_eq(&hit, &value));
    }

    #[test]
    fn separator_is_part_of_the_key() {
        let cache = ReadCache::new(8);
        cache.insert_string(Id::new(4), Some('/'), Arc::from("a/b"));
        assert!(cache.get_string(Id::new(4), Some('.')).is_none());
        assert!(cache.get_string(Id::new(4), None).is_none());
    }

    #[test]
    fn strings_and_objects_do_not_collide() {
        let cache = ReadCache::new(8);
        cache.insert_object(Id::new(2), TypeTag::new(1), Arc::new(5u32));
        assert!(cache.get_string(Id::new(2), None).is_none());
        let hit = cache.get_object(Id::new(2), TypeTag::new(1)).unwrap();
        assert_eq!(hit.downcast_ref::<u32>(), Some(&5));
    }

    #[test]
    fn adapter_tag_is_part_of_the_object_key() {
        let cache = ReadCache::new(8);
        cache.insert_object(Id::new(2), TypeTag::new(1), Arc::new(5u32));
        assert!(cache.get_object(Id::new(2), TypeTag::new(2)).is_none());
    }
}
