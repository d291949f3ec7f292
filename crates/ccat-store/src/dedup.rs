use std::collections::HashMap;

use ccat_hash::ContentKey;
use ccat_types::Id;

/// A previously written byte range that may be reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    id: Id,
    len: usize,
}

/// Content-addressed index from record hash to candidate offsets.
///
/// A key only nominates candidates. [`DedupIndex::find`] compares the
/// candidate's stored bytes against the new content and reuses an id only on
/// an exact match, so two different records whose keys collide are both kept.
#[derive(Clone, Debug, Default)]
pub struct DedupIndex {
    candidates: HashMap<ContentKey, Vec<Span>>,
    spans: usize,
}

impl DedupIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a stored record whose bytes equal `bytes` exactly.
    ///
    /// `buffer` is the writer's current content; candidates are checked
    /// against it.
    pub fn find(&self, key: &ContentKey, bytes: &[u8], buffer: &[u8]) -> Option<Id> {
        let spans = self.candidates.get(key)?;
        spans
            .iter()
            .find(|span| {
                span.len == bytes.len()
                    && buffer.get(span.id.offset()..span.id.offset() + span.len) == Some(bytes)
            })
            .map(|span| span.id)
    }

    /// Register a written record as a candidate under `key`.
    pub fn insert(&mut self, key: ContentKey, id: Id, len: usize) {
        let spans = self.candidates.entry(key).or_default();
        if !spans.iter().any(|s| s.id == id && s.len == len) {
            spans.push(Span { id, len });
            self.spans += 1;
        }
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.candidates.len()
    }

    /// Number of registered candidate spans.
    pub fn len(&self) -> usize {
        self.spans
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.spans == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccat_hash::ContentHasher;

    #[test]
    fn finds_exact_match() {
        let buffer = b"hello world".to_vec();
        let mut index = DedupIndex::new();
        let key = ContentHasher::VALUE.hash(b"world");
        index.insert(key, Id::new(6), 5);

        assert_eq!(index.find(&key, b"world", &buffer), Some(Id::new(6)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn missing_key_finds_nothing() {
        let index = DedupIndex::new();
        let key = ContentHasher::VALUE.hash(b"x");
        assert!(index.find(&key, b"x", b"x").is_none());
        assert!(index.is_empty());
    }

    // -----------------------------------------------------------------------
    // Collision handling
    // -----------------------------------------------------------------------

    #[test]
    fn colliding_key_with_different_bytes_is_not_reused() {
        let buffer = b"aaaabbbb".to_vec();
        let forced = ContentKey::from_hash([7; 32]);
        let mut index = DedupIndex::new();
        index.insert(forced, Id::new(0), 4);

        // Same key, different content: must not alias.
        assert!(index.find(&forced, b"bbbb", &buffer).is_none());

        // Register the second record under the same key; both stay findable.
        index.insert(forced, Id::new(4), 4);
        assert_eq!(index.key_count(), 1);
        assert_eq!(index.len(), 2);
        assert_eq!(index.find(&forced, b"aaaa", &buffer), Some(Id::new(0)));
        assert_eq!(index.find(&forced, b"bbbb", &buffer), Some(Id::new(4)));
    }

    #[test]
    fn colliding_key_with_different_length_is_not_reused() {
        let buffer = b"abcdef".to_vec();
        let forced = ContentKey::from_hash([1; 32]);
        let mut index = DedupIndex::new();
        index.insert(forced, Id::new(0), 3);
        assert!(index.find(&forced, b"abcd", &buffer).is_none());
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut index = DedupIndex::new();
        let key = ContentHasher::ARRAY.hash(b"k");
        index.insert(key, Id::new(0), 1);
        index.insert(key, Id::new(0), 1);
        assert_eq!(index.len(), 1);
    }
}
