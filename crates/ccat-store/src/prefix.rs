use std::collections::HashMap;

use ccat_types::Id;

/// A separator-delimited string whose record can anchor longer strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixEntry {
    /// The full text of the prefix.
    pub prefix: Box<str>,
    /// Separator the prefix was split on.
    pub separator: char,
    /// Record holding the prefix.
    pub id: Id,
    /// Number of separator-delimited tokens in `prefix`.
    pub tokens: usize,
}

/// Registry of string prefixes written so far, per separator.
///
/// Entries keep insertion order; an entry's position in [`PrefixTable::entries`]
/// is its assigned index.
#[derive(Clone, Debug, Default)]
pub struct PrefixTable {
    entries: Vec<PrefixEntry>,
    lookup: HashMap<char, HashMap<Box<str>, usize>>,
}

impl PrefixTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `text` under `separator`, if registered.
    pub fn get(&self, text: &str, separator: char) -> Option<Id> {
        self.index_of(text, separator).map(|i| self.entries[i].id)
    }

    /// Assigned index for `text` under `separator`, if registered.
    pub fn index_of(&self, text: &str, separator: char) -> Option<usize> {
        self.lookup.get(&separator)?.get(text).copied()
    }

    /// Register `text` and return its index. Re-registering keeps the first id.
    pub fn insert(&mut self, text: &str, separator: char, id: Id) -> usize {
        if let Some(index) = self.index_of(text, separator) {
            return index;
        }
        let index = self.entries.len();
        self.entries.push(PrefixEntry {
            prefix: text.into(),
            separator,
            id,
            tokens: text.matches(separator).count() + 1,
        });
        self.lookup
            .entry(separator)
            .or_default()
            .insert(text.into(), index);
        index
    }

    /// Longest registered strict prefix of `text` that ends right before a
    /// separator. Returns the prefix's byte length and its record.
    pub fn longest_prefix(&self, text: &str, separator: char) -> Option<(usize, Id)> {
        let table = self.lookup.get(&separator)?;
        text.rmatch_indices(separator).find_map(|(end, _)| {
            table
                .get(&text[..end])
                .map(|&index| (end, self.entries[index].id))
        })
    }

    /// All entries in assignment order.
    pub fn entries(&self) -> &[PrefixEntry] {
        &self.entries
    }

    /// Entry at an assigned index.
    pub fn entry(&self, index: usize) -> Option<&PrefixEntry> {
        self.entries.get(index)
    }

    /// Number of registered prefixes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
