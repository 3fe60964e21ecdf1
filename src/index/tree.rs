//! BTreeMap-based index structure
//!
//! Entries are kept as `BTreeMap<IndexKey, BTreeSet<RecordId>>` so that both
//! keys and the record ids under one key iterate in a deterministic order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::storage::{RecordId, ScanDirection};
use crate::value::Value;

use super::key::IndexKey;

/// One bound of a key range, compared against key prefixes
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBound {
    pub parts: Vec<Value>,
    pub inclusive: bool,
}

impl KeyBound {
    pub fn inclusive(parts: Vec<Value>) -> Self {
        Self {
            parts,
            inclusive: true,
        }
    }

    pub fn exclusive(parts: Vec<Value>) -> Self {
        Self {
            parts,
            inclusive: false,
        }
    }
}

/// Range of keys; a missing bound is unbounded.
///
/// Bounds may be shorter than the key: `lower = [1]` inclusive selects
/// every key whose first part is at least 1.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyRange {
    pub lower: Option<KeyBound>,
    pub upper: Option<KeyBound>,
}

impl KeyRange {
    pub fn all() -> Self {
        Self::default()
    }

    /// Range selecting exactly the keys starting with `prefix`
    pub fn prefix(prefix: Vec<Value>) -> Self {
        Self {
            lower: Some(KeyBound::inclusive(prefix.clone())),
            upper: Some(KeyBound::inclusive(prefix)),
        }
    }

    fn above_lower(&self, key: &IndexKey) -> bool {
        match &self.lower {
            None => true,
            Some(b) => match key.prefix_cmp(&b.parts) {
                Ordering::Greater => true,
                Ordering::Equal => b.inclusive,
                Ordering::Less => false,
            },
        }
    }

    fn below_upper(&self, key: &IndexKey) -> bool {
        match &self.upper {
            None => true,
            Some(b) => match key.prefix_cmp(&b.parts) {
                Ordering::Less => true,
                Ordering::Equal => b.inclusive,
                Ordering::Greater => false,
            },
        }
    }
}

/// A single index entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: IndexKey,
    pub rid: RecordId,
}

/// Ordered index tree
#[derive(Debug, Default)]
pub struct IndexTree {
    tree: BTreeMap<IndexKey, BTreeSet<RecordId>>,
}

impl IndexTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: IndexKey, rid: RecordId) {
        self.tree.entry(key).or_default().insert(rid);
    }

    /// Removes one entry; the key disappears with its last record id.
    pub fn remove(&mut self, key: &IndexKey, rid: RecordId) {
        if let Some(rids) = self.tree.get_mut(key) {
            rids.remove(&rid);
            if rids.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    /// First record id stored under an exact key
    pub fn holder_of(&self, key: &IndexKey) -> Option<RecordId> {
        self.tree.get(key).and_then(|rids| rids.iter().next().copied())
    }

    pub fn contains_key(&self, key: &IndexKey) -> bool {
        self.tree.contains_key(key)
    }

    pub fn contains_rid(&self, rid: RecordId) -> bool {
        self.tree.values().any(|rids| rids.contains(&rid))
    }

    /// Collects the entries of a key range in key order.
    pub fn scan(&self, range: &KeyRange, direction: ScanDirection) -> Vec<IndexEntry> {
        let start = match &range.lower {
            Some(b) => Bound::Included(IndexKey::new(b.parts.clone())),
            None => Bound::Unbounded,
        };
        let expand = |(key, rids): (&IndexKey, &BTreeSet<RecordId>)| {
            let entries: Vec<IndexEntry> = rids
                .iter()
                .map(|rid| IndexEntry {
                    key: key.clone(),
                    rid: *rid,
                })
                .collect();
            entries
        };

        let candidates = self.tree.range((start, Bound::Unbounded));
        match direction {
            ScanDirection::Ascending => candidates
                .skip_while(|(k, _)| !range.above_lower(k))
                .take_while(|(k, _)| range.below_upper(k))
                .flat_map(expand)
                .collect(),
            ScanDirection::Descending => candidates
                .rev()
                .skip_while(|(k, _)| !range.below_upper(k))
                .take_while(|(k, _)| range.above_lower(k))
                .flat_map(|entry| {
                    let mut entries = expand(entry);
                    entries.reverse();
                    entries
                })
                .collect(),
        }
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    /// Number of (key, record id) entries
    pub fn entry_count(&self) -> usize {
        self.tree.values().map(BTreeSet::len).sum()
    }
}
