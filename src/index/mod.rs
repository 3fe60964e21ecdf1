//! Index catalog adapter
//!
//! Indexes map composite keys to record ids. Ordered indexes
//! (`UNIQUE`, `NOTUNIQUE`) support prefix and range scans; hash indexes
//! (`*_HASH_INDEX`) answer full-key equality lookups only.
//!
//! An index declared on a class covers the records of that class and all
//! of its subclasses.

mod definition;
mod errors;
mod key;
mod manager;
mod tree;

pub use definition::{IndexDefinition, IndexType, MapIndexBy};
pub use errors::{IndexError, IndexResult};
pub use key::IndexKey;
pub use manager::MemoryIndexManager;
pub use tree::{IndexEntry, IndexTree, KeyBound, KeyRange};

use crate::storage::{RecordId, ScanDirection};
use crate::value::Value;

/// Lazily consumed sequence of index entries
pub type IndexCursor = Box<dyn Iterator<Item = IndexEntry> + Send>;

/// Index metadata and lookup contract consumed by the planner and executor
pub trait IndexCatalog: Send + Sync {
    fn indexes(&self) -> IndexResult<Vec<IndexDefinition>>;

    fn get_index(&self, name: &str) -> IndexResult<Option<IndexDefinition>>;

    /// Iterates the keys within `range`.
    ///
    /// Fails with [`IndexError::RangeNotSupported`] on hash indexes unless
    /// the range is unbounded.
    fn range_scan(
        &self,
        name: &str,
        range: &KeyRange,
        direction: ScanDirection,
    ) -> IndexResult<IndexCursor>;

    /// Iterates the entries whose key equals or starts with `key`
    fn equality_scan(&self, name: &str, key: &[Value]) -> IndexResult<IndexCursor>;

    fn contains_key(&self, name: &str, key: &[Value]) -> IndexResult<bool>;

    fn contains_value(&self, name: &str, rid: RecordId) -> IndexResult<bool>;

    /// Number of entries
    fn size(&self, name: &str) -> IndexResult<u64>;

    /// Number of entries whose key equals `key`
    fn count_key(&self, name: &str, key: &[Value]) -> IndexResult<u64> {
        Ok(self.equality_scan(name, key)?.count() as u64)
    }

    fn create_index(&self, definition: IndexDefinition) -> IndexResult<()>;

    fn drop_index(&self, name: &str) -> IndexResult<()>;

    /// Adds an entry, enforcing uniqueness
    fn put(&self, name: &str, key: Vec<Value>, rid: RecordId) -> IndexResult<()>;

    fn remove(&self, name: &str, key: &[Value], rid: RecordId) -> IndexResult<()>;

    /// Record currently holding `key` in a unique index
    fn holder_of(&self, name: &str, key: &[Value]) -> IndexResult<Option<RecordId>>;

    fn clear(&self, name: &str) -> IndexResult<()>;

    /// Indexes declared on exactly this class
    fn indexes_on_class(&self, class: &str) -> IndexResult<Vec<IndexDefinition>> {
        Ok(self
            .indexes()?
            .into_iter()
            .filter(|d| d.class_name.eq_ignore_ascii_case(class))
            .collect())
    }
}
