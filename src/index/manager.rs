//! In-memory index manager
//!
//! # API
//!
//! - `create_index(def)` / `drop_index(name)` - Maintain the catalog
//! - `put(name, key, rid)` / `remove(name, key, rid)` - Apply writes
//! - `range_scan(name, range, direction)` - Ordered iteration
//! - `equality_scan(name, key)` - Exact or prefix lookup

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::storage::{RecordId, ScanDirection};
use crate::value::Value;

use super::definition::IndexDefinition;
use super::errors::{IndexError, IndexResult};
use super::key::IndexKey;
use super::tree::{IndexTree, KeyRange};
use super::{IndexCatalog, IndexCursor};

#[derive(Debug)]
struct Slot {
    definition: IndexDefinition,
    tree: IndexTree,
}

/// Index catalog holding every index tree in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryIndexManager {
    indexes: Arc<RwLock<BTreeMap<String, Slot>>>,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl MemoryIndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> IndexResult<RwLockReadGuard<'_, BTreeMap<String, Slot>>> {
        self.indexes.read().map_err(|_| IndexError::LockPoisoned)
    }

    fn write(&self) -> IndexResult<RwLockWriteGuard<'_, BTreeMap<String, Slot>>> {
        self.indexes.write().map_err(|_| IndexError::LockPoisoned)
    }

    fn with_slot<T>(&self, name: &str, f: impl FnOnce(&Slot) -> IndexResult<T>) -> IndexResult<T> {
        let guard = self.read()?;
        let slot = guard
            .get(&key(name))
            .ok_or_else(|| IndexError::NotFound(name.to_string()))?;
        f(slot)
    }

    fn with_slot_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Slot) -> IndexResult<T>,
    ) -> IndexResult<T> {
        let mut guard = self.write()?;
        let slot = guard
            .get_mut(&key(name))
            .ok_or_else(|| IndexError::NotFound(name.to_string()))?;
        f(slot)
    }
}

impl IndexCatalog for MemoryIndexManager {
    fn indexes(&self) -> IndexResult<Vec<IndexDefinition>> {
        Ok(self.read()?.values().map(|s| s.definition.clone()).collect())
    }

    fn get_index(&self, name: &str) -> IndexResult<Option<IndexDefinition>> {
        Ok(self.read()?.get(&key(name)).map(|s| s.definition.clone()))
    }

    fn range_scan(
        &self,
        name: &str,
        range: &KeyRange,
        direction: ScanDirection,
    ) -> IndexResult<IndexCursor> {
        self.with_slot(name, |slot| {
            let bounded = range.lower.is_some() || range.upper.is_some();
            if bounded && !slot.definition.index_type.supports_range() {
                return Err(IndexError::RangeNotSupported(name.to_string()));
            }
            let entries = slot.tree.scan(range, direction);
            Ok(Box::new(entries.into_iter()) as IndexCursor)
        })
    }

    fn equality_scan(&self, name: &str, key_parts: &[Value]) -> IndexResult<IndexCursor> {
        self.with_slot(name, |slot| {
            let def = &slot.definition;
            if def.index_type.is_hash() && key_parts.len() != def.fields.len() {
                return Err(IndexError::PartialHashKey {
                    index: def.name.clone(),
                    expected: def.fields.len(),
                    actual: key_parts.len(),
                });
            }
            let entries = slot
                .tree
                .scan(&KeyRange::prefix(key_parts.to_vec()), ScanDirection::Ascending);
            Ok(Box::new(entries.into_iter()) as IndexCursor)
        })
    }

    fn contains_key(&self, name: &str, key_parts: &[Value]) -> IndexResult<bool> {
        self.with_slot(name, |slot| {
            Ok(slot.tree.contains_key(&IndexKey::new(key_parts.to_vec())))
        })
    }

    fn contains_value(&self, name: &str, rid: RecordId) -> IndexResult<bool> {
        self.with_slot(name, |slot| Ok(slot.tree.contains_rid(rid)))
    }

    fn size(&self, name: &str) -> IndexResult<u64> {
        self.with_slot(name, |slot| Ok(slot.tree.entry_count() as u64))
    }

    fn create_index(&self, definition: IndexDefinition) -> IndexResult<()> {
        let mut guard = self.write()?;
        if guard.contains_key(&key(&definition.name)) {
            return Err(IndexError::Exists(definition.name));
        }
        guard.insert(
            key(&definition.name),
            Slot {
                definition,
                tree: IndexTree::new(),
            },
        );
        Ok(())
    }

    fn drop_index(&self, name: &str) -> IndexResult<()> {
        self.write()?
            .remove(&key(name))
            .map(|_| ())
            .ok_or_else(|| IndexError::NotFound(name.to_string()))
    }

    fn put(&self, name: &str, key_parts: Vec<Value>, rid: RecordId) -> IndexResult<()> {
        self.with_slot_mut(name, |slot| {
            let index_key = IndexKey::new(key_parts);
            let has_null = index_key.parts().iter().any(Value::is_null);
            if slot.definition.index_type.is_unique() && !has_null {
                if let Some(existing) = slot.tree.holder_of(&index_key) {
                    if existing != rid {
                        return Err(IndexError::DuplicateKey {
                            index: slot.definition.name.clone(),
                            key: index_key.to_string(),
                            existing,
                        });
                    }
                }
            }
            slot.tree.insert(index_key, rid);
            Ok(())
        })
    }

    fn remove(&self, name: &str, key_parts: &[Value], rid: RecordId) -> IndexResult<()> {
        self.with_slot_mut(name, |slot| {
            slot.tree.remove(&IndexKey::new(key_parts.to_vec()), rid);
            Ok(())
        })
    }

    fn holder_of(&self, name: &str, key_parts: &[Value]) -> IndexResult<Option<RecordId>> {
        self.with_slot(name, |slot| {
            Ok(slot.tree.holder_of(&IndexKey::new(key_parts.to_vec())))
        })
    }

    fn clear(&self, name: &str) -> IndexResult<()> {
        self.with_slot_mut(name, |slot| {
            slot.tree.clear();
            Ok(())
        })
    }
}
