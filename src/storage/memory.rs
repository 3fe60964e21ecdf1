//! In-memory record storage

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::value::Properties;

use super::errors::{StorageError, StorageResult};
use super::record::{Record, RecordId};
use super::{ClusterInfo, RecordCursor, RecordStore, ScanDirection};

#[derive(Debug, Default)]
struct Cluster {
    name: String,
    records: BTreeMap<u64, Record>,
    next_position: u64,
}

#[derive(Debug, Default)]
struct Inner {
    clusters: BTreeMap<u32, Cluster>,
    next_cluster_id: u32,
}

/// Record store keeping every cluster in a `BTreeMap`
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| StorageError::LockPoisoned)
    }
}

/// Cursor over a snapshot of positions; records are loaded one at a time
struct SnapshotCursor {
    inner: Arc<RwLock<Inner>>,
    cluster: u32,
    positions: std::vec::IntoIter<u64>,
}

impl Iterator for SnapshotCursor {
    type Item = StorageResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let position = self.positions.next()?;
            let guard = match self.inner.read() {
                Ok(guard) => guard,
                Err(_) => return Some(Err(StorageError::LockPoisoned)),
            };
            let record = guard
                .clusters
                .get(&self.cluster)
                .and_then(|c| c.records.get(&position))
                .cloned();
            if let Some(record) = record {
                return Some(Ok(record));
            }
        }
    }
}

impl RecordStore for MemoryStorage {
    fn scan_cluster(&self, cluster: u32, direction: ScanDirection) -> StorageResult<RecordCursor> {
        let guard = self.read()?;
        let c = guard
            .clusters
            .get(&cluster)
            .ok_or_else(|| StorageError::ClusterNotFound(cluster.to_string()))?;
        let mut positions: Vec<u64> = c.records.keys().copied().collect();
        if direction == ScanDirection::Descending {
            positions.reverse();
        }
        Ok(Box::new(SnapshotCursor {
            inner: Arc::clone(&self.inner),
            cluster,
            positions: positions.into_iter(),
        }))
    }

    fn fetch_by_rid(&self, rid: RecordId) -> StorageResult<Option<Record>> {
        let guard = self.read()?;
        Ok(guard
            .clusters
            .get(&rid.cluster)
            .and_then(|c| c.records.get(&rid.position))
            .cloned())
    }

    fn count_cluster(&self, cluster: u32) -> StorageResult<u64> {
        let guard = self.read()?;
        guard
            .clusters
            .get(&cluster)
            .map(|c| c.records.len() as u64)
            .ok_or_else(|| StorageError::ClusterNotFound(cluster.to_string()))
    }

    fn clusters(&self) -> StorageResult<Vec<ClusterInfo>> {
        let guard = self.read()?;
        Ok(guard
            .clusters
            .iter()
            .map(|(id, c)| ClusterInfo {
                id: *id,
                name: c.name.clone(),
                records: c.records.len() as u64,
            })
            .collect())
    }

    fn cluster_id(&self, name: &str) -> StorageResult<Option<u32>> {
        let guard = self.read()?;
        Ok(guard
            .clusters
            .iter()
            .find(|(_, c)| c.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id))
    }

    fn create_cluster(&self, name: &str, id: Option<u32>) -> StorageResult<u32> {
        let mut guard = self.write()?;
        if guard
            .clusters
            .values()
            .any(|c| c.name.eq_ignore_ascii_case(name))
        {
            return Err(StorageError::ClusterExists(name.to_string()));
        }
        let id = match id {
            Some(id) if guard.clusters.contains_key(&id) => {
                return Err(StorageError::ClusterExists(id.to_string()))
            }
            Some(id) => id,
            None => guard.next_cluster_id,
        };
        guard.next_cluster_id = guard.next_cluster_id.max(id + 1);
        guard.clusters.insert(
            id,
            Cluster {
                name: name.to_string(),
                ..Cluster::default()
            },
        );
        Ok(id)
    }

    fn drop_cluster(&self, cluster: u32) -> StorageResult<()> {
        let mut guard = self.write()?;
        guard
            .clusters
            .remove(&cluster)
            .map(|_| ())
            .ok_or_else(|| StorageError::ClusterNotFound(cluster.to_string()))
    }

    fn insert(&self, cluster: u32, class_name: &str, properties: Properties) -> StorageResult<Record> {
        let mut guard = self.write()?;
        let c = guard
            .clusters
            .get_mut(&cluster)
            .ok_or_else(|| StorageError::ClusterNotFound(cluster.to_string()))?;
        let position = c.next_position;
        c.next_position += 1;
        let record = Record {
            rid: RecordId::new(cluster, position),
            class_name: class_name.to_string(),
            version: 1,
            properties,
        };
        c.records.insert(position, record.clone());
        Ok(record)
    }

    fn update(&self, rid: RecordId, properties: Properties) -> StorageResult<Record> {
        let mut guard = self.write()?;
        let record = guard
            .clusters
            .get_mut(&rid.cluster)
            .and_then(|c| c.records.get_mut(&rid.position))
            .ok_or(StorageError::RecordNotFound(rid))?;
        record.properties = properties;
        record.version += 1;
        Ok(record.clone())
    }

    fn delete(&self, rid: RecordId) -> StorageResult<bool> {
        let mut guard = self.write()?;
        Ok(guard
            .clusters
            .get_mut(&rid.cluster)
            .map(|c| c.records.remove(&rid.position).is_some())
            .unwrap_or(false))
    }
}
