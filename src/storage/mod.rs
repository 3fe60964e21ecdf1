//! Record storage adapter
//!
//! The execution engine reads and writes records only through the
//! [`RecordStore`] trait. [`MemoryStorage`] is the in-process
//! implementation used by [`Database`](crate::database::Database) and tests.
//!
//! # Cursor semantics
//!
//! `scan_cluster` snapshots the record positions present when the scan
//! starts and loads each record lazily. Records deleted during the scan are
//! skipped; records inserted during the scan are not visited.

mod errors;
mod memory;
mod record;

pub use errors::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use record::{ParseRecordIdError, Record, RecordId};

use serde::{Deserialize, Serialize};

use crate::value::Properties;

/// Physical iteration order of a cluster scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanDirection {
    #[default]
    Ascending,
    Descending,
}

/// Summary of a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub id: u32,
    pub name: String,
    pub records: u64,
}

/// Lazily evaluated sequence of records
pub type RecordCursor = Box<dyn Iterator<Item = StorageResult<Record>> + Send>;

/// Narrow record-access contract consumed by the executor
pub trait RecordStore: Send + Sync {
    /// Iterates all live records of a cluster in physical order
    fn scan_cluster(&self, cluster: u32, direction: ScanDirection) -> StorageResult<RecordCursor>;

    /// Loads one record; `Ok(None)` when it does not exist
    fn fetch_by_rid(&self, rid: RecordId) -> StorageResult<Option<Record>>;

    fn count_cluster(&self, cluster: u32) -> StorageResult<u64>;

    /// Counts the records of a class given its cluster set
    fn count_class(&self, clusters: &[u32]) -> StorageResult<u64> {
        clusters
            .iter()
            .try_fold(0u64, |acc, id| Ok(acc + self.count_cluster(*id)?))
    }

    fn clusters(&self) -> StorageResult<Vec<ClusterInfo>>;

    fn cluster_id(&self, name: &str) -> StorageResult<Option<u32>>;

    /// Creates a cluster, optionally with a fixed id
    fn create_cluster(&self, name: &str, id: Option<u32>) -> StorageResult<u32>;

    fn drop_cluster(&self, cluster: u32) -> StorageResult<()>;

    fn insert(&self, cluster: u32, class_name: &str, properties: Properties) -> StorageResult<Record>;

    /// Replaces the properties of a record and bumps its version
    fn update(&self, rid: RecordId, properties: Properties) -> StorageResult<Record>;

    /// Deletes a record; returns false when it did not exist
    fn delete(&self, rid: RecordId) -> StorageResult<bool>;
}
