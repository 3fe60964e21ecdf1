//! Record identity and stored records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::{Properties, Value};

/// Physical identity of a record: cluster id plus position in the cluster.
///
/// Ordering is by cluster, then position, which is also the physical scan
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub cluster: u32,
    pub position: u64,
}

impl RecordId {
    pub fn new(cluster: u32, position: u64) -> Self {
        Self { cluster, position }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster, self.position)
    }
}

/// Error returned when parsing a `#cluster:position` literal fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRecordIdError(String);

impl fmt::Display for ParseRecordIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid record id '{}'", self.0)
    }
}

impl std::error::Error for ParseRecordIdError {}

impl FromStr for RecordId {
    type Err = ParseRecordIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRecordIdError(s.to_string());
        let body = s.trim().strip_prefix('#').unwrap_or(s.trim());
        let (cluster, position) = body.split_once(':').ok_or_else(err)?;
        Ok(RecordId {
            cluster: cluster.parse().map_err(|_| err())?,
            position: position.parse().map_err(|_| err())?,
        })
    }
}

/// A stored record: identity, owning class, version and field values
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub rid: RecordId,
    pub class_name: String,
    pub version: u32,
    pub properties: Properties,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let rid: RecordId = "#12:7".parse().unwrap();
        assert_eq!(rid, RecordId::new(12, 7));
        assert_eq!(rid.to_string(), "#12:7");
        assert_eq!("3:4".parse::<RecordId>().unwrap(), RecordId::new(3, 4));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("#12".parse::<RecordId>().is_err());
        assert!("#a:b".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_physical_order() {
        assert!(RecordId::new(1, 9) < RecordId::new(2, 0));
        assert!(RecordId::new(2, 0) < RecordId::new(2, 1));
    }
}
