//! Result rows
//!
//! A [`QueryResult`] is either backed by a stored record or synthesized by
//! a step. Once handed to the caller only [`UpdatableResult`] accepts
//! writes, and only while the transaction it was read under is active.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value as Json};

use crate::database::DatabaseSession;
use crate::storage::{Record, RecordId};
use crate::value::{Properties, Value};

use super::errors::ExecResult;

/// Side-channel values attached to a row (per-row `LET` results, scores)
pub type RowMetadata = BTreeMap<String, Value>;

/// Canonical synthesized row: ordered properties plus optional identity
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultInternal {
    properties: Properties,
    metadata: RowMetadata,
    identity: Option<RecordId>,
    class_name: Option<String>,
    version: Option<u32>,
}

impl ResultInternal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_properties(properties: Properties) -> Self {
        Self {
            properties,
            ..Self::default()
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.set(name, value);
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    pub fn identity(&self) -> Option<RecordId> {
        self.identity
    }
}

/// A row backed by a stored record
#[derive(Debug, Clone, PartialEq)]
pub struct EntityResult {
    record: Record,
    metadata: RowMetadata,
}

impl EntityResult {
    pub fn record(&self) -> &Record {
        &self.record
    }
}

/// A record-backed row whose writes go through to storage
#[derive(Clone)]
pub struct UpdatableResult {
    record: Record,
    metadata: RowMetadata,
    session: DatabaseSession,
}

impl fmt::Debug for UpdatableResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatableResult")
            .field("record", &self.record)
            .finish()
    }
}

impl PartialEq for UpdatableResult {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record && self.metadata == other.metadata
    }
}

impl UpdatableResult {
    pub fn new(record: Record, session: DatabaseSession) -> Self {
        Self {
            record,
            metadata: RowMetadata::new(),
            session,
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Sets one field and writes the record back
    pub fn set_property(&mut self, name: &str, value: impl Into<Value>) -> ExecResult<()> {
        self.apply(vec![(name.to_string(), value.into())], &[])
    }

    /// Removes one field and writes the record back
    pub fn remove_property(&mut self, name: &str) -> ExecResult<()> {
        self.apply(Vec::new(), &[name.to_string()])
    }

    /// Applies several changes as a single write
    pub fn apply(&mut self, set: Vec<(String, Value)>, remove: &[String]) -> ExecResult<()> {
        self.session.ensure_active()?;
        let mut properties = self.record.properties.clone();
        for (name, value) in set {
            properties.set(name, value);
        }
        for name in remove {
            properties.remove(name);
        }
        self.record = self.session.update_record(self.record.rid, properties)?;
        Ok(())
    }
}

/// One row flowing through a plan
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Entity(EntityResult),
    /// Synthesized row handed to the caller
    Projection(ResultInternal),
    /// Mutable row used inside the pipeline
    Internal(ResultInternal),
    Updatable(UpdatableResult),
}

impl QueryResult {
    pub fn entity(record: Record) -> Self {
        QueryResult::Entity(EntityResult {
            record,
            metadata: RowMetadata::new(),
        })
    }

    pub fn updatable(record: Record, session: DatabaseSession) -> Self {
        QueryResult::Updatable(UpdatableResult::new(record, session))
    }

    pub fn projection(properties: Properties) -> Self {
        QueryResult::Projection(ResultInternal::from_properties(properties))
    }

    pub fn internal(properties: Properties) -> Self {
        QueryResult::Internal(ResultInternal::from_properties(properties))
    }

    fn record(&self) -> Option<&Record> {
        match self {
            QueryResult::Entity(e) => Some(&e.record),
            QueryResult::Updatable(u) => Some(&u.record),
            _ => None,
        }
    }

    pub fn is_entity(&self) -> bool {
        self.record().is_some()
    }

    pub fn properties(&self) -> &Properties {
        match self {
            QueryResult::Entity(e) => &e.record.properties,
            QueryResult::Updatable(u) => &u.record.properties,
            QueryResult::Projection(r) | QueryResult::Internal(r) => &r.properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties().get(name)
    }

    pub fn property_names(&self) -> Vec<String> {
        self.properties().names().map(str::to_string).collect()
    }

    pub fn identity(&self) -> Option<RecordId> {
        match self {
            QueryResult::Projection(r) | QueryResult::Internal(r) => r.identity,
            _ => self.record().map(|r| r.rid),
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            QueryResult::Projection(r) | QueryResult::Internal(r) => r.class_name.as_deref(),
            _ => self.record().map(|r| r.class_name.as_str()),
        }
    }

    pub fn version(&self) -> Option<u32> {
        match self {
            QueryResult::Projection(r) | QueryResult::Internal(r) => r.version,
            _ => self.record().map(|r| r.version),
        }
    }

    fn metadata_map(&self) -> &RowMetadata {
        match self {
            QueryResult::Entity(e) => &e.metadata,
            QueryResult::Updatable(u) => &u.metadata,
            QueryResult::Projection(r) | QueryResult::Internal(r) => &r.metadata,
        }
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata_map().get(key)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        let map = match self {
            QueryResult::Entity(e) => &mut e.metadata,
            QueryResult::Updatable(u) => &mut u.metadata,
            QueryResult::Projection(r) | QueryResult::Internal(r) => &mut r.metadata,
        };
        map.insert(key.into(), value);
    }

    /// Normalizes any row into the canonical internal form, keeping field
    /// values, identity and metadata exactly
    pub fn to_internal(&self) -> ResultInternal {
        match self {
            QueryResult::Projection(r) | QueryResult::Internal(r) => r.clone(),
            _ => {
                let metadata = self.metadata_map().clone();
                match self.record() {
                    Some(record) => ResultInternal {
                        properties: record.properties.clone(),
                        metadata,
                        identity: Some(record.rid),
                        class_name: Some(record.class_name.clone()),
                        version: Some(record.version),
                    },
                    None => ResultInternal::default(),
                }
            }
        }
    }

    pub fn into_internal(self) -> ResultInternal {
        match self {
            QueryResult::Projection(r) | QueryResult::Internal(r) => r,
            other => other.to_internal(),
        }
    }

    /// The row as a JSON object; record-backed rows carry `@rid`,
    /// `@class` and `@version`
    pub fn to_json(&self) -> Json {
        let mut obj = Map::new();
        if let Some(rid) = self.identity() {
            obj.insert("@rid".into(), Json::String(rid.to_string()));
        }
        if let Some(class) = self.class_name() {
            obj.insert("@class".into(), Json::String(class.to_string()));
        }
        if let Some(version) = self.version() {
            obj.insert("@version".into(), Json::from(version));
        }
        for (name, value) in self.properties().iter() {
            obj.insert(name.to_string(), value.to_json());
        }
        Json::Object(obj)
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(rid) = self.identity() {
            write!(f, "{} ", rid)?;
        }
        write!(f, "{}", self.properties())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn record() -> Record {
        Record {
            rid: RecordId::new(9, 0),
            class_name: "T".into(),
            version: 1,
            properties: [
                ("i", Value::Int(1)),
                ("l", Value::Long(2)),
                ("s", Value::Short(3)),
                ("f", Value::Float(1.5)),
                ("d", Value::Double(2.5)),
                ("dec", Value::Decimal(Decimal::new(314, 2))),
                ("str", Value::from("x")),
                ("b", Value::Boolean(true)),
                ("date", Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_to_internal_preserves_fields() {
        let mut row = QueryResult::entity(record());
        row.set_metadata("$score", Value::Int(4));
        let internal = row.to_internal();
        assert_eq!(internal.properties(), row.properties());
        assert_eq!(internal.identity(), Some(RecordId::new(9, 0)));
        let converted = QueryResult::Internal(internal);
        assert_eq!(converted.class_name(), Some("T"));
        assert_eq!(converted.metadata("$score"), Some(&Value::Int(4)));
        assert_eq!(converted.property("s"), Some(&Value::Short(3)));
    }

    #[test]
    fn test_to_json_for_entity() {
        let json = QueryResult::entity(record()).to_json();
        assert_eq!(json["@rid"], "#9:0");
        assert_eq!(json["@class"], "T");
        assert_eq!(json["i"], 1);
        assert_eq!(json["str"], "x");
    }

    #[test]
    fn test_updatable_requires_active_transaction() {
        let db = Database::new("t").unwrap();
        let session = db.session();
        session.create_class("T", Vec::new(), false).unwrap();
        let rec = session
            .create_record("T", None, [("a", Value::Int(1))].into_iter().collect())
            .unwrap();

        let mut row = UpdatableResult::new(rec.clone(), session.clone());
        row.set_property("a", Value::Int(2)).unwrap();
        let stored = session.fetch_record(rec.rid).unwrap().unwrap();
        assert_eq!(stored.get("a"), Some(&Value::Int(2)));
        assert_eq!(row.record().version, stored.version);

        session.close();
        assert!(row.set_property("a", Value::Int(3)).is_err());
    }
}
