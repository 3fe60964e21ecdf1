//! In-memory database facade
//!
//! A [`Database`] owns the in-memory storage, schema catalog, index
//! manager and metadata store. Statements run against a
//! [`DatabaseSession`], which bundles those adapters with a transaction
//! handle.
//!
//! Every database starts with the graph base classes `V` and `E`.

mod errors;
mod fixture;
mod metadata;
mod session;
mod transaction;

pub use errors::{DatabaseError, DatabaseResult};
pub use fixture::Fixture;
pub use metadata::{
    MetadataError, MetadataResult, MetadataStore, SecurityPolicy, SequenceDef, SequenceType,
    UserDef,
};
pub use session::DatabaseSession;
pub use transaction::Transaction;

use std::sync::Arc;

use crate::index::MemoryIndexManager;
use crate::schema::{MemorySchema, EDGE_CLASS, VERTEX_CLASS};
use crate::storage::MemoryStorage;

/// An embedded database held entirely in memory
#[derive(Debug, Clone)]
pub struct Database {
    name: String,
    storage: MemoryStorage,
    schema: MemorySchema,
    indexes: MemoryIndexManager,
    metadata: Arc<MetadataStore>,
}

impl Database {
    /// Creates an empty database containing only `V` and `E`
    pub fn new(name: impl Into<String>) -> DatabaseResult<Self> {
        let db = Self {
            name: name.into(),
            storage: MemoryStorage::new(),
            schema: MemorySchema::new(),
            indexes: MemoryIndexManager::new(),
            metadata: Arc::new(MetadataStore::new()),
        };
        let session = db.session();
        session.create_class(VERTEX_CLASS, Vec::new(), false)?;
        session.create_class(EDGE_CLASS, Vec::new(), false)?;
        Ok(db)
    }

    /// Creates a database and loads a JSON fixture into it
    pub fn from_fixture(name: impl Into<String>, fixture: &Fixture) -> DatabaseResult<Self> {
        let db = Self::new(name)?;
        fixture.apply(&db.session())?;
        Ok(db)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens a session with a fresh active transaction
    pub fn session(&self) -> DatabaseSession {
        DatabaseSession::new(
            &self.name,
            Arc::new(self.storage.clone()),
            Arc::new(self.schema.clone()),
            Arc::new(self.indexes.clone()),
            Arc::clone(&self.metadata),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexCatalog, IndexDefinition, IndexType};
    use crate::schema::{PropertyDef, PropertyType, SchemaCatalog};
    use crate::storage::RecordStore;
    use crate::value::{Properties, Value};

    fn person(name: &str, age: i32) -> Properties {
        [("name", Value::from(name)), ("age", Value::Int(age))]
            .into_iter()
            .collect()
    }

    fn db_with_person() -> (Database, DatabaseSession) {
        let db = Database::new("test").unwrap();
        let session = db.session();
        session.create_class("Person", vec!["V".into()], false).unwrap();
        session
            .create_property("Person", PropertyDef::new("age", PropertyType::Integer))
            .unwrap();
        (db, session)
    }

    #[test]
    fn test_bootstrap_classes() {
        let db = Database::new("test").unwrap();
        let session = db.session();
        assert!(session.schema().get_class("V").unwrap().is_some());
        assert!(session.schema().get_class("E").unwrap().is_some());
    }

    #[test]
    fn test_create_record_maintains_index() {
        let (_db, session) = db_with_person();
        session
            .create_index(
                IndexDefinition::new("Person.age", "Person", vec!["age".into()], IndexType::NotUnique)
                    .with_key_types(vec![PropertyType::Integer]),
            )
            .unwrap();
        let rec = session.create_record("Person", None, person("a", 30)).unwrap();
        assert!(session.indexes().contains_key("Person.age", &[Value::Int(30)]).unwrap());

        session.update_record(rec.rid, person("a", 31)).unwrap();
        assert!(!session.indexes().contains_key("Person.age", &[Value::Int(30)]).unwrap());
        assert!(session.indexes().contains_key("Person.age", &[Value::Int(31)]).unwrap());

        session.delete_record(rec.rid).unwrap();
        assert_eq!(session.indexes().size("Person.age").unwrap(), 0);
    }

    #[test]
    fn test_unique_violation_leaves_storage_untouched() {
        let (_db, session) = db_with_person();
        session
            .create_index(IndexDefinition::new("Person.name", "Person", vec!["name".into()], IndexType::Unique))
            .unwrap();
        session.create_record("Person", None, person("a", 1)).unwrap();
        let err = session.create_record("Person", None, person("a", 2)).unwrap_err();
        assert!(matches!(err, DatabaseError::Index(_)));

        let class = session.schema().require_class("Person").unwrap();
        assert_eq!(session.storage().count_class(&class.cluster_ids).unwrap(), 1);
    }

    #[test]
    fn test_failed_index_build_is_rolled_back() {
        let (_db, session) = db_with_person();
        session.create_record("Person", None, person("a", 1)).unwrap();
        session.create_record("Person", None, person("a", 2)).unwrap();
        let result = session.create_index(IndexDefinition::new(
            "Person.name",
            "Person",
            vec!["name".into()],
            IndexType::Unique,
        ));
        assert!(result.is_err());
        assert!(session.indexes().get_index("Person.name").unwrap().is_none());
    }

    #[test]
    fn test_writes_require_active_transaction() {
        let (_db, session) = db_with_person();
        session.close();
        assert_eq!(
            session.create_record("Person", None, person("a", 1)),
            Err(DatabaseError::TransactionInactive)
        );
    }

    #[test]
    fn test_inherited_indexes_listed_after_own() {
        let (_db, session) = db_with_person();
        session.create_class("Student", vec!["Person".into()], false).unwrap();
        session
            .create_index(IndexDefinition::new("Person.age", "Person", vec!["age".into()], IndexType::NotUnique))
            .unwrap();
        session
            .create_index(IndexDefinition::new("Student.name", "Student", vec!["name".into()], IndexType::NotUnique))
            .unwrap();
        let names: Vec<String> = session
            .indexes_on("Student")
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["Student.name".to_string(), "Person.age".to_string()]);
    }

    #[test]
    fn test_fixture_load() {
        let fixture = Fixture::from_json(
            r#"{
                "classes": [{"name": "T", "properties": [{"name": "n", "type": "LONG"}]}],
                "records": [{"class": "T", "properties": {"n": 1}}, {"class": "T", "properties": {"n": 2}}],
                "indexes": [{"name": "T.n", "class": "T", "fields": ["n"], "type": "UNIQUE"}]
            }"#,
        )
        .unwrap();
        let db = Database::from_fixture("f", &fixture).unwrap();
        let session = db.session();
        assert_eq!(session.indexes().size("T.n").unwrap(), 2);
        assert!(session.indexes().contains_key("T.n", &[Value::Long(2)]).unwrap());
    }
}
