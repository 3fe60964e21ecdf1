//! JSON fixtures for seeding a database

use serde::Deserialize;
use serde_json::Value as Json;

use crate::index::{IndexDefinition, IndexType, MapIndexBy};
use crate::schema::{PropertyDef, SchemaCatalog};
use crate::value::{Properties, Value};

use super::errors::{DatabaseError, DatabaseResult};
use super::metadata::SequenceDef;
use super::session::DatabaseSession;

#[derive(Debug, Deserialize)]
pub(crate) struct ClassFixture {
    name: String,
    #[serde(default)]
    superclasses: Vec<String>,
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    #[serde(default)]
    properties: Vec<PropertyDef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IndexFixture {
    name: String,
    class: String,
    fields: Vec<String>,
    #[serde(rename = "type")]
    index_type: IndexType,
    #[serde(default)]
    by: Option<MapIndexBy>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordFixture {
    class: String,
    #[serde(default)]
    properties: serde_json::Map<String, Json>,
}

/// Schema, indexes and records to load into a fresh database
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    classes: Vec<ClassFixture>,
    #[serde(default)]
    indexes: Vec<IndexFixture>,
    #[serde(default)]
    records: Vec<RecordFixture>,
    #[serde(default)]
    sequences: Vec<SequenceDef>,
}

impl Fixture {
    pub fn from_json(json: &str) -> DatabaseResult<Self> {
        serde_json::from_str(json).map_err(|e| DatabaseError::Fixture(e.to_string()))
    }

    /// Applies the fixture: classes, then records, then indexes
    pub fn apply(&self, session: &DatabaseSession) -> DatabaseResult<()> {
        for class in &self.classes {
            session.create_class(&class.name, class.superclasses.clone(), class.is_abstract)?;
            for prop in &class.properties {
                session.create_property(&class.name, prop.clone())?;
            }
        }
        for record in &self.records {
            let properties: Properties = record
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect();
            session.create_record(&record.class, None, properties)?;
        }
        for index in &self.indexes {
            let mut key_types = Vec::with_capacity(index.fields.len());
            for field in &index.fields {
                let prop = session
                    .schema()
                    .property(&index.class, field)?
                    .ok_or_else(|| {
                        DatabaseError::Fixture(format!(
                            "index '{}' references undeclared property '{}'",
                            index.name, field
                        ))
                    })?;
                key_types.push(prop.property_type);
            }
            let mut def = IndexDefinition::new(
                index.name.clone(),
                index.class.clone(),
                index.fields.clone(),
                index.index_type,
            )
            .with_key_types(key_types);
            def.map_by = index.by;
            session.create_index(def)?;
        }
        for seq in &self.sequences {
            session.metadata().create_sequence(seq.clone())?;
        }
        Ok(())
    }
}
