//! `metadata:*` targets
//!
//! Each target produces a single row describing one part of the database,
//! with nested entries as embedded values.

use crate::planner::MetadataTarget;
use crate::schema::{ClassDef, PropertyDef};
use crate::index::IndexDefinition;
use crate::storage::ClusterInfo;
use crate::value::{Properties, Value};

use crate::executor::context::ExecutionContext;
use crate::executor::errors::ExecResult;
use crate::executor::result::QueryResult;
use crate::executor::stream::ExecutionStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchFromMetadataStep {
    pub target: MetadataTarget,
}

fn strings(items: &[String]) -> Value {
    Value::List(items.iter().map(|s| Value::from(s.as_str())).collect())
}

fn property_value(p: &PropertyDef) -> Value {
    let mut props = Properties::new();
    props.set("name", p.name.as_str());
    props.set("type", p.property_type.name());
    props.set("mandatory", p.mandatory);
    props.set("notNull", p.not_null);
    if let Some(linked) = &p.linked_class {
        props.set("linkedClass", linked.as_str());
    }
    Value::Embedded(props)
}

fn class_value(c: &ClassDef) -> Value {
    let mut props = Properties::new();
    props.set("name", c.name.as_str());
    props.set("superClasses", strings(&c.superclasses));
    props.set("abstract", c.is_abstract);
    props.set(
        "clusterIds",
        Value::List(c.cluster_ids.iter().map(|id| Value::Int(*id as i32)).collect()),
    );
    props.set("properties", Value::List(c.properties.iter().map(property_value).collect()));
    Value::Embedded(props)
}

fn index_value(def: &IndexDefinition, size: u64) -> Value {
    let mut props = Properties::new();
    props.set("name", def.name.as_str());
    props.set("type", def.index_type.name());
    props.set("className", def.class_name.as_str());
    props.set("fields", strings(&def.fields));
    props.set("size", Value::Long(size as i64));
    Value::Embedded(props)
}

fn cluster_value(c: &ClusterInfo) -> Value {
    let mut props = Properties::new();
    props.set("id", Value::Int(c.id as i32));
    props.set("name", c.name.as_str());
    props.set("records", Value::Long(c.records as i64));
    Value::Embedded(props)
}

impl FetchFromMetadataStep {
    fn describe(&self, ctx: &ExecutionContext) -> ExecResult<Properties> {
        let session = ctx.session();
        let mut row = Properties::new();
        match self.target {
            MetadataTarget::Schema => {
                let mut classes = session.schema().classes()?;
                classes.sort_by(|a, b| a.name.cmp(&b.name));
                row.set("classes", Value::List(classes.iter().map(class_value).collect()));
            }
            MetadataTarget::IndexManager => {
                let mut indexes = Vec::new();
                for def in session.indexes().indexes()? {
                    let size = session.indexes().size(&def.name)?;
                    indexes.push(index_value(&def, size));
                }
                row.set("indexes", Value::List(indexes));
            }
            MetadataTarget::Database => {
                row.set("name", session.name());
                row.set("classes", Value::Long(session.schema().classes()?.len() as i64));
                row.set("indexes", Value::Long(session.indexes().indexes()?.len() as i64));
                let sequences: Vec<String> = session.metadata().sequences()?.into_iter().map(|s| s.name).collect();
                row.set("sequences", strings(&sequences));
            }
            MetadataTarget::Storage => {
                row.set("name", session.name());
                let clusters = session.storage().clusters()?;
                row.set("clusters", Value::List(clusters.iter().map(cluster_value).collect()));
            }
        }
        Ok(row)
    }

    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        Ok(ExecutionStream::singleton(QueryResult::projection(self.describe(ctx)?)))
    }

    pub fn details(&self) -> String {
        format!("metadata:{}", self.target.as_str())
    }
}
