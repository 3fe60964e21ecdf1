//! Schema catalog adapter
//!
//! Classes form an inheritance graph (multiple superclasses allowed). Each
//! class is backed by one or more clusters; a polymorphic class scan covers
//! the clusters of the class and all of its subclasses.
//!
//! Class and property names are case-insensitive.

mod errors;
mod memory;
mod types;
mod validator;

pub use errors::{SchemaError, SchemaResult};
pub use memory::MemorySchema;
pub use types::{ClassDef, PropertyDef, PropertyType};
pub use validator::RecordValidator;

use std::collections::BTreeSet;

/// Base class of all vertex classes
pub const VERTEX_CLASS: &str = "V";

/// Base class of all edge classes
pub const EDGE_CLASS: &str = "E";

/// Read and DDL access to class metadata
pub trait SchemaCatalog: Send + Sync {
    fn get_class(&self, name: &str) -> SchemaResult<Option<ClassDef>>;

    fn classes(&self) -> SchemaResult<Vec<ClassDef>>;

    fn create_class(&self, class: ClassDef) -> SchemaResult<()>;

    fn drop_class(&self, name: &str) -> SchemaResult<()>;

    fn create_property(&self, class: &str, property: PropertyDef) -> SchemaResult<()>;

    fn drop_property(&self, class: &str, property: &str) -> SchemaResult<()>;

    /// Attaches an additional cluster to a class
    fn add_cluster(&self, class: &str, cluster: u32) -> SchemaResult<()>;

    /// Class lookup that fails when the class is missing
    fn require_class(&self, name: &str) -> SchemaResult<ClassDef> {
        self.get_class(name)?
            .ok_or_else(|| SchemaError::ClassNotFound(name.to_string()))
    }

    /// True when `class` equals `parent` or inherits from it
    fn is_subclass_of(&self, class: &str, parent: &str) -> SchemaResult<bool> {
        let mut pending = vec![class.to_string()];
        let mut seen = BTreeSet::new();
        while let Some(name) = pending.pop() {
            if name.eq_ignore_ascii_case(parent) {
                return Ok(true);
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                continue;
            }
            if let Some(def) = self.get_class(&name)? {
                pending.extend(def.superclasses.iter().cloned());
            }
        }
        Ok(false)
    }

    /// Own and inherited properties; own definitions shadow inherited ones
    fn get_properties(&self, class: &str) -> SchemaResult<Vec<PropertyDef>> {
        let mut result: Vec<PropertyDef> = Vec::new();
        let mut pending = vec![class.to_string()];
        let mut seen = BTreeSet::new();
        while let Some(name) = pending.pop() {
            if !seen.insert(name.to_ascii_lowercase()) {
                continue;
            }
            let def = self.require_class(&name)?;
            for prop in def.properties {
                if !result.iter().any(|p| p.name.eq_ignore_ascii_case(&prop.name)) {
                    result.push(prop);
                }
            }
            pending.extend(def.superclasses.into_iter().rev());
        }
        Ok(result)
    }

    fn property(&self, class: &str, name: &str) -> SchemaResult<Option<PropertyDef>> {
        Ok(self
            .get_properties(class)?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name)))
    }

    /// Direct subclasses, ordered by name
    fn subclasses(&self, class: &str) -> SchemaResult<Vec<ClassDef>> {
        let mut subs: Vec<ClassDef> = self
            .classes()?
            .into_iter()
            .filter(|c| c.superclasses.iter().any(|s| s.eq_ignore_ascii_case(class)))
            .collect();
        subs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subs)
    }

    /// Clusters of the class and all its subclasses, ascending
    fn polymorphic_cluster_ids(&self, class: &str) -> SchemaResult<Vec<u32>> {
        let mut ids = BTreeSet::new();
        for def in self.classes()? {
            if self.is_subclass_of(&def.name, class)? {
                ids.extend(def.cluster_ids.iter().copied());
            }
        }
        Ok(ids.into_iter().collect())
    }

    /// Class owning a cluster, if any
    fn class_of_cluster(&self, cluster: u32) -> SchemaResult<Option<ClassDef>> {
        Ok(self
            .classes()?
            .into_iter()
            .find(|c| c.cluster_ids.contains(&cluster)))
    }
}
