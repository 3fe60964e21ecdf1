//! In-memory schema catalog

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::errors::{SchemaError, SchemaResult};
use super::types::{ClassDef, PropertyDef};
use super::SchemaCatalog;

/// Schema catalog keyed by lower-cased class name
#[derive(Debug, Clone, Default)]
pub struct MemorySchema {
    classes: Arc<RwLock<BTreeMap<String, ClassDef>>>,
}

impl MemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> SchemaResult<RwLockReadGuard<'_, BTreeMap<String, ClassDef>>> {
        self.classes.read().map_err(|_| SchemaError::LockPoisoned)
    }

    fn write(&self) -> SchemaResult<RwLockWriteGuard<'_, BTreeMap<String, ClassDef>>> {
        self.classes.write().map_err(|_| SchemaError::LockPoisoned)
    }
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl SchemaCatalog for MemorySchema {
    fn get_class(&self, name: &str) -> SchemaResult<Option<ClassDef>> {
        Ok(self.read()?.get(&key(name)).cloned())
    }

    fn classes(&self) -> SchemaResult<Vec<ClassDef>> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn create_class(&self, class: ClassDef) -> SchemaResult<()> {
        let mut guard = self.write()?;
        if guard.contains_key(&key(&class.name)) {
            return Err(SchemaError::ClassExists(class.name));
        }
        for sup in &class.superclasses {
            if !guard.contains_key(&key(sup)) {
                return Err(SchemaError::ClassNotFound(sup.clone()));
            }
        }
        guard.insert(key(&class.name), class);
        Ok(())
    }

    fn drop_class(&self, name: &str) -> SchemaResult<()> {
        let mut guard = self.write()?;
        if !guard.contains_key(&key(name)) {
            return Err(SchemaError::ClassNotFound(name.to_string()));
        }
        let subclasses: Vec<String> = guard
            .values()
            .filter(|c| c.superclasses.iter().any(|s| s.eq_ignore_ascii_case(name)))
            .map(|c| c.name.clone())
            .collect();
        if !subclasses.is_empty() {
            return Err(SchemaError::HasSubclasses {
                class: name.to_string(),
                subclasses: subclasses.join(", "),
            });
        }
        guard.remove(&key(name));
        Ok(())
    }

    fn create_property(&self, class: &str, property: PropertyDef) -> SchemaResult<()> {
        let mut guard = self.write()?;
        let def = guard
            .get_mut(&key(class))
            .ok_or_else(|| SchemaError::ClassNotFound(class.to_string()))?;
        if def.own_property(&property.name).is_some() {
            return Err(SchemaError::PropertyExists {
                class: def.name.clone(),
                property: property.name,
            });
        }
        def.properties.push(property);
        Ok(())
    }

    fn drop_property(&self, class: &str, property: &str) -> SchemaResult<()> {
        let mut guard = self.write()?;
        let def = guard
            .get_mut(&key(class))
            .ok_or_else(|| SchemaError::ClassNotFound(class.to_string()))?;
        let before = def.properties.len();
        def.properties
            .retain(|p| !p.name.eq_ignore_ascii_case(property));
        if def.properties.len() == before {
            return Err(SchemaError::PropertyNotFound {
                class: def.name.clone(),
                property: property.to_string(),
            });
        }
        Ok(())
    }

    fn add_cluster(&self, class: &str, cluster: u32) -> SchemaResult<()> {
        let mut guard = self.write()?;
        let def = guard
            .get_mut(&key(class))
            .ok_or_else(|| SchemaError::ClassNotFound(class.to_string()))?;
        if !def.cluster_ids.contains(&cluster) {
            def.cluster_ids.push(cluster);
            def.cluster_ids.sort_unstable();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PropertyType;

    fn schema() -> MemorySchema {
        let schema = MemorySchema::new();
        let mut v = ClassDef::new("V");
        v.cluster_ids = vec![1];
        schema.create_class(v).unwrap();

        let mut person = ClassDef::new("Person")
            .with_superclass("V")
            .with_property(PropertyDef::new("name", PropertyType::String));
        person.cluster_ids = vec![2];
        schema.create_class(person).unwrap();

        let mut employee = ClassDef::new("Employee").with_superclass("Person");
        employee.cluster_ids = vec![3];
        schema.create_class(employee).unwrap();
        schema
    }

    #[test]
    fn test_subclass_relationship() {
        let s = schema();
        assert!(s.is_subclass_of("Employee", "V").unwrap());
        assert!(s.is_subclass_of("employee", "PERSON").unwrap());
        assert!(!s.is_subclass_of("Person", "Employee").unwrap());
    }

    #[test]
    fn test_inherited_properties() {
        let s = schema();
        let props = s.get_properties("Employee").unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].name, "name");
    }

    #[test]
    fn test_polymorphic_clusters() {
        let s = schema();
        assert_eq!(s.polymorphic_cluster_ids("Person").unwrap(), vec![2, 3]);
        assert_eq!(s.polymorphic_cluster_ids("V").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_drop_class_with_subclasses_rejected() {
        let s = schema();
        assert!(matches!(
            s.drop_class("Person"),
            Err(SchemaError::HasSubclasses { .. })
        ));
        s.drop_class("Employee").unwrap();
        s.drop_class("Person").unwrap();
        assert!(s.get_class("Person").unwrap().is_none());
    }

    #[test]
    fn test_unknown_superclass_rejected() {
        let s = MemorySchema::new();
        let result = s.create_class(ClassDef::new("A").with_superclass("Missing"));
        assert_eq!(result, Err(SchemaError::ClassNotFound("Missing".into())));
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let s = schema();
        let result = s.create_property("Person", PropertyDef::new("NAME", PropertyType::Any));
        assert!(matches!(result, Err(SchemaError::PropertyExists { .. })));
    }
}
