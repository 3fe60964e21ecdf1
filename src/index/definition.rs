//! Index definitions and key extraction

use serde::{Deserialize, Serialize};

use crate::schema::PropertyType;
use crate::value::{Properties, Value};

use super::errors::{IndexError, IndexResult};

/// Uniqueness and structure class of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    #[serde(rename = "UNIQUE")]
    Unique,
    #[serde(rename = "NOTUNIQUE")]
    NotUnique,
    #[serde(rename = "UNIQUE_HASH_INDEX")]
    UniqueHash,
    #[serde(rename = "NOTUNIQUE_HASH_INDEX")]
    NotUniqueHash,
}

impl IndexType {
    pub fn name(&self) -> &'static str {
        match self {
            IndexType::Unique => "UNIQUE",
            IndexType::NotUnique => "NOTUNIQUE",
            IndexType::UniqueHash => "UNIQUE_HASH_INDEX",
            IndexType::NotUniqueHash => "NOTUNIQUE_HASH_INDEX",
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self, IndexType::Unique | IndexType::UniqueHash)
    }

    /// Hash indexes answer equality lookups on the full key only
    pub fn is_hash(&self) -> bool {
        matches!(self, IndexType::UniqueHash | IndexType::NotUniqueHash)
    }

    pub fn supports_range(&self) -> bool {
        !self.is_hash()
    }
}

/// What a map-valued property contributes to an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MapIndexBy {
    Key,
    #[default]
    Value,
}

/// Definition of an index over one or more properties of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub class_name: String,
    pub fields: Vec<String>,
    pub index_type: IndexType,
    /// Declared type of each key field, parallel to `fields`
    #[serde(default)]
    pub key_types: Vec<PropertyType>,
    /// For single-field indexes over a map property
    #[serde(default)]
    pub map_by: Option<MapIndexBy>,
}

impl IndexDefinition {
    pub fn new(
        name: impl Into<String>,
        class_name: impl Into<String>,
        fields: Vec<String>,
        index_type: IndexType,
    ) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            key_types: vec![PropertyType::Any; fields.len()],
            fields,
            index_type,
            map_by: None,
        }
    }

    pub fn with_key_types(mut self, key_types: Vec<PropertyType>) -> Self {
        self.key_types = key_types;
        self
    }

    pub fn with_map_by(mut self, by: MapIndexBy) -> Self {
        self.map_by = Some(by);
        self
    }

    fn key_type(&self, position: usize) -> PropertyType {
        self.key_types
            .get(position)
            .copied()
            .unwrap_or(PropertyType::Any)
    }

    /// True when any key field holds several values per record
    pub fn is_multi_value(&self) -> bool {
        self.map_by.is_some() || self.key_types.iter().any(PropertyType::is_multi_value)
    }

    /// Position of a field in the key, case-insensitive
    pub fn field_position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.eq_ignore_ascii_case(field))
    }

    /// Converts a query value to the type of the key part at `position`.
    ///
    /// Collection-typed fields are keyed by their elements, so the value is
    /// left unconverted.
    pub fn convert_key_part(&self, position: usize, value: &Value) -> IndexResult<Value> {
        let ty = self.key_type(position);
        if ty.is_multi_value() || self.map_by.is_some() {
            return Ok(value.clone());
        }
        value
            .convert_to(ty)
            .map_err(|e| IndexError::KeyConversion {
                index: self.name.clone(),
                reason: e.to_string(),
            })
    }

    /// Computes all keys a record contributes to this index.
    ///
    /// Scalar fields contribute one part each (`null` when absent).
    /// Collection fields contribute one part per element; composite keys
    /// over several collection fields are the cartesian product.
    pub fn keys_for(&self, properties: &Properties) -> IndexResult<Vec<Vec<Value>>> {
        let mut keys: Vec<Vec<Value>> = vec![Vec::with_capacity(self.fields.len())];
        for (position, field) in self.fields.iter().enumerate() {
            let raw = properties
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(field))
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null);

            let parts: Vec<Value> = match (&raw, self.map_by) {
                (Value::Map(map), Some(MapIndexBy::Key)) => {
                    map.keys().map(|k| Value::String(k.clone())).collect()
                }
                (Value::Map(map), _) => map.values().cloned().collect(),
                (Value::List(items), _) => items.clone(),
                _ => vec![self.convert_key_part(position, &raw)?],
            };
            if parts.is_empty() {
                return Ok(Vec::new());
            }

            keys = keys
                .into_iter()
                .flat_map(|prefix| {
                    parts.iter().map(move |part| {
                        let mut key = prefix.clone();
                        key.push(part.clone());
                        key
                    })
                })
                .collect();
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_index_type_serde() {
        let json = serde_json::to_string(&IndexType::NotUniqueHash).unwrap();
        assert_eq!(json, "\"NOTUNIQUE_HASH_INDEX\"");
        assert!(IndexType::UniqueHash.is_hash());
        assert!(!IndexType::NotUnique.is_hash());
    }

    #[test]
    fn test_scalar_keys_are_converted() {
        let def = IndexDefinition::new("T.a", "T", vec!["a".into()], IndexType::NotUnique)
            .with_key_types(vec![PropertyType::Long]);
        let props: Properties = [("a", Value::Int(3))].into_iter().collect();
        assert_eq!(def.keys_for(&props).unwrap(), vec![vec![Value::Long(3)]]);
    }

    #[test]
    fn test_missing_field_is_null_part() {
        let def = IndexDefinition::new("T.ab", "T", vec!["a".into(), "b".into()], IndexType::NotUnique);
        let props: Properties = [("a", Value::Int(1))].into_iter().collect();
        assert_eq!(
            def.keys_for(&props).unwrap(),
            vec![vec![Value::Int(1), Value::Null]]
        );
    }

    #[test]
    fn test_list_field_yields_one_key_per_element() {
        let def = IndexDefinition::new("T.tags", "T", vec!["tags".into()], IndexType::NotUnique)
            .with_key_types(vec![PropertyType::EmbeddedList]);
        let props: Properties = [(
            "tags",
            Value::List(vec![Value::from("a"), Value::from("b")]),
        )]
        .into_iter()
        .collect();
        assert_eq!(def.keys_for(&props).unwrap().len(), 2);
    }

    #[test]
    fn test_map_by_key() {
        let def = IndexDefinition::new("T.m", "T", vec!["m".into()], IndexType::NotUnique)
            .with_key_types(vec![PropertyType::EmbeddedMap])
            .with_map_by(MapIndexBy::Key);
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), Value::Int(1));
        let props: Properties = [("m", Value::Map(map))].into_iter().collect();
        assert_eq!(
            def.keys_for(&props).unwrap(),
            vec![vec![Value::from("x")]]
        );
    }

    #[test]
    fn test_conversion_failure_reported() {
        let def = IndexDefinition::new("T.a", "T", vec!["a".into()], IndexType::NotUnique)
            .with_key_types(vec![PropertyType::Integer]);
        let props: Properties = [("a", "abc")].into_iter().collect();
        assert!(matches!(
            def.keys_for(&props),
            Err(IndexError::KeyConversion { .. })
        ));
    }
}
