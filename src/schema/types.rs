//! Class and property definitions

use serde::{Deserialize, Serialize};

/// Declared type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PropertyType {
    #[default]
    Any,
    Boolean,
    Short,
    Integer,
    Long,
    Float,
    Double,
    Decimal,
    String,
    Date,
    #[serde(rename = "DATETIME")]
    DateTime,
    Link,
    #[serde(rename = "EMBEDDEDLIST")]
    EmbeddedList,
    #[serde(rename = "LINKLIST")]
    LinkList,
    #[serde(rename = "EMBEDDEDMAP")]
    EmbeddedMap,
    Embedded,
}

impl PropertyType {
    /// Upper-case type name as shown in schema metadata
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Any => "ANY",
            PropertyType::Boolean => "BOOLEAN",
            PropertyType::Short => "SHORT",
            PropertyType::Integer => "INTEGER",
            PropertyType::Long => "LONG",
            PropertyType::Float => "FLOAT",
            PropertyType::Double => "DOUBLE",
            PropertyType::Decimal => "DECIMAL",
            PropertyType::String => "STRING",
            PropertyType::Date => "DATE",
            PropertyType::DateTime => "DATETIME",
            PropertyType::Link => "LINK",
            PropertyType::EmbeddedList => "EMBEDDEDLIST",
            PropertyType::LinkList => "LINKLIST",
            PropertyType::EmbeddedMap => "EMBEDDEDMAP",
            PropertyType::Embedded => "EMBEDDED",
        }
    }

    /// Multi-valued types; an index over them holds one entry per element
    pub fn is_multi_value(&self) -> bool {
        matches!(
            self,
            PropertyType::EmbeddedList | PropertyType::LinkList | PropertyType::EmbeddedMap
        )
    }
}

/// A declared property of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub linked_class: Option<String>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub not_null: bool,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            linked_class: None,
            mandatory: false,
            not_null: false,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// A class: named record type with inheritance and backing clusters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub superclasses: Vec<String>,
    #[serde(default)]
    pub cluster_ids: Vec<u32>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclasses: Vec::new(),
            cluster_ids: Vec::new(),
            is_abstract: false,
            properties: Vec::new(),
        }
    }

    pub fn with_superclass(mut self, name: impl Into<String>) -> Self {
        self.superclasses.push(name.into());
        self
    }

    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Own (not inherited) property lookup, case-insensitive
    pub fn own_property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}
