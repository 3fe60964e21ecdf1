//! Record validation against declared properties
//!
//! Validation semantics:
//! - Declared properties are coerced to their declared type
//! - Mandatory properties must be present
//! - Not-null properties must not hold `null`
//! - Undeclared properties are kept as-is (schema-less fields)

use crate::value::Properties;

use super::errors::{SchemaError, SchemaResult};
use super::types::PropertyDef;

/// Validator for the properties of one class.
///
/// Validation happens before a record is written; the validator returns a
/// coerced copy and never mutates its input.
pub struct RecordValidator<'a> {
    class: &'a str,
    properties: &'a [PropertyDef],
}

impl<'a> RecordValidator<'a> {
    /// Creates a validator for a class given its effective properties.
    pub fn new(class: &'a str, properties: &'a [PropertyDef]) -> Self {
        Self { class, properties }
    }

    /// Validates and coerces a record body.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Validation` when a mandatory property is
    /// missing, a not-null property is null, or a value cannot be
    /// converted to the declared type.
    pub fn validate(&self, input: &Properties) -> SchemaResult<Properties> {
        let mut output = Properties::with_capacity(input.len());
        for (name, value) in input.iter() {
            let declared = self
                .properties
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name));
            let value = match declared {
                Some(def) => {
                    if def.not_null && value.is_null() {
                        return Err(self.error(&def.name, "value is null"));
                    }
                    value
                        .convert_to(def.property_type)
                        .map_err(|e| self.error(&def.name, &e.to_string()))?
                }
                None => value.clone(),
            };
            output.set(name, value);
        }

        for def in self.properties.iter().filter(|p| p.mandatory) {
            if !input.names().any(|n| n.eq_ignore_ascii_case(&def.name)) {
                return Err(self.error(&def.name, "mandatory property missing"));
            }
        }
        Ok(output)
    }

    fn error(&self, property: &str, reason: &str) -> SchemaError {
        SchemaError::Validation {
            class: self.class.to_string(),
            property: property.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PropertyType;
    use crate::value::Value;

    fn defs() -> Vec<PropertyDef> {
        vec![
            PropertyDef::new("age", PropertyType::Integer).mandatory(),
            PropertyDef::new("nick", PropertyType::String).not_null(),
        ]
    }

    #[test]
    fn test_coerces_declared_types() {
        let defs = defs();
        let validator = RecordValidator::new("Person", &defs);
        let input: Properties = [("age", Value::Long(30)), ("extra", Value::Double(1.5))]
            .into_iter()
            .collect();
        let out = validator.validate(&input).unwrap();
        assert_eq!(out.get("age"), Some(&Value::Int(30)));
        assert_eq!(out.get("extra"), Some(&Value::Double(1.5)));
    }

    #[test]
    fn test_missing_mandatory_fails() {
        let defs = defs();
        let validator = RecordValidator::new("Person", &defs);
        let input: Properties = [("nick", "bob")].into_iter().collect();
        assert!(matches!(
            validator.validate(&input),
            Err(SchemaError::Validation { .. })
        ));
    }

    #[test]
    fn test_not_null_enforced() {
        let defs = defs();
        let validator = RecordValidator::new("Person", &defs);
        let input: Properties = [("age", Value::Int(1)), ("nick", Value::Null)]
            .into_iter()
            .collect();
        assert!(validator.validate(&input).is_err());
    }

    #[test]
    fn test_unconvertible_value_fails() {
        let defs = defs();
        let validator = RecordValidator::new("Person", &defs);
        let input: Properties = [("age", "old")].into_iter().collect();
        assert!(validator.validate(&input).is_err());
    }
}
