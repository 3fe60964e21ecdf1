//! JSON conversion and coercion to declared property types

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::Value as Json;

use crate::schema::PropertyType;
use crate::storage::RecordId;

use super::errors::{ValueError, ValueResult};
use super::properties::Properties;
use super::types::Value;

impl Value {
    /// Builds a value from plain JSON.
    ///
    /// Integers that fit in 32 bits become `Int`, larger ones `Long`,
    /// fractional numbers `Double`. Objects become maps.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i32::try_from(i).map(Value::Int).unwrap_or(Value::Long(i))
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect::<BTreeMap<_, _>>(),
            ),
        }
    }

    /// Renders a value as plain JSON.
    ///
    /// Decimals are rendered as strings to keep their precision; dates use
    /// ISO-8601 and links the `#cluster:position` form.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Short(v) => Json::from(*v),
            Value::Int(v) => Json::from(*v),
            Value::Long(v) => Json::from(*v),
            Value::Float(v) => Json::from(f64::from(*v)),
            Value::Double(v) => Json::from(*v),
            Value::Decimal(d) => Json::String(d.to_string()),
            Value::String(s) => Json::String(s.clone()),
            Value::Date(_) | Value::DateTime(_) | Value::Link(_) => Json::String(self.to_string()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Embedded(props) => Json::Object(
                props
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Coerces a value to a declared property type.
    ///
    /// `null` converts to every type. Fails with [`ValueError::Conversion`]
    /// when the value cannot represent the target type.
    pub fn convert_to(&self, target: PropertyType) -> ValueResult<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let fail = || ValueError::conversion(self, target.name());
        match target {
            PropertyType::Any => Ok(self.clone()),
            PropertyType::Boolean => match self {
                Value::Boolean(b) => Ok(Value::Boolean(*b)),
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Boolean(true)),
                    "false" => Ok(Value::Boolean(false)),
                    _ => Err(fail()),
                },
                _ => Err(fail()),
            },
            PropertyType::Short => self
                .integral()
                .and_then(|i| i16::try_from(i).ok())
                .map(Value::Short)
                .ok_or_else(fail),
            PropertyType::Integer => self
                .integral()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Int)
                .ok_or_else(fail),
            PropertyType::Long => self.integral().map(Value::Long).ok_or_else(fail),
            PropertyType::Float => self
                .fractional()
                .map(|f| Value::Float(f as f32))
                .ok_or_else(fail),
            PropertyType::Double => self.fractional().map(Value::Double).ok_or_else(fail),
            PropertyType::Decimal => match self {
                Value::Decimal(d) => Ok(Value::Decimal(*d)),
                Value::String(s) => Decimal::from_str(s.trim())
                    .map(Value::Decimal)
                    .map_err(|_| fail()),
                Value::Float(f) => Decimal::from_f32(*f).map(Value::Decimal).ok_or_else(fail),
                Value::Double(f) => Decimal::from_f64(*f).map(Value::Decimal).ok_or_else(fail),
                other => other
                    .as_i64()
                    .map(|i| Value::Decimal(Decimal::from(i)))
                    .ok_or_else(fail),
            },
            PropertyType::String => match self {
                Value::List(_) | Value::Map(_) | Value::Embedded(_) => Err(fail()),
                other => Ok(Value::String(other.to_string())),
            },
            PropertyType::Date => match self {
                Value::Date(d) => Ok(Value::Date(*d)),
                Value::DateTime(dt) => Ok(Value::Date(dt.date_naive())),
                Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|_| fail()),
                _ => Err(fail()),
            },
            PropertyType::DateTime => match self {
                Value::DateTime(dt) => Ok(Value::DateTime(*dt)),
                Value::Date(d) => d
                    .and_hms_opt(0, 0, 0)
                    .map(|n| Value::DateTime(n.and_utc()))
                    .ok_or_else(fail),
                Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                    .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                    .map_err(|_| fail()),
                other => other
                    .as_i64()
                    .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                    .map(Value::DateTime)
                    .ok_or_else(fail),
            },
            PropertyType::Link => match self {
                Value::Link(rid) => Ok(Value::Link(*rid)),
                Value::String(s) => RecordId::from_str(s)
                    .map(Value::Link)
                    .map_err(|_| fail()),
                _ => Err(fail()),
            },
            PropertyType::EmbeddedList | PropertyType::LinkList => match self {
                Value::List(items) => {
                    let element = if target == PropertyType::LinkList {
                        PropertyType::Link
                    } else {
                        PropertyType::Any
                    };
                    items
                        .iter()
                        .map(|item| item.convert_to(element))
                        .collect::<ValueResult<Vec<_>>>()
                        .map(Value::List)
                }
                other => Ok(Value::List(vec![other.clone()])),
            },
            PropertyType::EmbeddedMap => match self {
                Value::Map(map) => Ok(Value::Map(map.clone())),
                Value::Embedded(props) => Ok(Value::Map(
                    props
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.clone()))
                        .collect(),
                )),
                _ => Err(fail()),
            },
            PropertyType::Embedded => match self {
                Value::Embedded(props) => Ok(Value::Embedded(props.clone())),
                Value::Map(map) => Ok(Value::Embedded(
                    map.iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<Properties>(),
                )),
                _ => Err(fail()),
            },
        }
    }

    fn integral(&self) -> Option<i64> {
        match self {
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Double(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Boolean(_) => None,
            other => other.as_i64(),
        }
    }

    fn fractional(&self) -> Option<f64> {
        match self {
            Value::String(s) => s.trim().parse().ok(),
            other => other.as_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_picks_int_or_long() {
        assert_eq!(Value::from_json(&serde_json::json!(5)), Value::Int(5));
        assert_eq!(
            Value::from_json(&serde_json::json!(5_000_000_000i64)),
            Value::Long(5_000_000_000)
        );
        assert_eq!(Value::from_json(&serde_json::json!(1.5)), Value::Double(1.5));
    }

    #[test]
    fn test_to_json_renders_links_and_decimals() {
        assert_eq!(
            Value::Link(RecordId::new(12, 3)).to_json(),
            serde_json::json!("#12:3")
        );
        assert_eq!(
            Value::Decimal(Decimal::new(125, 2)).to_json(),
            serde_json::json!("1.25")
        );
    }

    #[test]
    fn test_convert_numeric_subtypes() {
        assert_eq!(
            Value::Long(7).convert_to(PropertyType::Integer).unwrap(),
            Value::Int(7)
        );
        assert_eq!(
            Value::from("12").convert_to(PropertyType::Short).unwrap(),
            Value::Short(12)
        );
        assert_eq!(
            Value::Int(3).convert_to(PropertyType::Double).unwrap(),
            Value::Double(3.0)
        );
    }

    #[test]
    fn test_convert_out_of_range_fails() {
        assert!(Value::Long(i64::MAX).convert_to(PropertyType::Integer).is_err());
        assert!(Value::from("abc").convert_to(PropertyType::Long).is_err());
    }

    #[test]
    fn test_convert_string_to_date() {
        let value = Value::from("2024-03-01").convert_to(PropertyType::Date).unwrap();
        assert_eq!(value, Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn test_null_converts_to_anything() {
        assert_eq!(Value::Null.convert_to(PropertyType::Link).unwrap(), Value::Null);
    }
}
