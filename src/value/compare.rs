//! Query and total ordering of values

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use super::types::Value;

/// Numeric view used to compare across sub-types
#[derive(Debug, Clone, Copy)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
    Dec(Decimal),
}

impl Num {
    pub(crate) fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Short(v) => Some(Num::Int(i64::from(*v))),
            Value::Int(v) => Some(Num::Int(i64::from(*v))),
            Value::Long(v) => Some(Num::Int(*v)),
            Value::Float(v) => Some(Num::Float(f64::from(*v))),
            Value::Double(v) => Some(Num::Float(*v)),
            Value::Decimal(d) => Some(Num::Dec(*d)),
            _ => None,
        }
    }

    fn to_decimal(self) -> Option<Decimal> {
        match self {
            Num::Int(i) => Some(Decimal::from(i)),
            Num::Float(f) => Decimal::from_f64(f),
            Num::Dec(d) => Some(d),
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
            Num::Dec(d) => d.to_f64().unwrap_or(f64::NAN),
        }
    }

    pub(crate) fn compare(self, other: Num) -> Ordering {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a.cmp(&b),
            (Num::Dec(_), _) | (_, Num::Dec(_)) => {
                match (self.to_decimal(), other.to_decimal()) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => self.to_f64().total_cmp(&other.to_f64()),
                }
            }
            _ => self.to_f64().total_cmp(&other.to_f64()),
        }
    }
}

fn date_to_datetime(date: &NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Short(_)
        | Value::Int(_)
        | Value::Long(_)
        | Value::Float(_)
        | Value::Double(_)
        | Value::Decimal(_) => 2,
        Value::String(_) => 3,
        Value::Date(_) | Value::DateTime(_) => 4,
        Value::Link(_) => 5,
        Value::List(_) => 6,
        Value::Map(_) => 7,
        Value::Embedded(_) => 8,
    }
}

impl Value {
    /// Compares two values with query semantics.
    ///
    /// Returns `None` when either side is null or the types are unrelated.
    pub fn sql_compare(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (Num::of(self), Num::of(other)) {
            return Some(a.compare(b));
        }
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::DateTime(b)) => date_to_datetime(a).map(|a| a.cmp(b)),
            (Value::DateTime(a), Value::Date(b)) => date_to_datetime(b).map(|b| a.cmp(&b)),
            (Value::Link(a), Value::Link(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.sql_compare(y)? {
                        Ordering::Equal => continue,
                        other => return Some(other),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    /// Equality with query semantics; `None` when either side is null.
    pub fn sql_equals(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Map(_), _) | (Value::Embedded(_), _) => {
                Some(self.total_cmp(other) == Ordering::Equal)
            }
            _ => self.sql_compare(other).map(|o| o == Ordering::Equal),
        }
    }

    /// Total order over all values.
    ///
    /// Numeric values of different sub-types compare by magnitude, so
    /// `Int(1)` and `Long(1)` are equal under this ordering.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        let (ra, rb) = (type_rank(self), type_rank(other));
        if ra != rb {
            return ra.cmp(&rb);
        }
        if let (Some(a), Some(b)) = (Num::of(self), Num::of(other)) {
            return a.compare(b);
        }
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Date(a), Value::DateTime(b)) => match date_to_datetime(a) {
                Some(a) => a.cmp(b),
                None => Ordering::Less,
            },
            (Value::DateTime(a), Value::Date(b)) => match date_to_datetime(b) {
                Some(b) => a.cmp(&b),
                None => Ordering::Greater,
            },
            (Value::Link(a), Value::Link(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.total_cmp(y) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => {
                let left = a.iter().map(|(k, v)| (k.as_str(), v));
                let right = b.iter().map(|(k, v)| (k.as_str(), v));
                compare_pairs(left, right)
            }
            (Value::Embedded(a), Value::Embedded(b)) => compare_pairs(a.iter(), b.iter()),
            _ => Ordering::Equal,
        }
    }
}

fn compare_pairs<'a>(
    mut left: impl Iterator<Item = (&'a str, &'a Value)>,
    mut right: impl Iterator<Item = (&'a str, &'a Value)>,
) -> Ordering {
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some((ka, va)), Some((kb, vb))) => {
                let ord = ka.cmp(kb).then_with(|| va.total_cmp(vb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// A value ordered by [`Value::total_cmp`], usable as a map or set key
#[derive(Debug, Clone)]
pub struct OrdValue(pub Value);

impl PartialEq for OrdValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for OrdValue {}

impl PartialOrd for OrdValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_family_compares_by_magnitude() {
        assert_eq!(
            Value::Int(5).sql_compare(&Value::Long(5)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Short(2).sql_compare(&Value::Double(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Decimal(Decimal::new(25, 1)).sql_compare(&Value::Float(2.5)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_null_is_incomparable() {
        assert_eq!(Value::Null.sql_compare(&Value::Int(1)), None);
        assert_eq!(Value::Null.sql_equals(&Value::Null), None);
    }

    #[test]
    fn test_unrelated_types_are_incomparable() {
        assert_eq!(Value::from("1").sql_compare(&Value::Int(1)), None);
    }

    #[test]
    fn test_total_order_ranks_types() {
        let mut values = vec![
            Value::from("a"),
            Value::Int(3),
            Value::Null,
            Value::Boolean(false),
            Value::Double(-1.0),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(false),
                Value::Double(-1.0),
                Value::Int(3),
                Value::from("a"),
            ]
        );
    }

    #[test]
    fn test_date_and_datetime_compare() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let midnight = date_to_datetime(&date).unwrap();
        assert_eq!(
            Value::Date(date).sql_compare(&Value::DateTime(midnight)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_ord_value_treats_subtypes_as_equal() {
        assert_eq!(OrdValue(Value::Int(1)), OrdValue(Value::Long(1)));
        assert!(OrdValue(Value::Int(1)) < OrdValue(Value::Long(2)));
    }
}
