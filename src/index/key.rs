//! Composite index keys

use std::cmp::Ordering;
use std::fmt;

use crate::value::Value;

/// Key of an index entry: one value per indexed field.
///
/// Keys are ordered part by part with [`Value::total_cmp`]; a key that is
/// a strict prefix of another sorts first. This makes every key starting
/// with prefix `p` sort after `p` itself, which range scans rely on.
#[derive(Debug, Clone)]
pub struct IndexKey(pub Vec<Value>);

impl IndexKey {
    pub fn new(parts: Vec<Value>) -> Self {
        Self(parts)
    }

    pub fn single(value: Value) -> Self {
        Self(vec![value])
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    /// Compares only the first `prefix.len()` parts of this key
    pub fn prefix_cmp(&self, prefix: &[Value]) -> Ordering {
        for (part, other) in self.0.iter().zip(prefix.iter()) {
            match part.total_cmp(other) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        if self.0.len() < prefix.len() {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }

    /// Key value as seen by callers: the bare value for single-field keys
    pub fn to_value(&self) -> Value {
        match self.0.as_slice() {
            [single] => single.clone(),
            parts => Value::List(parts.to_vec()),
        }
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.total_cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_sorts_first() {
        let prefix = IndexKey::new(vec![Value::Int(1)]);
        let full = IndexKey::new(vec![Value::Int(1), Value::Null]);
        assert!(prefix < full);
    }

    #[test]
    fn test_numeric_subtypes_are_same_key() {
        assert_eq!(
            IndexKey::single(Value::Int(5)),
            IndexKey::single(Value::Long(5))
        );
    }

    #[test]
    fn test_prefix_cmp() {
        let key = IndexKey::new(vec![Value::Int(1), Value::from("b")]);
        assert_eq!(key.prefix_cmp(&[Value::Int(1)]), Ordering::Equal);
        assert_eq!(key.prefix_cmp(&[Value::Int(2)]), Ordering::Less);
        assert_eq!(
            key.prefix_cmp(&[Value::Int(1), Value::from("a")]),
            Ordering::Greater
        );
    }

    #[test]
    fn test_to_value() {
        assert_eq!(IndexKey::single(Value::Int(1)).to_value(), Value::Int(1));
        assert_eq!(
            IndexKey::new(vec![Value::Int(1), Value::Int(2)]).to_value(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }
}
