//! Arithmetic over values
//!
//! Integral results widen instead of overflowing: short and int arithmetic
//! yields int, int overflow yields long, long overflow yields decimal.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::{ValueError, ValueResult};
use super::types::Value;

/// Binary arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

fn numeric_rank(value: &Value) -> Option<u8> {
    match value {
        Value::Short(_) => Some(0),
        Value::Int(_) => Some(1),
        Value::Long(_) => Some(2),
        Value::Float(_) => Some(3),
        Value::Double(_) => Some(4),
        Value::Decimal(_) => Some(5),
        _ => None,
    }
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Decimal(d) => Some(*d),
        Value::Float(f) => Decimal::from_f32(*f),
        Value::Double(f) => Decimal::from_f64(*f),
        other => other.as_i64().map(Decimal::from),
    }
}

fn int_op(op: ArithOp, a: i64, b: i64) -> ValueResult<Option<i64>> {
    Ok(match op {
        ArithOp::Add => a.checked_add(b),
        ArithOp::Sub => a.checked_sub(b),
        ArithOp::Mul => a.checked_mul(b),
        ArithOp::Div => {
            if b == 0 {
                return Err(ValueError::DivisionByZero);
            }
            a.checked_div(b)
        }
        ArithOp::Mod => {
            if b == 0 {
                return Err(ValueError::DivisionByZero);
            }
            a.checked_rem(b)
        }
    })
}

fn float_op(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    }
}

fn decimal_op(op: ArithOp, a: Decimal, b: Decimal) -> ValueResult<Decimal> {
    let result = match op {
        ArithOp::Add => a.checked_add(b),
        ArithOp::Sub => a.checked_sub(b),
        ArithOp::Mul => a.checked_mul(b),
        ArithOp::Div => {
            if b.is_zero() {
                return Err(ValueError::DivisionByZero);
            }
            a.checked_div(b)
        }
        ArithOp::Mod => {
            if b.is_zero() {
                return Err(ValueError::DivisionByZero);
            }
            a.checked_rem(b)
        }
    };
    result.ok_or_else(|| ValueError::Operator {
        op: op.symbol().to_string(),
        left: a.to_string(),
        right: b.to_string(),
    })
}

impl Value {
    /// Applies an arithmetic operator.
    ///
    /// `null` on either side yields `null`; `+` with a string operand
    /// concatenates.
    pub fn apply(&self, op: ArithOp, other: &Value) -> ValueResult<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        if op == ArithOp::Add {
            if let (Value::String(a), b) = (self, other) {
                return Ok(Value::String(format!("{}{}", a, b)));
            }
            if let (a, Value::String(b)) = (self, other) {
                return Ok(Value::String(format!("{}{}", a, b)));
            }
        }

        let (ra, rb) = match (numeric_rank(self), numeric_rank(other)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(ValueError::Operator {
                    op: op.symbol().to_string(),
                    left: self.type_name().to_string(),
                    right: other.type_name().to_string(),
                })
            }
        };

        match ra.max(rb).max(1) {
            1 | 2 => {
                let (a, b) = match (self.as_i64(), other.as_i64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(ValueError::conversion(self, "long")),
                };
                match int_op(op, a, b)? {
                    Some(v) if ra.max(rb) <= 1 => Ok(i32::try_from(v)
                        .map(Value::Int)
                        .unwrap_or(Value::Long(v))),
                    Some(v) => Ok(Value::Long(v)),
                    None => decimal_op(op, Decimal::from(a), Decimal::from(b)).map(Value::Decimal),
                }
            }
            3 => {
                let (a, b) = (self.as_f64().unwrap_or(0.0), other.as_f64().unwrap_or(0.0));
                Ok(Value::Float(float_op(op, a, b) as f32))
            }
            4 => {
                let (a, b) = (self.as_f64().unwrap_or(0.0), other.as_f64().unwrap_or(0.0));
                Ok(Value::Double(float_op(op, a, b)))
            }
            _ => match (to_decimal(self), to_decimal(other)) {
                (Some(a), Some(b)) => decimal_op(op, a, b).map(Value::Decimal),
                _ => Err(ValueError::conversion(self, "decimal")),
            },
        }
    }

    /// Arithmetic negation
    pub fn negate(&self) -> ValueResult<Value> {
        match self {
            Value::Null => Ok(Value::Null),
            Value::Short(v) => Ok(Value::Int(-i32::from(*v))),
            Value::Int(v) => Ok(v
                .checked_neg()
                .map(Value::Int)
                .unwrap_or(Value::Long(-i64::from(*v)))),
            Value::Long(v) => Ok(v
                .checked_neg()
                .map(Value::Long)
                .unwrap_or(Value::Decimal(-Decimal::from(*v)))),
            Value::Float(v) => Ok(Value::Float(-v)),
            Value::Double(v) => Ok(Value::Double(-v)),
            Value::Decimal(d) => Ok(Value::Decimal(-*d)),
            other => Err(ValueError::conversion(other, "number")),
        }
    }
}
