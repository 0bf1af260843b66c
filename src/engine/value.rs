//! Scalar values and records exchanged with the engine
//!
//! A `Record` is the uniform shape for where-maps, write payloads and result
//! rows. Values are the scalars a MySQL-family column can hold once a
//! statement has been bound.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered mapping of field name to value
pub type Record = BTreeMap<String, Value>;

/// A bound scalar value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Signed integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text (also used for formatted timestamps)
    Text(String),
}

impl Value {
    /// Returns true for SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if the value can take part in arithmetic.
    ///
    /// Text counts as numeric when it parses as a number, since drivers
    /// commonly hand decimal columns back as strings.
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) => true,
            Value::Text(s) => s.trim().parse::<f64>().is_ok(),
            Value::Null => false,
        }
    }

    /// Interprets the value as an integer, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Interprets the value as a float, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Null => None,
        }
    }

    /// Returns the text content, if this is a text value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Adds two numeric values. NULL counts as zero.
    ///
    /// Integer addition stays integral unless it overflows or either side is
    /// fractional.
    pub fn checked_add(&self, other: &Value) -> Option<Value> {
        Self::combine(self, other, i64::checked_add, |a, b| a + b)
    }

    /// Subtracts `other` from `self`. NULL counts as zero.
    pub fn checked_sub(&self, other: &Value) -> Option<Value> {
        Self::combine(self, other, i64::checked_sub, |a, b| a - b)
    }

    fn combine(
        lhs: &Value,
        rhs: &Value,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Option<Value> {
        let zero = Value::Int(0);
        let lhs = if lhs.is_null() { &zero } else { lhs };
        let rhs = if rhs.is_null() { &zero } else { rhs };

        if let (Some(a), Some(b)) = (Self::integral(lhs), Self::integral(rhs)) {
            if let Some(sum) = int_op(a, b) {
                return Some(Value::Int(sum));
            }
        }
        Some(Value::Float(float_op(lhs.as_f64()?, rhs.as_f64()?)))
    }

    fn integral(value: &Value) -> Option<i64> {
        match value {
            Value::Int(v) => Some(*v),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
