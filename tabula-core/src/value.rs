//! Column data types and the runtime value model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DATA TYPES
// ============================================================================

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Text,
    Integer,
    Float,
    Boolean,
    DateTime,
    BigInt,
    Null,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "TEXT",
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::Boolean => "BOOLEAN",
            DataType::DateTime => "DATETIME",
            DataType::BigInt => "BIGINT",
            DataType::Null => "NULL",
        }
    }

    /// Coerce a value into this type.
    ///
    /// INTEGER and FLOAT share one numeric runtime kind upstream, so the
    /// declared type decides: floats without a fractional part are accepted
    /// as integers and integers are widened to floats. DATETIME accepts
    /// RFC 3339 text, BIGINT accepts integers and decimal text.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (DataType::Null, Value::Null) => Some(Value::Null),
            (DataType::Text, Value::Text(_)) => Some(value.clone()),
            (DataType::Boolean, Value::Boolean(_)) => Some(value.clone()),

            (DataType::Integer, Value::Integer(_)) => Some(value.clone()),
            (DataType::Integer, Value::Float(f)) => {
                if f.is_finite()
                    && f.fract() == 0.0
                    && *f >= i64::MIN as f64
                    && *f <= i64::MAX as f64
                {
                    Some(Value::Integer(*f as i64))
                } else {
                    None
                }
            }
            (DataType::Integer, Value::BigInt(b)) => i64::try_from(*b).ok().map(Value::Integer),

            (DataType::Float, Value::Float(_)) => Some(value.clone()),
            (DataType::Float, Value::Integer(i)) => Some(Value::Float(*i as f64)),

            (DataType::BigInt, Value::BigInt(_)) => Some(value.clone()),
            (DataType::BigInt, Value::Integer(i)) => Some(Value::BigInt(*i as i128)),
            (DataType::BigInt, Value::Text(s)) => s.trim().parse::<i128>().ok().map(Value::BigInt),

            (DataType::DateTime, Value::DateTime(_)) => Some(value.clone()),
            (DataType::DateTime, Value::Text(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc))),

            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Ok(DataType::Text),
            "INTEGER" => Ok(DataType::Integer),
            "FLOAT" => Ok(DataType::Float),
            "BOOLEAN" => Ok(DataType::Boolean),
            "DATETIME" => Ok(DataType::DateTime),
            "BIGINT" => Ok(DataType::BigInt),
            "NULL" => Ok(DataType::Null),
            other => Err(format!("Invalid data type: {}", other)),
        }
    }
}

// ============================================================================
// VALUES
// ============================================================================

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    BigInt(i128),
}

/// Infer the column type a value would be stored as on its own.
pub fn infer_type(value: &Value) -> DataType {
    value.data_type()
}

/// Strict per-kind type check against a declared column type.
pub fn matches_type(value: &Value, declared: DataType) -> bool {
    declared.coerce(value).is_some()
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Text(_) => DataType::Text,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Boolean(_) => DataType::Boolean,
            Value::DateTime(_) => DataType::DateTime,
            Value::BigInt(_) => DataType::BigInt,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::BigInt(b) => i64::try_from(*b).ok(),
            _ => None,
        }
    }

    /// Partial comparison across compatible kinds.
    ///
    /// Numeric kinds compare with each other; everything else only compares
    /// within its own kind. `Null` equals only `Null`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_exact_int(), b.as_exact_int()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y),
                    _ => None,
                },
            },
        }
    }

    /// Total order used for sorting: nulls first, then by value, falling back
    /// to a fixed rank between kinds that do not compare.
    ///
    /// NaN only fails to compare with numbers; it is placed by
    /// `f64::total_cmp`, so positive NaN sorts after every other number.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        self.compare(other).unwrap_or_else(|| {
            match (self.as_f64(), other.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => self.kind_rank().cmp(&other.kind_rank()),
            }
        })
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) | Value::BigInt(_) => 2,
            Value::DateTime(_) => 3,
            Value::Text(_) => 4,
        }
    }

    fn as_exact_int(&self) -> Option<i128> {
        match self {
            Value::Integer(i) => Some(*i as i128),
            Value::BigInt(b) => Some(*b),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::BigInt(b) => Some(*b as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert from JSON. Arrays and objects have no column kind and are kept
    /// as their JSON text.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Value::BigInt(u as i128)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            other => Value::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::BigInt(b) => match i64::try_from(*b) {
                Ok(i) => serde_json::Value::from(i),
                Err(_) => serde_json::Value::String(b.to_string()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Text(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::BigInt(b) => write!(f, "{}", b),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(&json))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i128> for Value {
    fn from(i: i128) -> Self {
        Value::BigInt(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// TESTS
// ============================================================================
