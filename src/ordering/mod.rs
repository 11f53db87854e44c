//! # Typed Values and Ordering
//!
//! A stage declares the primitive type its extracted values are sorted or
//! emitted as. `ValueType` is that declaration, `TypedValue` the comparable
//! wrapper, `TypedHandler` converts property values into it (failing on a
//! mismatch rather than coercing), and `KeyComparator` orders wrapped keys
//! ascending or descending.

pub mod handler;
pub mod comparator;

use std::fmt;
use std::str::FromStr;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

pub use handler::TypedHandler;
pub use comparator::{KeyComparator, SortOrder};

/// Declared primitive type of an extracted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Long,
    Int,
    Float,
    Double,
    Text,
    Boolean,
}

impl ValueType {
    pub const ALL: [ValueType; 6] = [
        ValueType::Long,
        ValueType::Int,
        ValueType::Float,
        ValueType::Double,
        ValueType::Text,
        ValueType::Boolean,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Long => "long",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::Text => "text",
            ValueType::Boolean => "boolean",
        }
    }

    /// Whether keys of this type can drive a sort.
    pub fn is_orderable(self) -> bool {
        !matches!(self, ValueType::Boolean)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unsupported value class '{s}'"))
    }
}

/// A value wrapped in its declared type. Ordering is total within a variant;
/// floats use `OrderedFloat` so NaN has a fixed position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum TypedValue {
    Long(i64),
    Int(i32),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    Text(String),
    Boolean(bool),
}

impl TypedValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            TypedValue::Long(_) => ValueType::Long,
            TypedValue::Int(_) => ValueType::Int,
            TypedValue::Float(_) => ValueType::Float,
            TypedValue::Double(_) => ValueType::Double,
            TypedValue::Text(_) => ValueType::Text,
            TypedValue::Boolean(_) => ValueType::Boolean,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Long(v) => write!(f, "{v}"),
            TypedValue::Int(v) => write!(f, "{v}"),
            TypedValue::Float(v) => write!(f, "{}", v.0),
            TypedValue::Double(v) => write!(f, "{}", v.0),
            TypedValue::Text(v) => f.write_str(v),
            TypedValue::Boolean(v) => write!(f, "{v}"),
        }
    }
}
