//! Ascending / descending key comparators.
//!
//! One comparator value covers every `(type, direction)` pair: long, int,
//! float, double and text, each ascending or descending. Boolean keys are
//! not orderable.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{TypedValue, ValueType};
use crate::{Error, Result};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Ascending),
            "desc" => Ok(SortOrder::Descending),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

/// Total order over [`TypedValue`] keys of one declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyComparator {
    value_type: ValueType,
    order: SortOrder,
}

impl KeyComparator {
    pub fn new(value_type: ValueType, order: SortOrder) -> Result<Self> {
        if !value_type.is_orderable() {
            return Err(Error::config(
                "comparator",
                format!("no comparator for value class '{value_type}'"),
            ));
        }
        Ok(Self { value_type, order })
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    /// Compare two keys. Text compares bytewise (UTF-8 order). Keys of a
    /// different variant than expected fall back to variant rank so the
    /// order stays total.
    pub fn compare(&self, a: &TypedValue, b: &TypedValue) -> Ordering {
        let natural = match (a, b) {
            (TypedValue::Long(x), TypedValue::Long(y)) => x.cmp(y),
            (TypedValue::Int(x), TypedValue::Int(y)) => x.cmp(y),
            (TypedValue::Float(x), TypedValue::Float(y)) => x.cmp(y),
            (TypedValue::Double(x), TypedValue::Double(y)) => x.cmp(y),
            (TypedValue::Text(x), TypedValue::Text(y)) => x.as_bytes().cmp(y.as_bytes()),
            _ => a.cmp(b),
        };
        match self.order {
            SortOrder::Ascending => natural,
            SortOrder::Descending => natural.reverse(),
        }
    }

    /// Sort keys in place.
    pub fn sort(&self, keys: &mut [TypedValue]) {
        keys.sort_by(|a, b| self.compare(a, b));
    }
}
