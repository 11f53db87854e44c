//! Property value → declared type conversion.

use crate::model::{MicroReference, Value, reserved};
use crate::{Error, Result};

use super::{TypedValue, ValueType};
use ordered_float::OrderedFloat;

/// Wraps property values into a stage's declared [`ValueType`].
///
/// Numbers convert between numeric types (floats truncate toward zero when
/// the target is integral, out-of-range values are rejected). Text accepts
/// strings, and null as the `"null"` token. Nothing is stringified
/// implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedHandler {
    value_type: ValueType,
}

impl TypedHandler {
    pub fn new(value_type: ValueType) -> Self {
        Self { value_type }
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Convert, or `None` when the value does not fit the declared type.
    pub fn wrap(&self, value: &Value) -> Option<TypedValue> {
        match (self.value_type, value) {
            (ValueType::Long, Value::Int(i)) => Some(TypedValue::Long(*i)),
            (ValueType::Long, Value::Float(f)) if f.is_finite() => Some(TypedValue::Long(*f as i64)),
            (ValueType::Int, Value::Int(i)) => i32::try_from(*i).ok().map(TypedValue::Int),
            (ValueType::Int, Value::Float(f))
                if f.is_finite() && *f >= i32::MIN as f64 && *f <= i32::MAX as f64 =>
            {
                Some(TypedValue::Int(*f as i32))
            }
            (ValueType::Float, v) if v.is_numeric() => {
                v.as_float().map(|f| TypedValue::Float(OrderedFloat(f as f32)))
            }
            (ValueType::Double, v) if v.is_numeric() => {
                v.as_float().map(|f| TypedValue::Double(OrderedFloat(f)))
            }
            (ValueType::Text, Value::String(s)) => Some(TypedValue::Text(s.clone())),
            (ValueType::Text, Value::Null) => Some(TypedValue::Text(reserved::NULL.to_owned())),
            (ValueType::Boolean, Value::Bool(b)) => Some(TypedValue::Boolean(*b)),
            _ => None,
        }
    }

    /// [`TypedHandler::wrap`] with the failure reported against a stage and
    /// element.
    pub fn wrap_for(
        &self,
        value: &Value,
        stage: &'static str,
        element: MicroReference,
    ) -> Result<TypedValue> {
        self.wrap(value).ok_or_else(|| Error::TypeMismatch {
            stage,
            element,
            expected: self.value_type.to_string(),
            got: value.type_name().to_owned(),
        })
    }
}
