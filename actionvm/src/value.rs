use crate::{ObjectId, StringId};

/// A script value. Strings and objects are handles into the [`Heap`];
/// everything else is stored inline.
///
/// Numbers that are exactly representable as `i32` are kept in the
/// compact [`Value::Int`] form, so constructors should go through
/// [`Value::number`] rather than building `Value::Number` directly.
///
/// [`Heap`]: crate::Heap
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Int(i32),
    Number(f64),
    String(StringId),
    Object(ObjectId),
}

impl Value {
    pub fn number(value: f64) -> Self {
        if value.fract() == 0.0
            && value >= i32::MIN as f64
            && value <= i32::MAX as f64
            && !(value == 0.0 && value.is_sign_negative())
        {
            Value::Int(value as i32)
        } else {
            Value::Number(value)
        }
    }

    #[inline]
    pub fn is_undefined(self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    pub fn is_null_or_undefined(self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    #[inline]
    pub fn is_number(self) -> bool {
        matches!(self, Value::Int(_) | Value::Number(_))
    }

    #[inline]
    pub fn as_object(self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(id),
            _ => None,
        }
    }

    #[inline]
    pub fn as_string(self) -> Option<StringId> {
        match self {
            Value::String(id) => Some(id),
            _ => None,
        }
    }

    /// Numeric payload without any coercion.
    #[inline]
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(i as f64),
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) | Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::number(value)
    }
}

impl From<StringId> for Value {
    fn from(value: StringId) -> Self {
        Value::String(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::Object(value)
    }
}

impl From<Option<ObjectId>> for Value {
    fn from(value: Option<ObjectId>) -> Self {
        value.map_or(Value::Null, Value::Object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_use_compact_form() {
        assert_eq!(Value::number(30.0), Value::Int(30));
        assert_eq!(Value::number(-7.0), Value::Int(-7));
        assert!(matches!(Value::number(0.5), Value::Number(_)));
        assert!(matches!(Value::number(-0.0), Value::Number(_)));
        assert!(matches!(Value::number(4294967296.0), Value::Number(_)));
        assert!(matches!(Value::number(f64::NAN), Value::Number(_)));
    }
}
