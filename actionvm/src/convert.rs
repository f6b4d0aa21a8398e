//! Value coercions and comparisons.

use std::rc::Rc;

use crate::{
    Context, ObjectKind, StringId, Value,
    number::{format_number, parse_number, to_int32},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Number,
    String,
}

impl Context {
    /// Calls `valueOf`/`toString` (order picked by `hint`) until one of
    /// them yields a primitive. Wrapper objects unwrap directly.
    pub fn to_primitive(&mut self, value: Value, hint: Hint) -> Value {
        let Value::Object(id) = value else {
            return value;
        };
        match self.heap.object(id).map(|o| &o.kind) {
            Some(ObjectKind::Boolean(b)) => return Value::Boolean(*b),
            Some(ObjectKind::Number(n)) => return Value::number(*n),
            Some(ObjectKind::String(s)) => return Value::String(*s),
            _ => (),
        }
        let order = match hint {
            Hint::Number => [self.names.value_of, self.names.to_string],
            Hint::String => [self.names.to_string, self.names.value_of],
        };
        for name in order {
            let Some(Value::Object(method)) = self.get_member(id, name) else {
                continue;
            };
            if !self.is_function(method) {
                continue;
            }
            let result = self.call_function(method, Some(id), &[]);
            if !matches!(result, Value::Object(_)) {
                return result;
            }
        }
        value
    }

    pub fn to_number(&mut self, value: Value) -> f64 {
        match value {
            Value::Undefined | Value::Null => {
                if self.version() >= 7 {
                    f64::NAN
                } else {
                    0.0
                }
            }
            Value::Boolean(b) => f64::from(u8::from(b)),
            Value::Int(i) => f64::from(i),
            Value::Number(n) => n,
            Value::String(s) => parse_number(&self.heap.string(s), self.version()),
            Value::Object(_) => match self.to_primitive(value, Hint::Number) {
                Value::Object(_) => f64::NAN,
                primitive => self.to_number(primitive),
            },
        }
    }

    /// `ToInt32` of the numeric value.
    pub fn to_integer(&mut self, value: Value) -> i32 {
        match value {
            Value::Int(i) => i,
            _ => to_int32(self.to_number(value)),
        }
    }

    pub fn to_boolean(&mut self, value: Value) -> bool {
        match value {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => b,
            Value::Int(i) => i != 0,
            Value::Number(n) => n != 0.0 && !n.is_nan(),
            Value::String(s) => {
                if self.version() >= 7 {
                    !self.heap.string(s).is_empty()
                } else {
                    let n = parse_number(&self.heap.string(s), self.version());
                    n != 0.0 && !n.is_nan()
                }
            }
            Value::Object(_) => true,
        }
    }

    /// String conversion yielding an interned id.
    pub fn to_string_id(&mut self, value: Value) -> StringId {
        match value {
            Value::Undefined => {
                if self.version() >= 7 {
                    self.names.undefined
                } else {
                    self.names.empty
                }
            }
            Value::Null => self.names.null,
            Value::Boolean(true) => self.names.true_,
            Value::Boolean(false) => self.names.false_,
            Value::Int(i) => self.heap.intern_owned(i.to_string()),
            Value::Number(n) if n.is_nan() => self.names.nan,
            Value::Number(n) if n.is_infinite() => {
                if n > 0.0 {
                    self.names.infinity
                } else {
                    self.names.negative_infinity
                }
            }
            Value::Number(n) => self.heap.intern_owned(format_number(n)),
            Value::String(s) => s,
            Value::Object(id) => match self.to_primitive(value, Hint::String) {
                Value::Object(_) if self.is_function(id) => self.names.type_function,
                Value::Object(_) => self.names.type_object,
                primitive => self.to_string_id(primitive),
            },
        }
    }

    pub fn to_rust_string(&mut self, value: Value) -> Rc<str> {
        let id = self.to_string_id(value);
        self.heap.string(id)
    }

    /// Loose equality (`==`).
    pub fn abstract_equals(&mut self, a: Value, b: Value) -> bool {
        if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
            return x == y;
        }
        match (a, b) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Boolean(x), Value::Boolean(y)) => x == y,
            (Value::Object(x), Value::Object(y)) => x == y,
            (Value::Boolean(x), other) => self.abstract_equals(Value::Int(i32::from(x)), other),
            (other, Value::Boolean(y)) => self.abstract_equals(other, Value::Int(i32::from(y))),
            (Value::Object(_), other) | (other, Value::Object(_)) => {
                let object = if matches!(a, Value::Object(_)) { a } else { b };
                match self.to_primitive(object, Hint::Number) {
                    Value::Object(_) => false,
                    primitive => self.abstract_equals(primitive, other),
                }
            }
            (Value::String(_), number) | (number, Value::String(_)) => {
                let text = if matches!(a, Value::String(_)) { a } else { b };
                let x = self.to_number(text);
                number.as_f64() == Some(x)
            }
            _ => false,
        }
    }

    /// Strict equality (`===`): no coercion besides number forms.
    pub fn strict_equals(&self, a: Value, b: Value) -> bool {
        match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        }
    }

    /// `a < b`; `None` when either side is `NaN`.
    pub fn less_than(&mut self, a: Value, b: Value) -> Option<bool> {
        let a = self.to_primitive(a, Hint::Number);
        let b = self.to_primitive(b, Hint::Number);
        if let (Value::String(x), Value::String(y)) = (a, b) {
            return Some(*self.heap.string(x) < *self.heap.string(y));
        }
        let x = self.to_number(a);
        let y = self.to_number(b);
        if x.is_nan() || y.is_nan() {
            None
        } else {
            Some(x < y)
        }
    }

    pub fn type_of(&mut self, value: Value) -> &'static str {
        match value {
            Value::Object(id) if self.is_function(id) => "function",
            Value::Object(id) if self.movie().is_movie(id) => "movieclip",
            other => other.type_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_depends_on_version() {
        let mut v6 = Context::startup(6);
        assert_eq!(v6.to_number(Value::Undefined), 0.0);
        assert_eq!(&*v6.to_rust_string(Value::Undefined), "");
        let mut v7 = Context::startup(7);
        assert!(v7.to_number(Value::Undefined).is_nan());
        assert_eq!(&*v7.to_rust_string(Value::Undefined), "undefined");
    }

    #[test]
    fn string_truthiness_changed_in_version_7() {
        let mut v6 = Context::startup(6);
        let text = v6.new_string("abc");
        assert!(!v6.to_boolean(text));
        let one = v6.new_string("1");
        assert!(v6.to_boolean(one));
        let mut v7 = Context::startup(7);
        let text = v7.new_string("abc");
        assert!(v7.to_boolean(text));
    }

    #[test]
    fn loose_and_strict_equality() {
        let mut context = Context::startup(8);
        let five = context.new_string("5");
        assert!(context.abstract_equals(five, Value::Int(5)));
        assert!(!context.strict_equals(five, Value::Int(5)));
        assert!(context.abstract_equals(Value::Null, Value::Undefined));
        assert!(!context.strict_equals(Value::Null, Value::Undefined));
        assert!(context.abstract_equals(Value::Boolean(true), Value::Number(1.0)));
        assert!(context.strict_equals(Value::Int(2), Value::Number(2.0)));
        assert!(!context.strict_equals(Value::Number(f64::NAN), Value::Number(f64::NAN)));
    }

    #[test]
    fn objects_convert_through_their_methods() {
        let mut context = Context::startup(8);
        let object = context.new_object();
        assert_eq!(&*context.to_rust_string(Value::Object(object)), "[object Object]");
        let array = context.new_array(&[Value::Int(1), Value::Int(2)]);
        assert_eq!(&*context.to_rust_string(Value::Object(array)), "1,2");
    }

    #[test]
    fn numbers_format_through_interning() {
        let mut context = Context::startup(8);
        let id = context.to_string_id(Value::Number(0.5));
        assert_eq!(&*context.string(id), "0.5");
        assert_eq!(context.to_string_id(Value::Int(12)), context.get_string("12"));
        assert_eq!(context.less_than(Value::Int(1), Value::Number(f64::NAN)), None);
        let a = context.new_string("a");
        let b = context.new_string("b");
        assert_eq!(context.less_than(a, b), Some(true));
    }
}
