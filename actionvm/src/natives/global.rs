use crate::{
    Context, ObjectId, PropFlags, StringId, Value,
    number::{parse_float_prefix, parse_int_prefix},
};

use super::{NativeDesc, array::length_of, define_constant, define_methods};

/// Names selected by the second argument of `ASSetPropFlags`: `null` means
/// every own property, a string is a comma-separated list.
fn selected_names(ctx: &mut Context, object: ObjectId, names: Value) -> Vec<StringId> {
    match names {
        Value::Null | Value::Undefined => ctx
            .heap
            .object(object)
            .map(|o| o.properties.keys().copied().collect())
            .unwrap_or_default(),
        Value::Object(list) if ctx.is_array(list) => {
            let length = length_of(ctx, list);
            (0..length)
                .map(|i| {
                    let key = ctx.index_key(i);
                    let value = ctx.get_member(list, key).unwrap_or_default();
                    ctx.to_string_id(value)
                })
                .collect()
        }
        names => {
            let text = ctx.to_rust_string(names);
            text.split(',')
                .filter(|name| !name.is_empty())
                .map(|name| ctx.get_string(name))
                .collect()
        }
    }
}

/// `ASSetPropFlags(object, names, set, clear)`.
fn as_set_prop_flags(ctx: &mut Context, _: Option<ObjectId>, args: &[Value]) -> Value {
    let Value::Object(object) = args[0] else {
        return Value::Undefined;
    };
    let names = selected_names(ctx, object, args[1]);
    let set = PropFlags::from_bits_truncate(ctx.to_integer(args[2]) as u16);
    let clear = match args.get(3) {
        Some(&clear) => PropFlags::from_bits_truncate(ctx.to_integer(clear) as u16),
        None => PropFlags::empty(),
    };
    for name in names {
        let Some(found) = ctx.find_own(object, name) else {
            continue;
        };
        if let Some(property) = ctx.heap.object_mut(object).and_then(|o| o.own_mut(found)) {
            property.flags = (property.flags - clear) | set;
        }
    }
    Value::Undefined
}

fn is_nan(ctx: &mut Context, _: Option<ObjectId>, args: &[Value]) -> Value {
    Value::Boolean(ctx.to_number(args[0]).is_nan())
}

fn is_finite(ctx: &mut Context, _: Option<ObjectId>, args: &[Value]) -> Value {
    Value::Boolean(ctx.to_number(args[0]).is_finite())
}

fn parse_int(ctx: &mut Context, _: Option<ObjectId>, args: &[Value]) -> Value {
    let text = ctx.to_rust_string(args[0]);
    let radix = match args.get(1) {
        Some(&radix) if !radix.is_undefined() => Some(ctx.to_integer(radix).max(0) as u32),
        _ => None,
    };
    Value::number(parse_int_prefix(&text, radix))
}

fn parse_float(ctx: &mut Context, _: Option<ObjectId>, args: &[Value]) -> Value {
    let text = ctx.to_rust_string(args[0]);
    Value::number(parse_float_prefix(&text))
}

const GLOBAL_FUNCTIONS: &[NativeDesc] = &[
    NativeDesc::new("ASSetPropFlags", 3, as_set_prop_flags),
    NativeDesc::new("isNaN", 1, is_nan),
    NativeDesc::new("isFinite", 1, is_finite),
    NativeDesc::new("parseInt", 1, parse_int),
    NativeDesc::new("parseFloat", 1, parse_float),
];

pub(super) fn install(ctx: &mut Context) {
    let global = ctx.global();
    define_methods(ctx, global, GLOBAL_FUNCTIONS);
    define_constant(ctx, global, "NaN", Value::Number(f64::NAN));
    define_constant(ctx, global, "Infinity", Value::Number(f64::INFINITY));
}

#[cfg(test)]
mod tests {
    use crate::{Context, Value};

    fn call(ctx: &mut Context, name: &str, args: &[Value]) -> Value {
        let global = ctx.global();
        ctx.call_method(global, name, args)
    }

    #[test]
    fn prop_flags_hide_and_protect() {
        let mut ctx = Context::startup(8);
        let object = ctx.new_object();
        ctx.set(object, "a", Value::Int(1));
        ctx.set(object, "b", Value::Int(2));
        let names = ctx.new_string("a");
        call(&mut ctx, "ASSetPropFlags", &[Value::Object(object), names, Value::Int(1 | 4)]);
        let listed: Vec<String> = ctx
            .enumerate(object)
            .into_iter()
            .map(|k| ctx.string(k).to_string())
            .collect();
        assert_eq!(listed, ["b"]);
        ctx.set(object, "a", Value::Int(5));
        assert_eq!(ctx.get(object, "a"), Value::Int(1));

        call(&mut ctx, "ASSetPropFlags", &[Value::Object(object), Value::Null, Value::Int(0), Value::Int(7)]);
        ctx.set(object, "a", Value::Int(5));
        assert_eq!(ctx.get(object, "a"), Value::Int(5));
        assert_eq!(ctx.enumerate(object).len(), 2);
    }

    #[test]
    fn number_parsing_functions() {
        let mut ctx = Context::startup(8);
        let text = ctx.new_string("42px");
        assert_eq!(call(&mut ctx, "parseInt", &[text]), Value::Int(42));
        let hex = ctx.new_string("ff");
        assert_eq!(call(&mut ctx, "parseInt", &[hex, Value::Int(16)]), Value::Int(255));
        let float = ctx.new_string("3.5e1x");
        assert_eq!(call(&mut ctx, "parseFloat", &[float]), Value::Int(35));
        let word = ctx.new_string("abc");
        assert_eq!(call(&mut ctx, "isNaN", &[word]), Value::Boolean(true));
        assert_eq!(call(&mut ctx, "isFinite", &[Value::Int(1)]), Value::Boolean(true));
    }

    #[test]
    fn missing_arguments_yield_undefined() {
        let mut ctx = Context::startup(8);
        assert_eq!(call(&mut ctx, "isNaN", &[]), Value::Undefined);
    }
}
