use crate::{Context, ObjectId, Value, function::ConstructKind};

use super::{NativeDesc, array::length_of, define_constructor, define_methods};

fn function_constructor(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    match (this, args.first()) {
        (_, Some(&Value::Object(id))) => Value::Object(id),
        (Some(this), _) if ctx.is_constructing() => Value::Object(this),
        _ => Value::Undefined,
    }
}

/// The `this` argument of `call`/`apply`. Primitives and `null` leave the
/// callee without one.
fn receiver(value: Option<&Value>) -> Option<ObjectId> {
    value.and_then(|v| v.as_object())
}

fn call(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let Some(function) = this else {
        return Value::Undefined;
    };
    let rest = args.get(1..).unwrap_or_default();
    ctx.call_function(function, receiver(args.first()), rest)
}

fn apply(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let Some(function) = this else {
        return Value::Undefined;
    };
    let list = match args.get(1) {
        Some(&Value::Object(array)) => {
            let length = length_of(ctx, array);
            (0..length)
                .map(|i| {
                    let key = ctx.index_key(i);
                    ctx.get_member(array, key).unwrap_or_default()
                })
                .collect()
        }
        _ => Vec::new(),
    };
    ctx.call_function(function, receiver(args.first()), &list)
}

fn to_string(ctx: &mut Context, _: Option<ObjectId>, _: &[Value]) -> Value {
    Value::String(ctx.names.type_function)
}

const FUNCTION_METHODS: &[NativeDesc] = &[
    NativeDesc::new("call", 0, call),
    NativeDesc::new("apply", 0, apply),
    NativeDesc::new("toString", 0, to_string),
];

pub(super) fn install(ctx: &mut Context) {
    let prototype = ctx.specials.function_prototype;
    define_constructor(ctx, "Function", function_constructor, ConstructKind::Object, prototype);
    define_methods(ctx, prototype, FUNCTION_METHODS);
}
