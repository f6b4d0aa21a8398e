use crate::{Context, ObjectId, PropFlags, Value, function::ConstructKind};

use super::{NativeDesc, define_constructor, define_methods, this_value};

/// `Object(value)` wraps nothing: objects pass through, anything else
/// yields a fresh plain object.
fn object_constructor(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    if let Some(&Value::Object(id)) = args.first() {
        return Value::Object(id);
    }
    match this {
        Some(this) if ctx.is_constructing() => Value::Object(this),
        _ => Value::Object(ctx.new_object()),
    }
}

fn has_own_property(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let Some(this) = this else {
        return Value::Boolean(false);
    };
    let key = ctx.to_string_id(args[0]);
    Value::Boolean(ctx.has_own_property(this, key))
}

fn is_property_enumerable(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let Some(this) = this else {
        return Value::Boolean(false);
    };
    let key = ctx.to_string_id(args[0]);
    let enumerable = ctx
        .find_own(this, key)
        .and_then(|found| ctx.heap.object(this)?.own(found))
        .is_some_and(|p| !p.flags.contains(PropFlags::HIDDEN));
    Value::Boolean(enumerable)
}

fn is_prototype_of(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let (Some(this), Value::Object(mut current)) = (this, args[0]) else {
        return Value::Boolean(false);
    };
    for _ in 0..crate::properties::MAX_PROTOTYPE_DEPTH {
        let Some(proto) = ctx.heap.object(current).and_then(|o| o.prototype) else {
            break;
        };
        if proto == this {
            return Value::Boolean(true);
        }
        current = proto;
    }
    Value::Boolean(false)
}

fn to_string(ctx: &mut Context, _: Option<ObjectId>, _: &[Value]) -> Value {
    Value::String(ctx.names.object_object)
}

fn value_of(_: &mut Context, this: Option<ObjectId>, _: &[Value]) -> Value {
    this_value(this)
}

const OBJECT_METHODS: &[NativeDesc] = &[
    NativeDesc::new("hasOwnProperty", 1, has_own_property),
    NativeDesc::new("isPropertyEnumerable", 1, is_property_enumerable),
    NativeDesc::new("isPrototypeOf", 1, is_prototype_of),
    NativeDesc::new("toString", 0, to_string),
    NativeDesc::new("valueOf", 0, value_of),
];

pub(super) fn install(ctx: &mut Context) {
    let prototype = ctx.specials.object_prototype;
    define_constructor(ctx, "Object", object_constructor, ConstructKind::Object, prototype);
    define_methods(ctx, prototype, OBJECT_METHODS);
}
