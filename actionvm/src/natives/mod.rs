//! Built-in objects installed into every context.

use crate::{Context, NativeFn, ObjectId, PropFlags, Value, function::ConstructKind};

pub(crate) mod array;
mod function;
mod global;
mod object;

#[derive(Clone, Copy)]
pub struct NativeDesc {
    pub name: &'static str,
    pub min_args: usize,
    pub func: NativeFn,
}

impl NativeDesc {
    pub const fn new(name: &'static str, min_args: usize, func: NativeFn) -> Self {
        Self {
            name,
            min_args,
            func,
        }
    }
}

pub(crate) fn install(ctx: &mut Context) {
    object::install(ctx);
    function::install(ctx);
    array::install(ctx);
    global::install(ctx);
}

/// Defines every entry of `methods` on `target` as a hidden property.
pub(crate) fn define_methods(ctx: &mut Context, target: ObjectId, methods: &[NativeDesc]) {
    for desc in methods {
        let function = ctx.new_native_function(desc.name, desc.min_args, desc.func, ConstructKind::Object);
        ctx.define_hidden(target, desc.name, Value::Object(function));
    }
}

pub(crate) fn define_constant(ctx: &mut Context, target: ObjectId, name: &str, value: Value) {
    let key = ctx.heap.intern_static(name);
    ctx.define_property(
        target,
        key,
        value,
        PropFlags::HIDDEN | PropFlags::PERMANENT | PropFlags::READONLY,
    );
}

/// Creates a constructor bound to `prototype` and publishes it on the
/// global object under `name`.
pub(crate) fn define_constructor(
    ctx: &mut Context,
    name: &'static str,
    func: NativeFn,
    kind: ConstructKind,
    prototype: ObjectId,
) -> ObjectId {
    let constructor = ctx.new_native_function(name, 0, func, kind);
    let key = ctx.names.prototype;
    ctx.define_property(constructor, key, Value::Object(prototype), PropFlags::HIDDEN);
    let key = ctx.names.constructor;
    ctx.define_property(prototype, key, Value::Object(constructor), PropFlags::HIDDEN);
    let global = ctx.global();
    ctx.define_hidden(global, name, Value::Object(constructor));
    constructor
}

/// `this`, or `undefined` when called without one.
pub(crate) fn this_value(this: Option<ObjectId>) -> Value {
    this.map_or(Value::Undefined, Value::Object)
}

#[cfg(test)]
mod tests {
    use crate::{Context, Value};

    #[test]
    fn constructors_link_their_prototypes() {
        let mut ctx = Context::startup(8);
        let global = ctx.global();
        for (name, prototype) in [
            ("Object", ctx.specials().object_prototype),
            ("Function", ctx.specials().function_prototype),
            ("Array", ctx.specials().array_prototype),
        ] {
            let Value::Object(constructor) = ctx.get(global, name) else {
                panic!("{name} is installed");
            };
            assert_eq!(ctx.get(constructor, "prototype"), Value::Object(prototype));
            assert_eq!(ctx.get(prototype, "constructor"), Value::Object(constructor));
        }
    }

    #[test]
    fn built_ins_are_not_enumerable() {
        let ctx = Context::startup(8);
        assert!(ctx.enumerate(ctx.global()).is_empty());
    }
}
