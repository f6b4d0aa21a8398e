use crate::{ActionResult, Context, ObjectId, PropFlags, ScriptError, Value, frame::ReturnMode};

type Result = std::result::Result<ActionResult, ScriptError>;

pub fn get_member(ctx: &mut Context, _: &[u8]) -> Result {
    let key = ctx.pop_string();
    let object = ctx.pop();
    let value = ctx.get_value_member(object, key);
    ctx.push(value);
    Ok(ActionResult::Continue)
}

pub fn set_member(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    let key = ctx.pop_string();
    match ctx.pop() {
        Value::Object(id) => ctx.set_member(id, key, value),
        other => log::debug!("SetMember on {}", other.type_name()),
    }
    Ok(ActionResult::Continue)
}

/// Pops a count and that many values, first element on top.
pub fn init_array(ctx: &mut Context, _: &[u8]) -> Result {
    let values = ctx.pop_arguments();
    let array = ctx.new_array(&values);
    ctx.push(Value::Object(array));
    Ok(ActionResult::Continue)
}

/// Pops a count and that many value/name pairs, last pair on top. The
/// count is clamped to the pairs the frame owns.
pub fn init_object(ctx: &mut Context, _: &[u8]) -> Result {
    let requested = ctx.pop_integer().max(0) as usize;
    let available = ctx.operands_available() / 2;
    if requested > available {
        log::debug!("InitObject count {requested} exceeds the {available} pairs on the stack");
    }
    let count = requested.min(available);
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let value = ctx.pop();
        let key = ctx.pop_string();
        pairs.push((key, value));
    }
    let object = ctx.new_object();
    for (key, value) in pairs.into_iter().rev() {
        ctx.set_member(object, key, value);
    }
    ctx.push(Value::Object(object));
    Ok(ActionResult::Continue)
}

/// Pushes a `null` terminator followed by the enumerable names.
fn push_names(ctx: &mut Context, object: Value) {
    ctx.push(Value::Null);
    let Value::Object(id) = object else {
        return;
    };
    let names = ctx.enumerate(id);
    ctx.stack.ensure_free(names.len());
    for name in names {
        ctx.push(Value::String(name));
    }
}

pub fn enumerate(ctx: &mut Context, _: &[u8]) -> Result {
    let name = ctx.pop_string();
    let object = ctx.get_variable(name).map(|(v, _)| v).unwrap_or_default();
    push_names(ctx, object);
    Ok(ActionResult::Continue)
}

pub fn enumerate2(ctx: &mut Context, _: &[u8]) -> Result {
    let object = ctx.pop();
    push_names(ctx, object);
    Ok(ActionResult::Continue)
}

pub fn instance_of(ctx: &mut Context, _: &[u8]) -> Result {
    let constructor = ctx.pop();
    let object = ctx.pop();
    let result = match (object, constructor) {
        (Value::Object(object), Value::Object(constructor)) => ctx.instance_of(object, constructor),
        _ => false,
    };
    ctx.push(Value::Boolean(result));
    Ok(ActionResult::Continue)
}

/// `subclass extends superclass`: a fresh prototype chained to the
/// superclass prototype, remembering the superclass for `super()`.
pub fn extends(ctx: &mut Context, _: &[u8]) -> Result {
    let superclass = ctx.pop();
    let subclass = ctx.pop();
    let (Value::Object(superclass), Value::Object(subclass)) = (superclass, subclass) else {
        log::debug!("Extends needs two objects");
        return Ok(ActionResult::Continue);
    };
    let prototype = ctx.new_object();
    let super_prototype = ctx.get_member(superclass, ctx.names.prototype);
    if let Some(object) = ctx.heap.object_mut(prototype) {
        object.prototype = super_prototype.and_then(Value::as_object);
        object.constructor = Some(superclass);
    }
    let key = ctx.names.prototype;
    ctx.define_property(subclass, key, Value::Object(prototype), PropFlags::HIDDEN);
    Ok(ActionResult::Continue)
}

pub fn cast_op(ctx: &mut Context, _: &[u8]) -> Result {
    let object = ctx.pop();
    let constructor = ctx.pop();
    let result = match (object, constructor) {
        (Value::Object(id), Value::Object(constructor)) if ctx.instance_of(id, constructor) => object,
        _ => Value::Null,
    };
    ctx.push(result);
    Ok(ActionResult::Continue)
}

pub fn implements_op(ctx: &mut Context, _: &[u8]) -> Result {
    let constructor = ctx.pop();
    let interfaces: Vec<ObjectId> = ctx
        .pop_arguments()
        .into_iter()
        .filter_map(Value::as_object)
        .collect();
    let Value::Object(constructor) = constructor else {
        return Ok(ActionResult::Continue);
    };
    let Some(Value::Object(prototype)) = ctx.get_member(constructor, ctx.names.prototype) else {
        return Ok(ActionResult::Continue);
    };
    if let Some(object) = ctx.heap.object_mut(prototype) {
        object.interfaces.extend(interfaces);
    }
    Ok(ActionResult::Continue)
}

/// Allocates the instance and enters the constructor; the frame's return
/// pushes the instance.
fn construct(ctx: &mut Context, constructor: Value, args: Vec<Value>) {
    let Value::Object(constructor) = constructor else {
        ctx.push(Value::Undefined);
        return;
    };
    if !ctx.is_function(constructor) {
        log::debug!("new on a non-function");
        ctx.push(Value::Undefined);
        return;
    }
    let object = ctx.new_instance(constructor);
    if !ctx.push_call(constructor, Some(object), args, ReturnMode::Construct(object)) {
        ctx.push(Value::Undefined);
    }
}

pub fn new_object(ctx: &mut Context, _: &[u8]) -> Result {
    let name = ctx.pop_string();
    let args = ctx.pop_arguments();
    let constructor = ctx.get_variable(name).map(|(v, _)| v).unwrap_or_default();
    construct(ctx, constructor, args);
    Ok(ActionResult::Continue)
}

/// `new object[name](...)`; an empty or undefined name constructs the
/// object itself.
pub fn new_method(ctx: &mut Context, _: &[u8]) -> Result {
    let name = ctx.pop();
    let object = ctx.pop();
    let args = ctx.pop_arguments();
    let constructor = match name {
        Value::Undefined => object,
        name => {
            let key = ctx.to_string_id(name);
            if key == ctx.names.empty {
                object
            } else {
                ctx.get_value_member(object, key)
            }
        }
    };
    construct(ctx, constructor, args);
    Ok(ActionResult::Continue)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{Context, PushValue, ScriptBuilder, Value};

    #[test]
    fn init_object_keeps_declaration_order() {
        let mut context = Context::startup(8);
        let mut builder = ScriptBuilder::new(8);
        builder
            .push([
                PushValue::from("a"),
                PushValue::Int(1),
                PushValue::from("b"),
                PushValue::Int(2),
                PushValue::Int(2),
            ])
            .init_object();
        let values = context.execute(Rc::new(builder.build("object")));
        let Value::Object(object) = values[0] else {
            panic!("expected an object");
        };
        assert_eq!(context.get(object, "a"), Value::Int(1));
        assert_eq!(context.get(object, "b"), Value::Int(2));
        let names: Vec<String> = context
            .enumerate(object)
            .into_iter()
            .map(|k| context.string(k).to_string())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn init_object_clamps_its_count_to_the_stack() {
        let mut context = Context::startup(8);
        let mut builder = ScriptBuilder::new(8);
        builder
            .push([PushValue::from("a"), PushValue::Int(1), PushValue::Int(i32::MAX)])
            .init_object();
        let values = context.execute(Rc::new(builder.build("object")));
        assert_eq!(values.len(), 1);
        let Value::Object(object) = values[0] else {
            panic!("expected an object");
        };
        assert_eq!(context.get(object, "a"), Value::Int(1));
    }

    #[test]
    fn enumerate_pushes_a_terminator() {
        let mut context = Context::startup(8);
        let mut builder = ScriptBuilder::new(8);
        builder
            .push([PushValue::from("x"), PushValue::Int(1), PushValue::Int(1)])
            .init_object()
            .action(0x55);
        let values = context.execute(Rc::new(builder.build("enumerate")));
        let x = context.get_string("x");
        assert_eq!(values, vec![Value::Null, Value::String(x)]);
    }

    #[test]
    fn extends_chains_prototypes() {
        let mut context = Context::startup(8);
        let mut builder = ScriptBuilder::new(8);
        builder.define_function("Base", &[], |_| {});
        builder.define_function("Derived", &[], |_| {});
        builder
            .push([PushValue::from("Derived")])
            .get_variable()
            .push([PushValue::from("Base")])
            .get_variable()
            .action(0x69)
            .push([PushValue::Int(0), PushValue::from("Derived")])
            .new_object()
            .push([PushValue::from("Base")])
            .get_variable()
            .action(0x54);
        let values = context.execute(Rc::new(builder.build("extends")));
        assert_eq!(values, vec![Value::Boolean(true)]);
    }
}
