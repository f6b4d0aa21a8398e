use crate::{ActionResult, Context, ObjectId, ScriptError, StringId, Value};

type Result = std::result::Result<ActionResult, ScriptError>;

fn is_path(text: &str) -> bool {
    text.contains(['/', ':', '.'])
}

/// Splits `path` into the object holding the variable and its name.
/// `a.b.c` holds `c` on `a.b`; `/clip:x` holds `x` on `/clip`.
fn split_path(ctx: &mut Context, path: &str) -> Option<(ObjectId, StringId)> {
    let (owner, name) = if let Some((target, name)) = path.rsplit_once(':') {
        (ctx.resolve_target(None, target)?, name)
    } else if let Some((prefix, name)) = path.rsplit_once('.') {
        (ctx.eval(None, prefix).as_object()?, name)
    } else {
        let (target, name) = path.rsplit_once('/')?;
        let target = if target.is_empty() { "/" } else { target };
        (ctx.resolve_target(None, target)?, name)
    };
    Some((owner, ctx.get_string(name)))
}

pub fn get_variable(ctx: &mut Context, _: &[u8]) -> Result {
    let name = ctx.pop_string();
    let text = ctx.string(name);
    let value = if is_path(&text) {
        ctx.eval(None, &text)
    } else {
        ctx.get_variable(name).map(|(v, _)| v).unwrap_or_default()
    };
    ctx.push(value);
    Ok(ActionResult::Continue)
}

pub fn set_variable(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    let name = ctx.pop_string();
    let text = ctx.string(name);
    if is_path(&text) {
        match split_path(ctx, &text) {
            Some((owner, key)) => ctx.set_member(owner, key, value),
            None => log::debug!("SetVariable: cannot resolve {text}"),
        }
    } else {
        ctx.set_variable(name, value, true);
    }
    Ok(ActionResult::Continue)
}

pub fn define_local(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    let name = ctx.pop_string();
    ctx.define_local(name, value);
    Ok(ActionResult::Continue)
}

/// Declares a local without assigning it.
pub fn define_local2(ctx: &mut Context, _: &[u8]) -> Result {
    let name = ctx.pop_string();
    let locals = ctx
        .current_script_frame()
        .and_then(|f| f.locals)
        .unwrap_or_else(|| ctx.current_target());
    if !ctx.has_own_property(locals, name) {
        ctx.define_local(name, Value::Undefined);
    }
    Ok(ActionResult::Continue)
}

pub fn delete(ctx: &mut Context, _: &[u8]) -> Result {
    let name = ctx.pop_string();
    let object = ctx.pop();
    let deleted = match object {
        Value::Object(id) => ctx.delete_member(id, name),
        _ => false,
    };
    ctx.push(Value::Boolean(deleted));
    Ok(ActionResult::Continue)
}

/// Deletes a variable from wherever identifier resolution finds it.
pub fn delete2(ctx: &mut Context, _: &[u8]) -> Result {
    let name = ctx.pop_string();
    let deleted = match ctx.get_variable(name) {
        Some((_, Some(owner))) => ctx.delete_member(owner, name),
        _ => false,
    };
    ctx.push(Value::Boolean(deleted));
    Ok(ActionResult::Continue)
}

pub fn type_of(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    let name = ctx.type_of(value);
    let id = ctx.get_string(name);
    ctx.push(Value::String(id));
    Ok(ActionResult::Continue)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{Context, PushValue, ScriptBuilder, Value};

    #[test]
    fn variables_default_to_the_target() {
        let mut context = Context::startup(8);
        let mut builder = ScriptBuilder::new(8);
        builder
            .push([PushValue::from("score"), PushValue::Int(7)])
            .set_variable()
            .push([PushValue::from("score")])
            .get_variable();
        let values = context.execute(Rc::new(builder.build("vars")));
        assert_eq!(values, vec![Value::Int(7)]);
        let global = context.global();
        assert_eq!(context.get(global, "score"), Value::Int(7));
    }

    #[test]
    fn slash_paths_reach_nested_objects() {
        let mut context = Context::startup(8);
        let clip = context.new_object();
        let global = context.global();
        context.set(global, "clip", Value::Object(clip));
        let mut builder = ScriptBuilder::new(8);
        builder
            .push([PushValue::from("/clip:x"), PushValue::Int(3)])
            .set_variable()
            .push([PushValue::from("clip.y"), PushValue::Int(4)])
            .set_variable()
            .push([PushValue::from("/clip:y")])
            .get_variable();
        let values = context.execute(Rc::new(builder.build("paths")));
        assert_eq!(values, vec![Value::Int(4)]);
        assert_eq!(context.get(clip, "x"), Value::Int(3));
    }

    #[test]
    fn delete2_removes_resolved_variables() {
        let mut context = Context::startup(8);
        let mut builder = ScriptBuilder::new(8);
        builder
            .push([PushValue::from("gone"), PushValue::Int(1)])
            .set_variable()
            .push([PushValue::from("gone")])
            .action(0x3B)
            .push([PushValue::from("gone")])
            .get_variable()
            .action(0x44);
        let values = context.execute(Rc::new(builder.build("delete")));
        let typename = context.get_string("undefined");
        assert_eq!(values, vec![Value::Boolean(true), Value::String(typename)]);
    }
}
