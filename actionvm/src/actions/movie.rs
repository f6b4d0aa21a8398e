//! Legacy movie-control actions. Everything display-related is forwarded
//! to the context's [`MovieHost`](crate::MovieHost); the engine only
//! resolves targets and decodes arguments.

use crate::{
    ActionResult, ArgReader, Context, ObjectId, ScriptError, Value,
    action::decode_action,
    frame::ReturnMode,
    movie::{DragConstraint, PROPERTY_NAMES},
};

type Result = std::result::Result<ActionResult, ScriptError>;

/// `GetURL2` flag bits beyond the send method.
const LOAD_TARGET: u8 = 0x40;
const LOAD_VARIABLES: u8 = 0x80;

/// `GotoFrame2` flag bits.
const GOTO_PLAY: u8 = 0x01;
const GOTO_SCENE_BIAS: u8 = 0x02;

pub fn next_frame(ctx: &mut Context, _: &[u8]) -> Result {
    let target = ctx.current_target();
    ctx.movie().next_frame(target);
    Ok(ActionResult::Continue)
}

pub fn previous_frame(ctx: &mut Context, _: &[u8]) -> Result {
    let target = ctx.current_target();
    ctx.movie().previous_frame(target);
    Ok(ActionResult::Continue)
}

pub fn play(ctx: &mut Context, _: &[u8]) -> Result {
    let target = ctx.current_target();
    ctx.movie().play(target);
    Ok(ActionResult::Continue)
}

pub fn stop(ctx: &mut Context, _: &[u8]) -> Result {
    let target = ctx.current_target();
    ctx.movie().stop(target);
    Ok(ActionResult::Continue)
}

pub fn toggle_quality(ctx: &mut Context, _: &[u8]) -> Result {
    ctx.movie().toggle_quality();
    Ok(ActionResult::Continue)
}

pub fn stop_sounds(ctx: &mut Context, _: &[u8]) -> Result {
    ctx.movie().stop_sounds();
    Ok(ActionResult::Continue)
}

/// Resolves a target given as a path string or an object. An empty path
/// is the current target.
fn target_of(ctx: &mut Context, value: Value) -> Option<ObjectId> {
    match value {
        Value::Object(id) => Some(id),
        Value::Undefined => Some(ctx.current_target()),
        value => {
            let path = ctx.to_rust_string(value);
            if path.is_empty() {
                Some(ctx.current_target())
            } else {
                ctx.resolve_target(None, &path)
            }
        }
    }
}

/// Frame numbers in actions are zero-based; `GotoFrame2` numbers are one
/// based, so callers subtract one first.
pub fn goto_frame(ctx: &mut Context, args: &[u8]) -> Result {
    let frame = ArgReader::new("GotoFrame", args).u16()?;
    let target = ctx.current_target();
    ctx.movie().goto_frame(target, u32::from(frame), false);
    Ok(ActionResult::Continue)
}

pub fn goto_label(ctx: &mut Context, args: &[u8]) -> Result {
    let label = ArgReader::new("GotoLabel", args).string()?;
    let target = ctx.current_target();
    ctx.movie().goto_label(target, &label, false);
    Ok(ActionResult::Continue)
}

pub fn goto_frame2(ctx: &mut Context, args: &[u8]) -> Result {
    let mut reader = ArgReader::new("GotoFrame2", args);
    let flags = reader.u8()?;
    let bias = if flags & GOTO_SCENE_BIAS != 0 {
        u32::from(reader.u16()?)
    } else {
        0
    };
    let play = flags & GOTO_PLAY != 0;
    let frame = ctx.pop();
    let (target, frame) = match frame {
        Value::String(_) => {
            let text = ctx.to_rust_string(frame);
            match text.rsplit_once(':') {
                Some((path, frame)) => (ctx.resolve_target(None, path), ctx.new_string(frame)),
                None => (Some(ctx.current_target()), frame),
            }
        }
        frame => (Some(ctx.current_target()), frame),
    };
    let Some(target) = target else {
        log::debug!("GotoFrame2: unknown target");
        return Ok(ActionResult::Continue);
    };
    let label = match frame {
        Value::String(_) => {
            let text = ctx.to_rust_string(frame);
            text.parse::<u32>().is_err().then_some(text)
        }
        _ => None,
    };
    match label {
        Some(label) => ctx.movie().goto_label(target, &label, play),
        None => {
            let number = ctx.to_integer(frame);
            let index = (number.max(1) as u32 - 1).saturating_add(bias);
            ctx.movie().goto_frame(target, index, play);
        }
    }
    Ok(ActionResult::Continue)
}

pub fn get_url(ctx: &mut Context, args: &[u8]) -> Result {
    let mut reader = ArgReader::new("GetURL", args);
    let url = reader.string()?;
    let window = reader.string()?;
    ctx.movie().get_url(&url, &window, 0);
    Ok(ActionResult::Continue)
}

pub fn get_url2(ctx: &mut Context, args: &[u8]) -> Result {
    let flags = ArgReader::new("GetURL2", args).u8()?;
    let window = ctx.pop_string();
    let url = ctx.pop_string();
    if flags & (LOAD_TARGET | LOAD_VARIABLES) != 0 {
        log::debug!("GetURL2 flags 0x{flags:02X} forwarded as method only");
    }
    let (url, window) = (ctx.string(url), ctx.string(window));
    ctx.movie().get_url(&url, &window, flags & 0x03);
    Ok(ActionResult::Continue)
}

/// Jumps over the next `count` actions.
fn skip_actions(ctx: &Context, count: u8) -> Result {
    let Some(frame) = ctx.current_script_frame() else {
        return Ok(ActionResult::Continue);
    };
    let script = &frame.script;
    let mut pc = frame.pc;
    for _ in 0..count {
        if pc >= script.end() {
            break;
        }
        pc = decode_action(script.buffer(), pc, script.end())?.next;
    }
    Ok(ActionResult::Jump(pc))
}

pub fn wait_for_frame(ctx: &mut Context, args: &[u8]) -> Result {
    let mut reader = ArgReader::new("WaitForFrame", args);
    let frame = reader.u16()?;
    let skip = reader.u8()?;
    let target = ctx.current_target();
    if ctx.movie().frame_loaded(target, u32::from(frame)) {
        Ok(ActionResult::Continue)
    } else {
        skip_actions(ctx, skip)
    }
}

pub fn wait_for_frame2(ctx: &mut Context, args: &[u8]) -> Result {
    let skip = ArgReader::new("WaitForFrame2", args).u8()?;
    let frame = ctx.pop_integer().max(1) as u32 - 1;
    let target = ctx.current_target();
    if ctx.movie().frame_loaded(target, frame) {
        Ok(ActionResult::Continue)
    } else {
        skip_actions(ctx, skip)
    }
}

/// Retargets the frame. An empty name restores the original target; an
/// unresolvable one leaves the original target in place.
fn retarget(ctx: &mut Context, target: Option<ObjectId>) {
    if let Some(frame) = ctx.current_script_frame_mut() {
        frame.target = target.or(frame.original_target);
    }
}

pub fn set_target(ctx: &mut Context, args: &[u8]) -> Result {
    let name = ArgReader::new("SetTarget", args).string()?;
    let target = if name.is_empty() {
        None
    } else {
        let from = ctx.current_script_frame().and_then(|f| f.original_target);
        let found = ctx.resolve_target(from, &name);
        if found.is_none() {
            log::debug!("SetTarget: no target {name}");
        }
        found
    };
    retarget(ctx, target);
    Ok(ActionResult::Continue)
}

pub fn set_target2(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    let target = match value {
        Value::Object(id) => Some(id),
        value => {
            let name = ctx.to_rust_string(value);
            if name.is_empty() {
                None
            } else {
                let from = ctx.current_script_frame().and_then(|f| f.original_target);
                ctx.resolve_target(from, &name)
            }
        }
    };
    retarget(ctx, target);
    Ok(ActionResult::Continue)
}

pub fn get_property(ctx: &mut Context, _: &[u8]) -> Result {
    let index = ctx.pop_integer();
    let target = ctx.pop();
    let value = match target_of(ctx, target) {
        Some(target) => match ctx.movie().get_property(target, index as u32) {
            Some(value) => value,
            None => match PROPERTY_NAMES.get(index as usize) {
                Some(name) => ctx.get(target, name),
                None => Value::Undefined,
            },
        },
        None => Value::Undefined,
    };
    ctx.push(value);
    Ok(ActionResult::Continue)
}

pub fn set_property(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    let index = ctx.pop_integer();
    let target = ctx.pop();
    let Some(target) = target_of(ctx, target) else {
        return Ok(ActionResult::Continue);
    };
    if !ctx.movie().set_property(target, index as u32, value) {
        match PROPERTY_NAMES.get(index as usize) {
            Some(name) => ctx.set(target, name, value),
            None => log::debug!("SetProperty: no property {index}"),
        }
    }
    Ok(ActionResult::Continue)
}

pub fn clone_sprite(ctx: &mut Context, _: &[u8]) -> Result {
    let depth = ctx.pop_integer();
    let name = ctx.pop_string();
    let source = ctx.pop();
    match target_of(ctx, source) {
        Some(source) => {
            let name = ctx.string(name);
            ctx.movie().clone_sprite(source, &name, depth);
        }
        None => log::debug!("CloneSprite: unknown source"),
    }
    Ok(ActionResult::Continue)
}

pub fn remove_sprite(ctx: &mut Context, _: &[u8]) -> Result {
    let target = ctx.pop();
    if let Some(target) = target_of(ctx, target) {
        ctx.movie().remove_sprite(target);
    }
    Ok(ActionResult::Continue)
}

pub fn trace(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    let text = ctx.to_rust_string(value);
    ctx.trace(text.to_string());
    Ok(ActionResult::Continue)
}

pub fn start_drag(ctx: &mut Context, _: &[u8]) -> Result {
    let target = ctx.pop();
    let lock_center = {
        let value = ctx.pop();
        ctx.to_boolean(value)
    };
    let constrained = {
        let value = ctx.pop();
        ctx.to_boolean(value)
    };
    let constraint = constrained.then(|| {
        let bottom = ctx.pop_number();
        let right = ctx.pop_number();
        let top = ctx.pop_number();
        let left = ctx.pop_number();
        DragConstraint {
            left,
            top,
            right,
            bottom,
        }
    });
    if let Some(target) = target_of(ctx, target) {
        ctx.movie().start_drag(target, lock_center, constraint);
    }
    Ok(ActionResult::Continue)
}

pub fn end_drag(ctx: &mut Context, _: &[u8]) -> Result {
    ctx.movie().end_drag();
    Ok(ActionResult::Continue)
}

pub fn target_path(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    let path = match value {
        Value::Object(id) => ctx.movie().target_path(id),
        _ => None,
    };
    let result = match path {
        Some(path) => Value::String(ctx.give_string(path)),
        None => Value::Undefined,
    };
    ctx.push(result);
    Ok(ActionResult::Continue)
}

/// Runs the actions of another frame, `target:frame` or just `frame` on
/// the current target, as a nested script.
pub fn call(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    let text = ctx.to_rust_string(value);
    let (target, frame) = match text.rsplit_once(':') {
        Some((path, frame)) => (ctx.resolve_target(None, path), frame),
        None => (Some(ctx.current_target()), &*text),
    };
    let Some(target) = target else {
        log::debug!("Call: unknown target in {text}");
        return Ok(ActionResult::Continue);
    };
    match ctx.movie().frame_script(target, frame) {
        Some(script) => {
            ctx.push_script_frame(script, Some(target), None, ReturnMode::Discard);
        }
        None => log::debug!("Call: no actions for frame {frame}"),
    }
    Ok(ActionResult::Continue)
}
