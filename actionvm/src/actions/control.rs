use std::rc::Rc;

use crate::{
    ActionResult, ArgReader, Context, ObjectId, Script, ScriptArgument, ScriptError,
    ScriptFunction, Value,
    frame::{BlockKind, CatchTarget, ReturnMode, TryBlock},
    script::{DEFAULT_REGISTERS, FunctionFlags},
};

type Result = std::result::Result<ActionResult, ScriptError>;

fn next_pc(ctx: &Context) -> usize {
    ctx.current_script_frame().map_or(0, |f| f.pc)
}

fn relative(ctx: &Context, offset: i16) -> Result {
    let base = next_pc(ctx);
    match base.checked_add_signed(isize::from(offset)) {
        Some(target) => Ok(ActionResult::Jump(target)),
        None => Err(ScriptError::JumpOutOfRange {
            target: 0,
            start: 0,
            end: base,
        }),
    }
}

pub fn jump(ctx: &mut Context, args: &[u8]) -> Result {
    let offset = ArgReader::new("Jump", args).i16()?;
    relative(ctx, offset)
}

pub fn if_(ctx: &mut Context, args: &[u8]) -> Result {
    let offset = ArgReader::new("If", args).i16()?;
    let condition = ctx.pop();
    if ctx.to_boolean(condition) {
        relative(ctx, offset)
    } else {
        Ok(ActionResult::Continue)
    }
}

fn call(ctx: &mut Context, function: Value, this: Option<ObjectId>, args: Vec<Value>) {
    let called = match function {
        Value::Object(function) => ctx.push_call(function, this, args, ReturnMode::Push),
        _ => false,
    };
    if !called {
        ctx.push(Value::Undefined);
    }
}

/// `this` of the running frame, if it is an object.
fn current_this(ctx: &Context) -> Option<ObjectId> {
    ctx.frames.last().and_then(|f| f.this)
}

pub fn call_function(ctx: &mut Context, _: &[u8]) -> Result {
    let name = ctx.pop_string();
    let args = ctx.pop_arguments();
    if name == ctx.names.super_ {
        let this = current_this(ctx);
        let constructor = this
            .and_then(|t| ctx.heap.object(t))
            .and_then(|o| o.prototype)
            .and_then(|proto| ctx.heap.object(proto))
            .and_then(|o| o.constructor);
        call(ctx, constructor.map_or(Value::Undefined, Value::Object), this, args);
        return Ok(ActionResult::Continue);
    }
    let function = ctx.get_variable(name).map(|(v, _)| v).unwrap_or_default();
    call(ctx, function, None, args);
    Ok(ActionResult::Continue)
}

/// `object[name](args)`. An empty or undefined name calls `object`
/// itself; methods looked up on `super` keep the current `this`.
pub fn call_method(ctx: &mut Context, _: &[u8]) -> Result {
    let name = ctx.pop();
    let object = ctx.pop();
    let args = ctx.pop_arguments();
    let key = match name {
        Value::Undefined => None,
        name => Some(ctx.to_string_id(name)).filter(|&k| k != ctx.names.empty),
    };
    let Some(key) = key else {
        call(ctx, object, None, args);
        return Ok(ActionResult::Continue);
    };
    let function = ctx.get_value_member(object, key);
    let this = match (object, current_this(ctx)) {
        (Value::Object(id), Some(this)) if ctx.super_of(this) == Some(id) => Some(this),
        (Value::Object(id), _) => Some(id),
        _ => None,
    };
    call(ctx, function, this, args);
    Ok(ActionResult::Continue)
}

pub fn return_(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    ctx.return_from_frame(value);
    Ok(ActionResult::Continue)
}

pub fn throw(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    log::debug!("throw {}", value.type_name());
    ctx.exception = Some(value);
    Ok(ActionResult::Continue)
}

/// What the two definition actions declare about a function.
struct Definition {
    name: String,
    arguments: Vec<ScriptArgument>,
    n_registers: u16,
    flags: FunctionFlags,
    size: usize,
}

/// Wraps the body following the definition action and binds it by name,
/// or pushes it when anonymous. Execution continues after the body.
fn finish_definition(ctx: &mut Context, definition: Definition) -> Result {
    let Some(frame) = ctx.current_script_frame() else {
        return Ok(ActionResult::Continue);
    };
    let start = frame.pc;
    let end = start + definition.size;
    if end > frame.script.end() {
        return Err(ScriptError::Truncated {
            pc: start,
            end: frame.script.end(),
        });
    }
    let mut body = Script::function(
        definition.name.clone(),
        frame.script.version,
        frame.script.buffer().clone(),
        start,
        end,
    );
    body.n_registers = definition.n_registers;
    body.arguments = definition.arguments;
    body.flags = definition.flags;
    body.constant_pool = frame.constant_pool.clone();
    let function = ScriptFunction {
        script: Rc::new(body),
        scope_chain: frame.scope_chain.clone(),
        target: frame.target,
    };
    let id = ctx.new_script_function(function);
    if definition.name.is_empty() {
        ctx.push(Value::Object(id));
    } else {
        let key = ctx.give_string(definition.name);
        ctx.define_local(key, Value::Object(id));
    }
    Ok(ActionResult::Jump(end))
}

pub fn define_function(ctx: &mut Context, args: &[u8]) -> Result {
    let mut reader = ArgReader::new("DefineFunction", args);
    let name = reader.string()?;
    let count = reader.u16()?;
    let mut arguments = Vec::with_capacity(count as usize);
    for _ in 0..count {
        arguments.push(ScriptArgument {
            name: reader.string()?,
            register: 0,
        });
    }
    let size = reader.u16()? as usize;
    finish_definition(
        ctx,
        Definition {
            name,
            arguments,
            n_registers: DEFAULT_REGISTERS,
            flags: FunctionFlags::empty(),
            size,
        },
    )
}

pub fn define_function2(ctx: &mut Context, args: &[u8]) -> Result {
    let mut reader = ArgReader::new("DefineFunction2", args);
    let name = reader.string()?;
    let count = reader.u16()?;
    let n_registers = u16::from(reader.u8()?);
    let flags = FunctionFlags::from_bits_truncate(reader.u16()?);
    let mut arguments = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let register = reader.u8()?;
        arguments.push(ScriptArgument {
            name: reader.string()?,
            register,
        });
    }
    let size = reader.u16()? as usize;
    finish_definition(
        ctx,
        Definition {
            name,
            arguments,
            n_registers,
            flags,
            size,
        },
    )
}

/// Pushes the object onto the scope chain for the next `size` bytes.
pub fn with(ctx: &mut Context, args: &[u8]) -> Result {
    let size = ArgReader::new("With", args).u16()? as usize;
    let object = ctx.pop();
    let Value::Object(object) = object else {
        log::debug!("With on {}", object.type_name());
        return Ok(ActionResult::Continue);
    };
    let start = next_pc(ctx);
    if let Some(frame) = ctx.current_script_frame_mut() {
        frame.scope_chain.push(object);
    }
    ctx.push_block(start, start + size, BlockKind::With);
    Ok(ActionResult::Continue)
}

pub(crate) mod try_flags {
    pub const CATCH: u8 = 0x01;
    pub const FINALLY: u8 = 0x02;
    pub const CATCH_IN_REGISTER: u8 = 0x04;
}

pub fn try_(ctx: &mut Context, args: &[u8]) -> Result {
    let mut reader = ArgReader::new("Try", args);
    let flags = reader.u8()?;
    let try_size = reader.u16()? as usize;
    let catch_size = reader.u16()? as usize;
    let finally_size = reader.u16()? as usize;
    let catch_target = if flags & try_flags::CATCH_IN_REGISTER != 0 {
        CatchTarget::Register(reader.u8()?)
    } else {
        let name = reader.string()?;
        CatchTarget::Variable(ctx.give_string(name))
    };
    let start = next_pc(ctx);
    let catch_start = start + try_size;
    let finally_start = catch_start + catch_size;
    let block = TryBlock {
        catch_start,
        finally_start,
        end: finally_start + finally_size,
        has_catch: flags & try_flags::CATCH != 0,
        has_finally: flags & try_flags::FINALLY != 0,
        catch_target,
    };
    ctx.push_block(start, catch_start, BlockKind::Try(block));
    Ok(ActionResult::Continue)
}
