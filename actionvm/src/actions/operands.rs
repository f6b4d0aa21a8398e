use std::rc::Rc;

use crate::{ActionResult, ArgReader, Context, ScriptError, Value};

type Result = std::result::Result<ActionResult, ScriptError>;

/// Push record type tags.
pub(crate) mod record {
    pub const STRING: u8 = 0;
    pub const FLOAT: u8 = 1;
    pub const NULL: u8 = 2;
    pub const UNDEFINED: u8 = 3;
    pub const REGISTER: u8 = 4;
    pub const BOOLEAN: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const INT: u8 = 7;
    pub const CONSTANT8: u8 = 8;
    pub const CONSTANT16: u8 = 9;
}

pub fn push(ctx: &mut Context, args: &[u8]) -> Result {
    let mut reader = ArgReader::new("Push", args);
    while !reader.is_empty() {
        let value = match reader.u8()? {
            record::STRING => {
                let text = reader.string()?;
                Value::String(ctx.heap.intern_owned(text))
            }
            record::FLOAT => Value::number(f64::from(reader.f32()?)),
            record::NULL => Value::Null,
            record::UNDEFINED => Value::Undefined,
            record::REGISTER => {
                let index = reader.u8()? as usize;
                match ctx.current_script_frame().and_then(|f| f.register(index)) {
                    Some(value) => value,
                    None => {
                        log::warn!("Push: register {index} out of range");
                        Value::Undefined
                    }
                }
            }
            record::BOOLEAN => Value::Boolean(reader.u8()? != 0),
            record::DOUBLE => Value::number(reader.f64_swapped()?),
            record::INT => Value::Int(reader.i32()?),
            kind @ (record::CONSTANT8 | record::CONSTANT16) => {
                let index = if kind == record::CONSTANT8 {
                    reader.u8()? as usize
                } else {
                    reader.u16()? as usize
                };
                match ctx.current_script_frame().and_then(|f| f.constants.get(index).copied()) {
                    Some(id) => Value::String(id),
                    None => {
                        log::warn!("Push: constant {index} out of range");
                        Value::Undefined
                    }
                }
            }
            _ => return Err(ScriptError::malformed("Push", "unknown record type")),
        };
        ctx.push(value);
    }
    Ok(ActionResult::Continue)
}

pub fn pop(ctx: &mut Context, _: &[u8]) -> Result {
    ctx.pop();
    Ok(ActionResult::Continue)
}

pub fn push_duplicate(ctx: &mut Context, _: &[u8]) -> Result {
    let top = ctx.stack.peek(0).unwrap_or_default();
    ctx.push(top);
    Ok(ActionResult::Continue)
}

pub fn stack_swap(ctx: &mut Context, _: &[u8]) -> Result {
    ctx.stack.swap(0, 1);
    Ok(ActionResult::Continue)
}

/// Copies the top of the stack into a register without popping it.
pub fn store_register(ctx: &mut Context, args: &[u8]) -> Result {
    let index = ArgReader::new("StoreRegister", args).u8()? as usize;
    let value = ctx.stack.peek(0).unwrap_or_default();
    let stored = ctx
        .current_script_frame_mut()
        .map(|frame| frame.set_register(index, value));
    match stored {
        Some(true) => Ok(ActionResult::Continue),
        _ => Err(ScriptError::Register(index)),
    }
}

pub fn constant_pool(ctx: &mut Context, args: &[u8]) -> Result {
    let constants = ctx.read_constant_pool(args)?;
    let bytes: Rc<[u8]> = Rc::from(args);
    if let Some(frame) = ctx.current_script_frame_mut() {
        frame.constants = constants;
        frame.constant_pool = Some(bytes);
    }
    Ok(ActionResult::Continue)
}
