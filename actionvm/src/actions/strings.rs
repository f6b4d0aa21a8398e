//! Legacy string actions. Byte-oriented before version 6, character
//! oriented from then on; the `MB` variants always count characters.

use crate::{ActionResult, Context, ScriptError, Value};

type Result = std::result::Result<ActionResult, ScriptError>;

fn push_text(ctx: &mut Context, text: String) {
    let id = ctx.give_string(text);
    ctx.push(Value::String(id));
}

/// `text[index - 1 .. index - 1 + count]` in characters; a negative count
/// takes the rest.
fn substring(text: &str, index: i32, count: i32) -> String {
    let start = index.saturating_sub(1).max(0) as usize;
    let chars = text.chars().skip(start);
    if count < 0 {
        chars.collect()
    } else {
        chars.take(count as usize).collect()
    }
}

fn byte_substring(text: &str, index: i32, count: i32) -> String {
    let bytes = text.as_bytes();
    let start = (index.saturating_sub(1).max(0) as usize).min(bytes.len());
    let end = if count < 0 {
        bytes.len()
    } else {
        start.saturating_add(count as usize).min(bytes.len())
    };
    String::from_utf8_lossy(&bytes[start..end]).into_owned()
}

pub fn string_equals(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop_string();
    let a = ctx.pop_string();
    ctx.push_bool(a == b);
    Ok(ActionResult::Continue)
}

pub fn string_less(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop_string();
    let a = ctx.pop_string();
    let result = *ctx.string(a) < *ctx.string(b);
    ctx.push_bool(result);
    Ok(ActionResult::Continue)
}

pub fn string_greater(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop_string();
    let a = ctx.pop_string();
    let result = *ctx.string(a) > *ctx.string(b);
    ctx.push_bool(result);
    Ok(ActionResult::Continue)
}

pub fn string_add(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop_string();
    let a = ctx.pop_string();
    let mut text = ctx.string(a).to_string();
    text.push_str(&ctx.string(b));
    push_text(ctx, text);
    Ok(ActionResult::Continue)
}

pub fn string_length(ctx: &mut Context, _: &[u8]) -> Result {
    let id = ctx.pop_string();
    let text = ctx.string(id);
    let len = if ctx.version() >= 6 {
        text.chars().count()
    } else {
        text.len()
    };
    ctx.push(Value::Int(len as i32));
    Ok(ActionResult::Continue)
}

pub fn mb_string_length(ctx: &mut Context, _: &[u8]) -> Result {
    let id = ctx.pop_string();
    let len = ctx.string(id).chars().count();
    ctx.push(Value::Int(len as i32));
    Ok(ActionResult::Continue)
}

pub fn string_extract(ctx: &mut Context, _: &[u8]) -> Result {
    let count = ctx.pop_integer();
    let index = ctx.pop_integer();
    let id = ctx.pop_string();
    let text = ctx.string(id);
    let result = if ctx.version() >= 6 {
        substring(&text, index, count)
    } else {
        byte_substring(&text, index, count)
    };
    push_text(ctx, result);
    Ok(ActionResult::Continue)
}

pub fn mb_string_extract(ctx: &mut Context, _: &[u8]) -> Result {
    let count = ctx.pop_integer();
    let index = ctx.pop_integer();
    let id = ctx.pop_string();
    let result = substring(&ctx.string(id), index, count);
    push_text(ctx, result);
    Ok(ActionResult::Continue)
}

pub fn char_to_ascii(ctx: &mut Context, _: &[u8]) -> Result {
    let id = ctx.pop_string();
    let text = ctx.string(id);
    let code = if ctx.version() >= 6 {
        text.chars().next().map_or(0, u32::from)
    } else {
        text.bytes().next().map_or(0, u32::from)
    };
    ctx.push(Value::Int(code as i32));
    Ok(ActionResult::Continue)
}

pub fn mb_char_to_ascii(ctx: &mut Context, _: &[u8]) -> Result {
    let id = ctx.pop_string();
    let code = ctx.string(id).chars().next().map_or(0, u32::from);
    ctx.push(Value::Int(code as i32));
    Ok(ActionResult::Continue)
}

pub fn ascii_to_char(ctx: &mut Context, _: &[u8]) -> Result {
    let code = ctx.pop_integer() as u32;
    let code = if ctx.version() >= 6 { code } else { code & 0xFF };
    let text = char::from_u32(code).map(String::from).unwrap_or_default();
    push_text(ctx, text);
    Ok(ActionResult::Continue)
}

pub fn mb_ascii_to_char(ctx: &mut Context, _: &[u8]) -> Result {
    let code = ctx.pop_integer() as u32;
    let text = char::from_u32(code).map(String::from).unwrap_or_default();
    push_text(ctx, text);
    Ok(ActionResult::Continue)
}
