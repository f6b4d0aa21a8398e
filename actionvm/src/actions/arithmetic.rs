use crate::{ActionResult, Context, ScriptError, Value, convert::Hint};

type Result = std::result::Result<ActionResult, ScriptError>;

fn binary(ctx: &mut Context, op: fn(f64, f64) -> f64) -> Result {
    let b = ctx.pop_number();
    let a = ctx.pop_number();
    ctx.push(Value::number(op(a, b)));
    Ok(ActionResult::Continue)
}

/// Integer operation on `ToInt32` operands.
fn bitwise(ctx: &mut Context, op: fn(i32, i32) -> Value) -> Result {
    let b = ctx.pop_integer();
    let a = ctx.pop_integer();
    ctx.push(op(a, b));
    Ok(ActionResult::Continue)
}

pub fn add(ctx: &mut Context, _: &[u8]) -> Result {
    binary(ctx, |a, b| a + b)
}

pub fn subtract(ctx: &mut Context, _: &[u8]) -> Result {
    binary(ctx, |a, b| a - b)
}

pub fn multiply(ctx: &mut Context, _: &[u8]) -> Result {
    binary(ctx, |a, b| a * b)
}

/// Division by zero gives `#ERROR#` before version 5.
pub fn divide(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop_number();
    let a = ctx.pop_number();
    if b == 0.0 && ctx.version() < 5 {
        let error = ctx.new_string("#ERROR#");
        ctx.push(error);
    } else {
        ctx.push(Value::number(a / b));
    }
    Ok(ActionResult::Continue)
}

pub fn modulo(ctx: &mut Context, _: &[u8]) -> Result {
    binary(ctx, |a, b| a % b)
}

pub fn equals(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop_number();
    let a = ctx.pop_number();
    ctx.push_bool(a == b);
    Ok(ActionResult::Continue)
}

pub fn less(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop_number();
    let a = ctx.pop_number();
    ctx.push_bool(a < b);
    Ok(ActionResult::Continue)
}

pub fn and(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop();
    let a = ctx.pop();
    let result = ctx.to_boolean(a) && ctx.to_boolean(b);
    ctx.push_bool(result);
    Ok(ActionResult::Continue)
}

pub fn or(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop();
    let a = ctx.pop();
    let result = ctx.to_boolean(a) || ctx.to_boolean(b);
    ctx.push_bool(result);
    Ok(ActionResult::Continue)
}

pub fn not(ctx: &mut Context, _: &[u8]) -> Result {
    let value = ctx.pop();
    let result = !ctx.to_boolean(value);
    ctx.push_bool(result);
    Ok(ActionResult::Continue)
}

/// `+`: concatenates when either primitive is a string.
pub fn add2(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop();
    let a = ctx.pop();
    let a = ctx.to_primitive(a, Hint::Number);
    let b = ctx.to_primitive(b, Hint::Number);
    if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
        let mut text = ctx.to_rust_string(a).to_string();
        text.push_str(&ctx.to_rust_string(b));
        let id = ctx.give_string(text);
        ctx.push(Value::String(id));
    } else {
        let sum = ctx.to_number(a) + ctx.to_number(b);
        ctx.push(Value::number(sum));
    }
    Ok(ActionResult::Continue)
}

/// `<`, pushing `undefined` when the comparison involves `NaN`.
pub fn less2(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop();
    let a = ctx.pop();
    match ctx.less_than(a, b) {
        Some(result) => ctx.push(Value::Boolean(result)),
        None => ctx.push(Value::Undefined),
    }
    Ok(ActionResult::Continue)
}

pub fn greater(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop();
    let a = ctx.pop();
    let result = ctx.less_than(b, a).unwrap_or(false);
    ctx.push(Value::Boolean(result));
    Ok(ActionResult::Continue)
}

pub fn equals2(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop();
    let a = ctx.pop();
    let result = ctx.abstract_equals(a, b);
    ctx.push(Value::Boolean(result));
    Ok(ActionResult::Continue)
}

pub fn strict_equals(ctx: &mut Context, _: &[u8]) -> Result {
    let b = ctx.pop();
    let a = ctx.pop();
    let result = ctx.strict_equals(a, b);
    ctx.push(Value::Boolean(result));
    Ok(ActionResult::Continue)
}

pub fn increment(ctx: &mut Context, _: &[u8]) -> Result {
    let n = ctx.pop_number();
    ctx.push(Value::number(n + 1.0));
    Ok(ActionResult::Continue)
}

pub fn decrement(ctx: &mut Context, _: &[u8]) -> Result {
    let n = ctx.pop_number();
    ctx.push(Value::number(n - 1.0));
    Ok(ActionResult::Continue)
}

pub fn to_integer(ctx: &mut Context, _: &[u8]) -> Result {
    let n = ctx.pop_number();
    let truncated = if n.is_finite() { n.trunc() } else if n.is_nan() { 0.0 } else { n };
    ctx.push(Value::number(truncated));
    Ok(ActionResult::Continue)
}

pub fn to_number(ctx: &mut Context, _: &[u8]) -> Result {
    let n = ctx.pop_number();
    ctx.push(Value::number(n));
    Ok(ActionResult::Continue)
}

pub fn to_string(ctx: &mut Context, _: &[u8]) -> Result {
    let id = ctx.pop_string();
    ctx.push(Value::String(id));
    Ok(ActionResult::Continue)
}

pub fn bit_and(ctx: &mut Context, _: &[u8]) -> Result {
    bitwise(ctx, |a, b| Value::Int(a & b))
}

pub fn bit_or(ctx: &mut Context, _: &[u8]) -> Result {
    bitwise(ctx, |a, b| Value::Int(a | b))
}

pub fn bit_xor(ctx: &mut Context, _: &[u8]) -> Result {
    bitwise(ctx, |a, b| Value::Int(a ^ b))
}

pub fn bit_lshift(ctx: &mut Context, _: &[u8]) -> Result {
    bitwise(ctx, |a, b| Value::Int(a.wrapping_shl(b as u32 & 31)))
}

pub fn bit_rshift(ctx: &mut Context, _: &[u8]) -> Result {
    bitwise(ctx, |a, b| Value::Int(a.wrapping_shr(b as u32 & 31)))
}

pub fn bit_urshift(ctx: &mut Context, _: &[u8]) -> Result {
    bitwise(ctx, |a, b| Value::number(f64::from((a as u32) >> (b as u32 & 31))))
}

/// Uniform integer in `0..max`.
pub fn random_number(ctx: &mut Context, _: &[u8]) -> Result {
    let max = ctx.pop_integer();
    let value = if max > 0 { ctx.rng.i32(0..max) } else { 0 };
    ctx.push(Value::Int(value));
    Ok(ActionResult::Continue)
}

pub fn get_time(ctx: &mut Context, _: &[u8]) -> Result {
    let ms = ctx.elapsed_ms();
    ctx.push(Value::number(ms as f64));
    Ok(ActionResult::Continue)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{Context, PushValue, ScriptBuilder, Value};

    fn run(version: u8, build: impl FnOnce(&mut ScriptBuilder)) -> (Context, Vec<Value>) {
        let mut context = Context::startup(version);
        let mut builder = ScriptBuilder::new(version);
        build(&mut builder);
        let values = context.execute(Rc::new(builder.build("arith")));
        (context, values)
    }

    #[test]
    fn add2_concatenates_strings() {
        let (context, values) = run(8, |b| {
            b.push([PushValue::from("n="), PushValue::Int(4)]).add2();
        });
        let Value::String(id) = values[0] else {
            panic!("expected a string, got {values:?}");
        };
        assert_eq!(&*context.string(id), "n=4");
    }

    #[test]
    fn legacy_comparisons_push_numbers() {
        let (_, values) = run(4, |b| {
            b.push([PushValue::Int(1), PushValue::Int(2)]).action(0x0F);
        });
        assert_eq!(values, vec![Value::Int(1)]);
        let (_, values) = run(8, |b| {
            b.push([PushValue::Int(1), PushValue::Int(2)]).action(0x0F);
        });
        assert_eq!(values, vec![Value::Boolean(true)]);
    }

    #[test]
    fn bit_operations_use_int32() {
        let (_, values) = run(8, |b| {
            b.push([PushValue::Int(-1), PushValue::Int(28)]).action(0x65);
            b.push([PushValue::Int(6), PushValue::Int(3)]).action(0x60);
        });
        assert_eq!(values, vec![Value::Int(15), Value::Int(2)]);
    }

    #[test]
    fn less2_with_nan_is_undefined() {
        let (_, values) = run(8, |b| {
            b.push([PushValue::Double(f64::NAN), PushValue::Int(1)]).action(0x48);
        });
        assert_eq!(values, vec![Value::Undefined]);
    }

    #[test]
    fn random_numbers_stay_in_range() {
        let (_, values) = run(8, |b| {
            for _ in 0..20 {
                b.push([PushValue::Int(5)]).action(0x30);
            }
        });
        assert!(values.iter().all(|v| matches!(v, Value::Int(0..=4))));
    }
}
