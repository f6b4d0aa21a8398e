//! Textual rendering of action streams, one line per action.

use std::fmt::Write;

use crate::{ArgReader, Script, ScriptError, action::decode_action, actions};

fn render(f: impl FnOnce() -> Result<String, ScriptError>) -> String {
    f().unwrap_or_else(|err| format!("<{err}>"))
}

fn quote(text: &str) -> String {
    format!("{text:?}")
}

pub fn format_none(_: &[u8]) -> String {
    String::new()
}

pub fn format_u8(args: &[u8]) -> String {
    render(|| Ok(ArgReader::new("u8", args).u8()?.to_string()))
}

pub fn format_u16(args: &[u8]) -> String {
    render(|| Ok(ArgReader::new("u16", args).u16()?.to_string()))
}

pub fn format_string(args: &[u8]) -> String {
    render(|| Ok(quote(&ArgReader::new("string", args).string()?)))
}

pub fn format_jump(args: &[u8]) -> String {
    render(|| Ok(format!("{:+}", ArgReader::new("Jump", args).i16()?)))
}

pub fn format_get_url(args: &[u8]) -> String {
    render(|| {
        let mut reader = ArgReader::new("GetURL", args);
        let url = reader.string()?;
        let window = reader.string()?;
        Ok(format!("{} {}", quote(&url), quote(&window)))
    })
}

pub fn format_goto_frame2(args: &[u8]) -> String {
    render(|| {
        let mut reader = ArgReader::new("GotoFrame2", args);
        let flags = reader.u8()?;
        let mut out = String::from(if flags & 1 != 0 { "play" } else { "stop" });
        if flags & 2 != 0 {
            write!(out, " bias {}", reader.u16()?).ok();
        }
        Ok(out)
    })
}

pub fn format_wait_for_frame(args: &[u8]) -> String {
    render(|| {
        let mut reader = ArgReader::new("WaitForFrame", args);
        let frame = reader.u16()?;
        let skip = reader.u8()?;
        Ok(format!("{frame} skip {skip}"))
    })
}

pub fn format_constant_pool(args: &[u8]) -> String {
    render(|| {
        let mut reader = ArgReader::new("ConstantPool", args);
        let count = reader.u16()?;
        let mut out = format!("{count}:");
        for i in 0..count {
            write!(out, " c{i}={}", quote(&reader.string()?)).ok();
        }
        Ok(out)
    })
}

pub fn format_push(args: &[u8]) -> String {
    use crate::actions::record;

    render(|| {
        let mut reader = ArgReader::new("Push", args);
        let mut items = Vec::new();
        while !reader.is_empty() {
            let item = match reader.u8()? {
                record::STRING => quote(&reader.string()?),
                record::FLOAT => format!("{}f", reader.f32()?),
                record::NULL => "null".to_string(),
                record::UNDEFINED => "undefined".to_string(),
                record::REGISTER => format!("r{}", reader.u8()?),
                record::BOOLEAN => (reader.u8()? != 0).to_string(),
                record::DOUBLE => format!("{}d", reader.f64_swapped()?),
                record::INT => reader.i32()?.to_string(),
                record::CONSTANT8 => format!("c{}", reader.u8()?),
                record::CONSTANT16 => format!("c{}", reader.u16()?),
                _ => return Err(ScriptError::malformed("Push", "unknown record type")),
            };
            items.push(item);
        }
        Ok(items.join(", "))
    })
}

pub fn format_define_function(args: &[u8]) -> String {
    render(|| {
        let mut reader = ArgReader::new("DefineFunction", args);
        let name = reader.string()?;
        let count = reader.u16()?;
        let mut params = Vec::with_capacity(count as usize);
        for _ in 0..count {
            params.push(reader.string()?);
        }
        let size = reader.u16()?;
        Ok(format!("{name}({}) size {size}", params.join(", ")))
    })
}

pub fn format_define_function2(args: &[u8]) -> String {
    render(|| {
        let mut reader = ArgReader::new("DefineFunction2", args);
        let name = reader.string()?;
        let count = reader.u16()?;
        let registers = reader.u8()?;
        let flags = reader.u16()?;
        let mut params = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let register = reader.u8()?;
            let param = reader.string()?;
            params.push(if register == 0 {
                param
            } else {
                format!("r{register}:{param}")
            });
        }
        let size = reader.u16()?;
        Ok(format!(
            "{name}({}) registers {registers} flags 0x{flags:04X} size {size}",
            params.join(", ")
        ))
    })
}

pub fn format_try(args: &[u8]) -> String {
    use crate::actions::try_flags;

    render(|| {
        let mut reader = ArgReader::new("Try", args);
        let flags = reader.u8()?;
        let try_size = reader.u16()?;
        let catch_size = reader.u16()?;
        let finally_size = reader.u16()?;
        let binding = if flags & try_flags::CATCH_IN_REGISTER != 0 {
            format!("r{}", reader.u8()?)
        } else {
            quote(&reader.string()?)
        };
        let mut out = format!("try {try_size}");
        if flags & try_flags::CATCH != 0 {
            write!(out, " catch({binding}) {catch_size}").ok();
        }
        if flags & try_flags::FINALLY != 0 {
            write!(out, " finally {finally_size}").ok();
        }
        Ok(out)
    })
}

/// One line per action of `script`: offset, name and decoded arguments.
/// Decoding stops at the end marker or the first malformed header.
pub fn disassemble(script: &Script) -> String {
    let mut out = String::new();
    let bytes = script.buffer();
    let mut pc = script.start();
    while pc < script.end() {
        if bytes[pc] == 0 {
            writeln!(out, "{pc:>6}  End").ok();
            break;
        }
        let action = match decode_action(bytes, pc, script.end()) {
            Ok(action) => action,
            Err(err) => {
                writeln!(out, "{pc:>6}  <{err}>").ok();
                break;
            }
        };
        match actions::lookup(action.code) {
            Some(spec) => {
                let args = (spec.format)(&bytes[action.args.clone()]);
                if args.is_empty() {
                    writeln!(out, "{pc:>6}  {}", spec.name).ok();
                } else {
                    writeln!(out, "{pc:>6}  {:<16} {args}", spec.name).ok();
                }
            }
            None => {
                writeln!(out, "{pc:>6}  Unknown(0x{:02X})", action.code).ok();
            }
        }
        pc = action.next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PushValue, ScriptBuilder};

    #[test]
    fn lists_each_action_with_its_arguments() {
        let mut builder = ScriptBuilder::new(8);
        builder
            .push([PushValue::Int(10), PushValue::from("x"), PushValue::Register(2)])
            .add2()
            .raw(&[0x01]);
        let text = disassemble(&builder.build("listing"));
        let lines: Vec<&str> = text.lines().map(str::trim_start).collect();
        assert_eq!(lines[0], "0  Push             10, \"x\", r2");
        assert!(lines[1].ends_with("Add2"));
        assert!(lines[2].ends_with("Unknown(0x01)"));
        assert!(lines[3].ends_with("End"));
    }

    #[test]
    fn malformed_arguments_are_marked() {
        assert!(format_push(&[0x07, 0x01]).starts_with('<'));
        assert_eq!(format_jump(&[0xFE, 0xFF]), "-2");
        assert_eq!(format_jump(&[0x05, 0x00]), "+5");
    }
}
