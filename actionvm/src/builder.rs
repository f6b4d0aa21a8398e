use crate::{
    Script,
    actions::{record, try_flags},
    script::FunctionFlags,
};

/// One record of a `Push` action.
#[derive(Debug, Clone, PartialEq)]
pub enum PushValue {
    String(String),
    Float(f32),
    Null,
    Undefined,
    Register(u8),
    Boolean(bool),
    Double(f64),
    Int(i32),
    Constant8(u8),
    Constant16(u16),
}

impl From<&str> for PushValue {
    fn from(value: &str) -> Self {
        PushValue::String(value.to_string())
    }
}

impl From<i32> for PushValue {
    fn from(value: i32) -> Self {
        PushValue::Int(value)
    }
}

impl From<bool> for PushValue {
    fn from(value: bool) -> Self {
        PushValue::Boolean(value)
    }
}

/// A forward jump whose offset has not been resolved yet.
///
/// Created by [`ScriptBuilder::jump`] and [`ScriptBuilder::if_true`];
/// resolve it with [`ScriptBuilder::bind`].
#[derive(Debug)]
#[must_use]
pub struct Label {
    /// Position of the i16 offset bytes in the buffer.
    offset_pos: usize,
    /// Position right after the jump action.
    base: usize,
}

/// How a `catch` clause receives the thrown value.
#[derive(Debug, Clone, Copy)]
pub enum CatchBinding<'a> {
    Variable(&'a str),
    Register(u8),
}

/// Assembles action streams.
///
/// Nested bodies (functions, `with`, `try`) are built by closures that get
/// a fresh builder; their size is known once the closure returns.
#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    version: u8,
    buf: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new(version: u8) -> Self {
        Self {
            version,
            buf: Vec::new(),
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Current byte offset in the action stream.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The action stream terminated by an end marker.
    pub fn build(mut self, name: impl Into<String>) -> Script {
        self.buf.push(0);
        Script::new(name, self.version, self.buf)
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn body(&self, f: impl FnOnce(&mut ScriptBuilder)) -> Vec<u8> {
        let mut body = ScriptBuilder::new(self.version);
        f(&mut body);
        body.buf
    }

    fn block_size(body: &[u8]) -> u16 {
        assert!(body.len() <= u16::MAX as usize, "block body exceeds 65535 bytes");
        body.len() as u16
    }

    /// Bytes appended verbatim, for streams the builder cannot express.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// An action without arguments. Codes with the high bit set get an
    /// empty length prefix.
    pub fn action(&mut self, code: u8) -> &mut Self {
        if code & 0x80 != 0 {
            self.action_with(code, &[])
        } else {
            self.buf.push(code);
            self
        }
    }

    /// A long action carrying `args`.
    pub fn action_with(&mut self, code: u8, args: &[u8]) -> &mut Self {
        debug_assert!(code & 0x80 != 0, "0x{code:02X} takes no arguments");
        self.buf.push(code);
        self.emit_u16(Self::block_size(args));
        self.buf.extend_from_slice(args);
        self
    }

    pub fn push(&mut self, values: impl IntoIterator<Item = PushValue>) -> &mut Self {
        let mut args = Vec::new();
        for value in values {
            match value {
                PushValue::String(text) => {
                    args.push(record::STRING);
                    args.extend_from_slice(text.as_bytes());
                    args.push(0);
                }
                PushValue::Float(f) => {
                    args.push(record::FLOAT);
                    args.extend_from_slice(&f.to_le_bytes());
                }
                PushValue::Null => args.push(record::NULL),
                PushValue::Undefined => args.push(record::UNDEFINED),
                PushValue::Register(r) => args.extend_from_slice(&[record::REGISTER, r]),
                PushValue::Boolean(b) => args.extend_from_slice(&[record::BOOLEAN, u8::from(b)]),
                PushValue::Double(d) => {
                    let bytes = d.to_le_bytes();
                    args.push(record::DOUBLE);
                    args.extend_from_slice(&bytes[4..]);
                    args.extend_from_slice(&bytes[..4]);
                }
                PushValue::Int(i) => {
                    args.push(record::INT);
                    args.extend_from_slice(&i.to_le_bytes());
                }
                PushValue::Constant8(c) => args.extend_from_slice(&[record::CONSTANT8, c]),
                PushValue::Constant16(c) => {
                    args.push(record::CONSTANT16);
                    args.extend_from_slice(&c.to_le_bytes());
                }
            }
        }
        self.action_with(0x96, &args)
    }

    pub fn constant_pool(&mut self, constants: &[&str]) -> &mut Self {
        let mut args = Vec::new();
        args.extend_from_slice(&(constants.len() as u16).to_le_bytes());
        for constant in constants {
            args.extend_from_slice(constant.as_bytes());
            args.push(0);
        }
        self.action_with(0x88, &args)
    }

    pub fn store_register(&mut self, register: u8) -> &mut Self {
        self.action_with(0x87, &[register])
    }

    // ── plain actions ──────────────────────────────────────────────

    pub fn pop(&mut self) -> &mut Self {
        self.action(0x17)
    }

    pub fn duplicate(&mut self) -> &mut Self {
        self.action(0x4C)
    }

    pub fn stack_swap(&mut self) -> &mut Self {
        self.action(0x4D)
    }

    pub fn add2(&mut self) -> &mut Self {
        self.action(0x47)
    }

    pub fn less2(&mut self) -> &mut Self {
        self.action(0x48)
    }

    pub fn equals2(&mut self) -> &mut Self {
        self.action(0x49)
    }

    pub fn not(&mut self) -> &mut Self {
        self.action(0x12)
    }

    pub fn get_variable(&mut self) -> &mut Self {
        self.action(0x1C)
    }

    pub fn set_variable(&mut self) -> &mut Self {
        self.action(0x1D)
    }

    pub fn define_local(&mut self) -> &mut Self {
        self.action(0x3C)
    }

    pub fn get_member(&mut self) -> &mut Self {
        self.action(0x4E)
    }

    pub fn set_member(&mut self) -> &mut Self {
        self.action(0x4F)
    }

    pub fn init_array(&mut self) -> &mut Self {
        self.action(0x42)
    }

    pub fn init_object(&mut self) -> &mut Self {
        self.action(0x43)
    }

    pub fn call_function(&mut self) -> &mut Self {
        self.action(0x3D)
    }

    pub fn call_method(&mut self) -> &mut Self {
        self.action(0x52)
    }

    pub fn new_object(&mut self) -> &mut Self {
        self.action(0x40)
    }

    pub fn new_method(&mut self) -> &mut Self {
        self.action(0x53)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.action(0x3E)
    }

    pub fn throw(&mut self) -> &mut Self {
        self.action(0x2A)
    }

    pub fn trace(&mut self) -> &mut Self {
        self.action(0x26)
    }

    // ── movie actions ──────────────────────────────────────────────

    pub fn goto_frame(&mut self, frame: u16) -> &mut Self {
        self.action_with(0x81, &frame.to_le_bytes())
    }

    pub fn goto_frame2(&mut self, play: bool) -> &mut Self {
        self.action_with(0x9F, &[u8::from(play)])
    }

    pub fn wait_for_frame(&mut self, frame: u16, skip: u8) -> &mut Self {
        let [lo, hi] = frame.to_le_bytes();
        self.action_with(0x8A, &[lo, hi, skip])
    }

    pub fn set_target(&mut self, target: &str) -> &mut Self {
        let mut args = target.as_bytes().to_vec();
        args.push(0);
        self.action_with(0x8B, &args)
    }

    // ── control flow ───────────────────────────────────────────────

    fn emit_jump_placeholder(&mut self, code: u8) -> Label {
        self.buf.push(code);
        self.emit_u16(2);
        let offset_pos = self.buf.len();
        self.emit_u16(0);
        Label {
            offset_pos,
            base: self.buf.len(),
        }
    }

    /// Unconditional forward jump.
    pub fn jump(&mut self) -> Label {
        self.emit_jump_placeholder(0x99)
    }

    /// Forward jump taken when the popped condition is true.
    pub fn if_true(&mut self) -> Label {
        self.emit_jump_placeholder(0x9D)
    }

    /// Binds a forward jump to the current position.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        let offset = (self.buf.len() as isize - label.base as isize) as i16;
        self.buf[label.offset_pos..label.offset_pos + 2].copy_from_slice(&offset.to_le_bytes());
        self
    }

    /// Backward jump to `target`, an offset from [`current_offset`](Self::current_offset).
    pub fn jump_back(&mut self, target: usize) -> &mut Self {
        let base = self.buf.len() + 5;
        let offset = (target as isize - base as isize) as i16;
        self.action_with(0x99, &offset.to_le_bytes())
    }

    pub fn if_back(&mut self, target: usize) -> &mut Self {
        let base = self.buf.len() + 5;
        let offset = (target as isize - base as isize) as i16;
        self.action_with(0x9D, &offset.to_le_bytes())
    }

    /// `DefineFunction`: parameters bound by name in the activation.
    pub fn define_function(
        &mut self,
        name: &str,
        params: &[&str],
        body: impl FnOnce(&mut ScriptBuilder),
    ) -> &mut Self {
        let body = self.body(body);
        let mut args = Vec::new();
        args.extend_from_slice(name.as_bytes());
        args.push(0);
        args.extend_from_slice(&(params.len() as u16).to_le_bytes());
        for param in params {
            args.extend_from_slice(param.as_bytes());
            args.push(0);
        }
        args.extend_from_slice(&Self::block_size(&body).to_le_bytes());
        self.action_with(0x9B, &args);
        self.buf.extend_from_slice(&body);
        self
    }

    /// `DefineFunction2`: `params` pairs a name with its register, 0 for
    /// the activation.
    pub fn define_function2(
        &mut self,
        name: &str,
        registers: u8,
        flags: FunctionFlags,
        params: &[(&str, u8)],
        body: impl FnOnce(&mut ScriptBuilder),
    ) -> &mut Self {
        let body = self.body(body);
        let mut args = Vec::new();
        args.extend_from_slice(name.as_bytes());
        args.push(0);
        args.extend_from_slice(&(params.len() as u16).to_le_bytes());
        args.push(registers);
        args.extend_from_slice(&flags.bits().to_le_bytes());
        for (param, register) in params {
            args.push(*register);
            args.extend_from_slice(param.as_bytes());
            args.push(0);
        }
        args.extend_from_slice(&Self::block_size(&body).to_le_bytes());
        self.action_with(0x8E, &args);
        self.buf.extend_from_slice(&body);
        self
    }

    /// `With` over `body`; the scope object must already be on the stack.
    pub fn with_block(&mut self, body: impl FnOnce(&mut ScriptBuilder)) -> &mut Self {
        let body = self.body(body);
        let size = Self::block_size(&body);
        self.action_with(0x94, &size.to_le_bytes());
        self.buf.extend_from_slice(&body);
        self
    }

    /// `try { body } catch (name) { catch } finally { finally }`.
    pub fn try_block<C, F>(
        &mut self,
        name: &str,
        body: impl FnOnce(&mut ScriptBuilder),
        catch: Option<C>,
        finally: Option<F>,
    ) -> &mut Self
    where
        C: FnOnce(&mut ScriptBuilder),
        F: FnOnce(&mut ScriptBuilder),
    {
        self.try_block_with(CatchBinding::Variable(name), body, catch, finally)
    }

    pub fn try_block_with<C, F>(
        &mut self,
        binding: CatchBinding<'_>,
        body: impl FnOnce(&mut ScriptBuilder),
        catch: Option<C>,
        finally: Option<F>,
    ) -> &mut Self
    where
        C: FnOnce(&mut ScriptBuilder),
        F: FnOnce(&mut ScriptBuilder),
    {
        let mut flags = 0;
        if catch.is_some() {
            flags |= try_flags::CATCH;
        }
        if finally.is_some() {
            flags |= try_flags::FINALLY;
        }
        if let CatchBinding::Register(_) = binding {
            flags |= try_flags::CATCH_IN_REGISTER;
        }
        let body = self.body(body);
        let catch = catch.map(|f| self.body(f)).unwrap_or_default();
        let finally = finally.map(|f| self.body(f)).unwrap_or_default();

        let mut args = vec![flags];
        args.extend_from_slice(&Self::block_size(&body).to_le_bytes());
        args.extend_from_slice(&Self::block_size(&catch).to_le_bytes());
        args.extend_from_slice(&Self::block_size(&finally).to_le_bytes());
        match binding {
            CatchBinding::Variable(name) => {
                args.extend_from_slice(name.as_bytes());
                args.push(0);
            }
            CatchBinding::Register(r) => args.push(r),
        }
        self.action_with(0x8F, &args);
        self.buf.extend_from_slice(&body);
        self.buf.extend_from_slice(&catch);
        self.buf.extend_from_slice(&finally);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::decode_action;

    #[test]
    fn push_encodes_every_record_type() {
        let mut builder = ScriptBuilder::new(8);
        builder.push([
            PushValue::from("a"),
            PushValue::Null,
            PushValue::Register(3),
            PushValue::Int(-1),
        ]);
        assert_eq!(
            builder.as_bytes(),
            [
                0x96, 0x0B, 0x00, 0x00, b'a', 0x00, 0x02, 0x04, 0x03, 0x07, 0xFF, 0xFF, 0xFF, 0xFF
            ]
        );
    }

    #[test]
    fn forward_labels_patch_relative_offsets() {
        let mut builder = ScriptBuilder::new(8);
        let label = builder.jump();
        builder.pop().pop();
        builder.bind(label);
        assert_eq!(&builder.as_bytes()[..5], [0x99, 0x02, 0x00, 0x02, 0x00]);
    }

    #[test]
    fn backward_jumps_land_on_the_target() {
        let mut builder = ScriptBuilder::new(8);
        let top = builder.current_offset();
        builder.pop().jump_back(top);
        let bytes = builder.as_bytes();
        let jump = decode_action(bytes, 1, bytes.len()).unwrap();
        let offset = i16::from_le_bytes([bytes[4], bytes[5]]);
        assert_eq!(jump.next as isize + offset as isize, top as isize);
    }

    #[test]
    fn function_bodies_follow_their_header() {
        let mut builder = ScriptBuilder::new(8);
        builder.define_function("f", &["x"], |body| {
            body.pop();
        });
        let bytes = builder.as_bytes().to_vec();
        let header = decode_action(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(header.code, 0x9B);
        assert_eq!(&bytes[header.args.end - 2..header.args.end], [0x01, 0x00]);
        assert_eq!(bytes[header.next..], [0x17]);
    }
}
