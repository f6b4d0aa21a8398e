use std::rc::Rc;

use bitflags::bitflags;

/// Registers available to scripts that do not declare their own count.
pub const DEFAULT_REGISTERS: u16 = 4;

bitflags! {
    /// Preload/suppress flags declared by `DefineFunction2`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct FunctionFlags: u16 {
        const PRELOAD_THIS = 0x0001;
        const SUPPRESS_THIS = 0x0002;
        const PRELOAD_ARGUMENTS = 0x0004;
        const SUPPRESS_ARGUMENTS = 0x0008;
        const PRELOAD_SUPER = 0x0010;
        const SUPPRESS_SUPER = 0x0020;
        const PRELOAD_ROOT = 0x0040;
        const PRELOAD_PARENT = 0x0080;
        const PRELOAD_GLOBAL = 0x0100;
    }
}

/// A declared parameter. Register 0 means "bind by name in the activation".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptArgument {
    pub name: String,
    pub register: u8,
}

/// An immutable action stream plus the metadata a frame needs to run it.
///
/// Function bodies share the buffer of the script that defined them and
/// only narrow `start..end`.
#[derive(Debug)]
pub struct Script {
    pub name: String,
    pub version: u8,
    buffer: Rc<[u8]>,
    start: usize,
    end: usize,
    pub n_registers: u16,
    pub arguments: Vec<ScriptArgument>,
    pub flags: FunctionFlags,
    /// Raw `ConstantPool` arguments active when the function was defined.
    pub constant_pool: Option<Rc<[u8]>>,
}

impl Script {
    pub fn new(name: impl Into<String>, version: u8, bytes: impl Into<Rc<[u8]>>) -> Self {
        let buffer: Rc<[u8]> = bytes.into();
        let end = buffer.len();
        Self {
            name: name.into(),
            version,
            buffer,
            start: 0,
            end,
            n_registers: DEFAULT_REGISTERS,
            arguments: Vec::new(),
            flags: FunctionFlags::empty(),
            constant_pool: None,
        }
    }

    /// A function body living at `start..end` of `buffer`.
    pub fn function(
        name: impl Into<String>,
        version: u8,
        buffer: Rc<[u8]>,
        start: usize,
        end: usize,
    ) -> Self {
        debug_assert!(start <= end && end <= buffer.len());
        Self {
            name: name.into(),
            version,
            buffer,
            start,
            end,
            n_registers: DEFAULT_REGISTERS,
            arguments: Vec::new(),
            flags: FunctionFlags::empty(),
            constant_pool: None,
        }
    }

    #[inline]
    pub fn buffer(&self) -> &Rc<[u8]> {
        &self.buffer
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// The bytes belonging to this script only.
    pub fn code(&self) -> &[u8] {
        &self.buffer[self.start..self.end]
    }

    #[inline]
    pub fn contains_pc(&self, pc: usize) -> bool {
        pc >= self.start && pc <= self.end
    }
}
