//! A virtual machine for the AS2 action bytecode.
//!
//! A [`Context`] owns the heap, the operand stack and the call chain.
//! Scripts are raw action streams wrapped in a [`Script`]; hosts run them
//! with [`Context::execute`] and reach the display list through a
//! [`MovieHost`].

pub mod action;
pub mod arena;
pub mod builder;
pub mod context;
pub mod disasm;
pub mod error;
pub mod frame;
pub mod function;
pub mod heap;
pub mod interning;
pub mod movie;
pub mod number;
pub mod object;
pub mod script;
pub mod stack;
pub mod value;
pub mod visitor;

mod actions;
mod convert;
mod interpreter;
mod natives;
mod properties;

pub use action::{ActionResult, ActionSpec, ArgReader, StackEffect};
pub use builder::{CatchBinding, Label, PushValue, ScriptBuilder};
pub use context::{
    AllowAll, Context, ContextCreateInfo, DEFAULT_MAX_CALL_DEPTH, SecurityPolicy, SpecialObjects,
    TraceLog,
};
pub use convert::Hint;
pub use disasm::disassemble;
pub use error::{AbortReason, CollectError, OutOfMemory, ScriptError, SettingsError};
pub use frame::{Frame, FrameKind, NativeFrame, ReturnMode, ScriptFrame};
pub use function::{ConstructKind, Function, NativeFn, NativeFunction, ScriptFunction};
pub use heap::{DebugHook, GcStats, Heap, HeapSettings, RootProvider};
pub use interning::{InternedStrings, StringId};
pub use movie::{DragConstraint, MovieHost, NullMovie};
pub use natives::array::SortFlags;
pub use object::{Object, ObjectFlags, ObjectId, ObjectKind, PropFlags, Property};
pub use properties::parse_index;
pub use script::{FunctionFlags, Script, ScriptArgument};
pub use stack::OperandStack;
pub use value::Value;
pub use visitor::{Visitable, Visitor};
