use std::rc::Rc;

use crate::{Context, ObjectId, Script, Value, Visitable, Visitor};

/// Native capability exposed to scripts.
///
/// `args` is only valid for the duration of the call; the interpreter has
/// already checked `min_args` before invoking the function.
pub type NativeFn = fn(&mut Context, Option<ObjectId>, &[Value]) -> Value;

/// Which specialisation `new` allocates before running a constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstructKind {
    #[default]
    Object,
    Array,
}

#[derive(Debug, Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub min_args: usize,
    pub func: NativeFn,
    pub construct: ConstructKind,
}

#[derive(Debug, Clone)]
pub struct ScriptFunction {
    pub script: Rc<Script>,
    /// Scope chain captured at definition time, outermost first.
    pub scope_chain: Vec<ObjectId>,
    pub target: Option<ObjectId>,
}

#[derive(Debug, Clone)]
pub enum Function {
    Script(ScriptFunction),
    Native(NativeFunction),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Script(f) => &f.script.name,
            Function::Native(f) => f.name,
        }
    }

    pub fn construct_kind(&self) -> ConstructKind {
        match self {
            Function::Script(_) => ConstructKind::Object,
            Function::Native(f) => f.construct,
        }
    }
}

impl Visitable for Function {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        if let Function::Script(f) = self {
            f.scope_chain.visit_edges(visitor);
            f.target.visit_edges(visitor);
        }
    }
}
