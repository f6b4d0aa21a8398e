//! Activation records, lexical blocks and identifier resolution.

use std::rc::Rc;

use crate::{
    Context, NativeFunction, ObjectId, Script, StringId, Value, Visitable, Visitor,
    script::DEFAULT_REGISTERS,
};

/// What happens to a frame's result once it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnMode {
    /// Push the return value for the caller.
    Push,
    /// Push the freshly constructed object, whatever the body returned.
    Construct(ObjectId),
    /// Drop whatever the frame left behind.
    Discard,
    /// Top-level script: values left on the stack stay there.
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchTarget {
    Register(u8),
    Variable(StringId),
}

/// Layout of a `try` statement. All positions are absolute pcs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryBlock {
    pub catch_start: usize,
    pub finally_start: usize,
    pub end: usize,
    pub has_catch: bool,
    pub has_finally: bool,
    pub catch_target: CatchTarget,
}

/// Pending cleanup run when the pc leaves a block's range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockKind {
    /// Pops the scope pushed by `with`.
    With,
    Try(TryBlock),
    Catch(TryBlock),
    Finally {
        /// Exception to rethrow once the finally body completes.
        exception: Option<Value>,
        /// Where a jump out of the protected region wanted to go.
        resume: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block {
    pub start: usize,
    pub end: usize,
    pub kind: BlockKind,
}

impl Block {
    #[inline]
    pub fn contains(&self, pc: usize) -> bool {
        pc >= self.start && pc < self.end
    }
}

#[derive(Debug)]
pub struct ScriptFrame {
    pub script: Rc<Script>,
    pub pc: usize,
    pub registers: Vec<Value>,
    /// Objects consulted before the target and global, outermost first.
    pub scope_chain: Vec<ObjectId>,
    /// Activation object receiving `var` declarations.
    pub locals: Option<ObjectId>,
    pub constants: Vec<StringId>,
    pub constant_pool: Option<Rc<[u8]>>,
    pub target: Option<ObjectId>,
    pub original_target: Option<ObjectId>,
    pub blocks: Vec<Block>,
    /// Set once the security policy has been consulted.
    pub admitted: bool,
}

impl ScriptFrame {
    pub fn new(script: Rc<Script>, target: Option<ObjectId>) -> Self {
        let registers = vec![Value::Undefined; script.n_registers as usize];
        let pc = script.start();
        Self {
            registers,
            pc,
            scope_chain: Vec::new(),
            locals: None,
            constants: Vec::new(),
            constant_pool: script.constant_pool.clone(),
            target,
            original_target: target,
            blocks: Vec::new(),
            admitted: false,
            script,
        }
    }

    pub fn register(&self, index: usize) -> Option<Value> {
        self.registers.get(index).copied()
    }

    pub fn set_register(&mut self, index: usize, value: Value) -> bool {
        match self.registers.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct NativeFrame {
    pub function: NativeFunction,
    pub args: Vec<Value>,
}

#[derive(Debug)]
pub enum FrameKind {
    Script(ScriptFrame),
    Native(NativeFrame),
}

#[derive(Debug)]
pub struct Frame {
    pub kind: FrameKind,
    pub this: Option<ObjectId>,
    pub function: Option<ObjectId>,
    /// Operand stack height when the frame was entered.
    pub stack_base: usize,
    pub return_mode: ReturnMode,
    pub construct: bool,
}

impl Frame {
    pub fn script(&self) -> Option<&ScriptFrame> {
        match &self.kind {
            FrameKind::Script(f) => Some(f),
            FrameKind::Native(_) => None,
        }
    }

    pub fn script_mut(&mut self) -> Option<&mut ScriptFrame> {
        match &mut self.kind {
            FrameKind::Script(f) => Some(f),
            FrameKind::Native(_) => None,
        }
    }
}

impl Visitable for Frame {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        self.this.visit_edges(visitor);
        self.function.visit_edges(visitor);
        if let ReturnMode::Construct(id) = self.return_mode {
            visitor.visit_object(id);
        }
        match &self.kind {
            FrameKind::Script(f) => {
                f.registers.visit_edges(visitor);
                f.scope_chain.visit_edges(visitor);
                f.locals.visit_edges(visitor);
                f.constants.visit_edges(visitor);
                f.target.visit_edges(visitor);
                f.original_target.visit_edges(visitor);
                for block in &f.blocks {
                    match block.kind {
                        BlockKind::Catch(TryBlock {
                            catch_target: CatchTarget::Variable(name),
                            ..
                        })
                        | BlockKind::Try(TryBlock {
                            catch_target: CatchTarget::Variable(name),
                            ..
                        }) => visitor.visit_string(name),
                        BlockKind::Finally {
                            exception: Some(value),
                            ..
                        } => visitor.visit(value),
                        _ => (),
                    }
                }
            }
            FrameKind::Native(f) => f.args.visit_edges(visitor),
        }
    }
}

impl Context {
    pub(crate) fn current_script_frame(&self) -> Option<&ScriptFrame> {
        self.frames.last().and_then(Frame::script)
    }

    pub(crate) fn current_script_frame_mut(&mut self) -> Option<&mut ScriptFrame> {
        self.frames.last_mut().and_then(Frame::script_mut)
    }

    /// Object receiving legacy movie-targeting actions.
    pub(crate) fn current_target(&self) -> ObjectId {
        self.current_script_frame()
            .and_then(|f| f.target)
            .unwrap_or_else(|| self.global())
    }

    fn names_equal(&self, a: StringId, b: StringId) -> bool {
        a == b
            || (self.version() < 7
                && self.heap.string(a).eq_ignore_ascii_case(&self.heap.string(b)))
    }

    /// Resolves an identifier: scope chain innermost first (with-scopes,
    /// the activation, captured scopes), then the target, then the global
    /// object. Returns the value and the object it was found on.
    pub fn get_variable(&mut self, name: StringId) -> Option<(Value, Option<ObjectId>)> {
        if self.names_equal(name, self.names.this) {
            let this = self.frames.last().and_then(|f| f.this);
            return Some((this.map_or(Value::Undefined, Value::Object), None));
        }
        if self.names_equal(name, self.names.global) {
            return Some((Value::Object(self.global()), None));
        }
        if self.names_equal(name, self.names.root) {
            return Some((Value::Object(self.root_target()), None));
        }
        for owner in self.variable_owners() {
            if let Some(value) = self.get_member(owner, name) {
                return Some((value, Some(owner)));
            }
        }
        None
    }

    /// Lookup order for identifiers in the current frame.
    fn variable_owners(&self) -> Vec<ObjectId> {
        let mut owners = Vec::new();
        if let Some(frame) = self.current_script_frame() {
            owners.extend(frame.scope_chain.iter().rev().copied());
            if let Some(target) = frame.target {
                owners.push(target);
            }
        }
        let global = self.global();
        if owners.last() != Some(&global) {
            owners.push(global);
        }
        owners
    }

    /// Assigns an identifier where it already lives. Unknown names are
    /// created on the target when `create` is set, since only `var`
    /// introduces locals. Returns whether anything was stored.
    pub fn set_variable(&mut self, name: StringId, value: Value, create: bool) -> bool {
        for owner in self.variable_owners() {
            if self.has_property(owner, name) {
                self.set_member(owner, name, value);
                return true;
            }
        }
        if create {
            let target = self.current_target();
            self.set_member(target, name, value);
        }
        create
    }

    /// `var name = value`: defines on the activation, or on the target for
    /// top-level code.
    pub fn define_local(&mut self, name: StringId, value: Value) {
        let owner = self
            .current_script_frame()
            .and_then(|f| f.locals)
            .unwrap_or_else(|| self.current_target());
        self.set_member(owner, name, value);
    }

    // ── Blocks ───────────────────────────────────────────────────────

    pub(crate) fn push_block(&mut self, start: usize, end: usize, kind: BlockKind) {
        if let Some(frame) = self.current_script_frame_mut() {
            frame.blocks.push(Block { start, end, kind });
        }
    }

    pub(crate) fn pop_block(&mut self) -> Option<Block> {
        self.current_script_frame_mut()?.blocks.pop()
    }

    /// Runs the cleanup of every block the pc has left, innermost first.
    /// A cleanup may move the pc and push a follow-up block (try into
    /// catch into finally); that block contains the new pc, which stops
    /// the loop.
    pub(crate) fn check_block(&mut self) {
        loop {
            let Some(frame) = self.current_script_frame() else {
                return;
            };
            let pc = frame.pc;
            match frame.blocks.last() {
                Some(block) if !block.contains(pc) => {}
                _ => return,
            }
            if let Some(block) = self.pop_block() {
                self.leave_block(block, pc);
            }
        }
    }

    fn set_pc(&mut self, pc: usize) {
        if let Some(frame) = self.current_script_frame_mut() {
            frame.pc = pc;
        }
    }

    fn leave_block(&mut self, block: Block, pc: usize) {
        match block.kind {
            BlockKind::With => {
                if let Some(frame) = self.current_script_frame_mut() {
                    frame.scope_chain.pop();
                }
            }
            BlockKind::Try(t) => {
                let exception = self.exception.take();
                match exception {
                    Some(exception) if t.has_catch => {
                        self.bind_catch(t.catch_target, exception);
                        self.push_block(t.catch_start, t.finally_start, BlockKind::Catch(t));
                        self.set_pc(t.catch_start);
                    }
                    Some(exception) if t.has_finally => {
                        self.enter_finally(t, Some(exception), None);
                    }
                    Some(exception) => self.exception = Some(exception),
                    None if t.has_finally => {
                        let resume = (pc != t.catch_start).then_some(pc);
                        self.enter_finally(t, None, resume);
                    }
                    None if pc == t.catch_start => self.set_pc(t.end),
                    None => (),
                }
            }
            BlockKind::Catch(t) => {
                if t.has_finally {
                    let exception = self.exception.take();
                    let resume = (exception.is_none() && pc != t.finally_start).then_some(pc);
                    self.enter_finally(t, exception, resume);
                }
            }
            BlockKind::Finally { exception, resume } => {
                if self.exception.is_some() {
                    return;
                }
                if exception.is_some() {
                    self.exception = exception;
                } else if let Some(resume) = resume {
                    if pc == block.end {
                        self.set_pc(resume);
                    }
                }
            }
        }
    }

    fn enter_finally(&mut self, t: TryBlock, exception: Option<Value>, resume: Option<usize>) {
        self.push_block(t.finally_start, t.end, BlockKind::Finally { exception, resume });
        self.set_pc(t.finally_start);
    }

    fn bind_catch(&mut self, target: CatchTarget, exception: Value) {
        match target {
            CatchTarget::Register(r) => {
                if let Some(frame) = self.current_script_frame_mut() {
                    if !frame.set_register(r as usize, exception) {
                        log::warn!("catch register {r} out of range");
                    }
                }
            }
            CatchTarget::Variable(name) => self.define_local(name, exception),
        }
    }
}

/// Register count for a frame running `script`.
pub(crate) fn register_count(declared: u16) -> usize {
    if declared == 0 {
        DEFAULT_REGISTERS as usize
    } else {
        declared as usize
    }
}
