//! The dispatch loop and frame transitions.
//!
//! Calls and returns only push or pop [`Frame`]s; the loop picks up
//! whatever frame is on top, so script recursion never grows the native
//! stack. Native functions are the one exception: they may re-enter
//! [`Context::run`] through [`Context::call_function`], bounded by the same
//! call-depth ceiling.

use std::rc::Rc;

use crate::{
    AbortReason, ActionResult, ArgReader, Context, Frame, FrameKind, Function, NativeFrame,
    Object, ObjectKind, ObjectId, Script, ScriptError, ScriptFrame, ScriptFunction, StringId,
    Value, action::decode_action, actions,
    frame::{ReturnMode, register_count},
    script::FunctionFlags,
};

impl Context {
    fn check_depth(&mut self) -> bool {
        if self.frames.len() >= self.max_call_depth() {
            self.abort_with(AbortReason::StackOverflow {
                limit: self.max_call_depth(),
            });
            return false;
        }
        true
    }

    pub(crate) fn read_constant_pool(&mut self, bytes: &[u8]) -> Result<Vec<StringId>, ScriptError> {
        let mut reader = ArgReader::new("ConstantPool", bytes);
        let count = reader.u16()? as usize;
        let mut constants = Vec::with_capacity(count);
        for _ in 0..count {
            let text = reader.string()?;
            constants.push(self.heap.intern_owned(text));
        }
        Ok(constants)
    }

    /// Pushes a frame running `script` without an activation object;
    /// variables land on the target.
    pub(crate) fn push_script_frame(
        &mut self,
        script: Rc<Script>,
        target: Option<ObjectId>,
        this: Option<ObjectId>,
        return_mode: ReturnMode,
    ) -> bool {
        if self.is_aborted() || !self.check_depth() {
            return false;
        }
        let mut frame = ScriptFrame::new(script.clone(), target);
        frame.registers = vec![Value::Undefined; register_count(script.n_registers)];
        if let Some(pool) = &script.constant_pool {
            match self.read_constant_pool(pool) {
                Ok(constants) => frame.constants = constants,
                Err(err) => log::warn!("{}: {err}", script.name),
            }
        }
        log::debug!("enter script {} at depth {}", script.name, self.frames.len() + 1);
        self.frames.push(Frame {
            kind: FrameKind::Script(frame),
            this: this.or(target),
            function: None,
            stack_base: self.stack.len(),
            return_mode,
            construct: false,
        });
        true
    }

    /// Pushes a call to `function`. Returns `false` when it is not callable
    /// or the call-depth ceiling was hit.
    pub(crate) fn push_call(
        &mut self,
        function: ObjectId,
        this: Option<ObjectId>,
        args: Vec<Value>,
        return_mode: ReturnMode,
    ) -> bool {
        if self.is_aborted() {
            return false;
        }
        let Some(callee) = self.heap.object(function).and_then(Object::function).cloned() else {
            log::debug!("{function:?} is not callable");
            return false;
        };
        if !self.check_depth() {
            return false;
        }
        log::debug!("call {} at depth {}", callee.name(), self.frames.len() + 1);
        let construct = matches!(return_mode, ReturnMode::Construct(_));
        let stack_base = self.stack.len();
        let kind = match callee {
            Function::Native(native) => FrameKind::Native(NativeFrame {
                function: native,
                args,
            }),
            Function::Script(f) => FrameKind::Script(self.activate(function, f, this, args)),
        };
        self.frames.push(Frame {
            kind,
            this,
            function: Some(function),
            stack_base,
            return_mode,
            construct,
        });
        true
    }

    /// The object `super` refers to inside a method running on `this`.
    pub(crate) fn super_of(&self, this: ObjectId) -> Option<ObjectId> {
        let proto = self.heap.object(this)?.prototype?;
        self.heap.object(proto)?.prototype
    }

    fn activate(
        &mut self,
        function: ObjectId,
        f: ScriptFunction,
        this: Option<ObjectId>,
        args: Vec<Value>,
    ) -> ScriptFrame {
        let script = f.script.clone();
        let flags = script.flags;
        let mut frame = ScriptFrame::new(script.clone(), f.target);
        frame.registers = vec![Value::Undefined; register_count(script.n_registers)];
        if let Some(pool) = &script.constant_pool {
            match self.read_constant_pool(pool) {
                Ok(constants) => frame.constants = constants,
                Err(err) => log::warn!("{}: {err}", script.name),
            }
        }

        let activation = self.heap.alloc(Object::new(ObjectKind::Activation, None));
        frame.scope_chain = f.scope_chain;
        frame.scope_chain.push(activation);
        frame.locals = Some(activation);

        let wants_arguments = flags.contains(FunctionFlags::PRELOAD_ARGUMENTS)
            || !flags.contains(FunctionFlags::SUPPRESS_ARGUMENTS);
        let arguments = wants_arguments.then(|| {
            let array = self.new_array(&args);
            self.define_hidden(array, "callee", Value::Object(function));
            array
        });
        let super_ = this.and_then(|t| self.super_of(t));
        let parent = f
            .target
            .and_then(|t| self.get_member(t, self.names.parent))
            .unwrap_or_default();

        let preloads = [
            (FunctionFlags::PRELOAD_THIS, this.map_or(Value::Undefined, Value::Object)),
            (FunctionFlags::PRELOAD_ARGUMENTS, arguments.map_or(Value::Undefined, Value::Object)),
            (FunctionFlags::PRELOAD_SUPER, super_.map_or(Value::Undefined, Value::Object)),
            (FunctionFlags::PRELOAD_ROOT, Value::Object(self.root_target())),
            (FunctionFlags::PRELOAD_PARENT, parent),
            (FunctionFlags::PRELOAD_GLOBAL, Value::Object(self.global())),
        ];
        let mut register = 1;
        for (flag, value) in preloads {
            if flags.contains(flag) {
                if !frame.set_register(register, value) {
                    log::warn!("{}: preload register {register} out of range", script.name);
                }
                register += 1;
            }
        }

        if let Some(arguments) = arguments {
            if !flags.contains(FunctionFlags::PRELOAD_ARGUMENTS) {
                let key = self.names.arguments;
                self.store(activation, key, Value::Object(arguments));
            }
        }
        if let Some(super_) = super_ {
            if !flags.intersects(FunctionFlags::PRELOAD_SUPER | FunctionFlags::SUPPRESS_SUPER) {
                let key = self.names.super_;
                self.store(activation, key, Value::Object(super_));
            }
        }

        for (i, param) in script.arguments.iter().enumerate() {
            let value = args.get(i).copied().unwrap_or_default();
            if param.register != 0 {
                if !frame.set_register(param.register as usize, value) {
                    log::warn!("{}: parameter register {} out of range", script.name, param.register);
                }
            } else {
                let key = self.heap.intern(&param.name);
                self.store(activation, key, value);
            }
        }
        frame
    }

    /// Pops the top frame and delivers `value` per its return mode.
    pub(crate) fn return_from_frame(&mut self, value: Value) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        log::debug!("return at depth {}", self.frames.len() + 1);
        match frame.return_mode {
            ReturnMode::Push => {
                self.stack.truncate(frame.stack_base);
                self.stack.push(value);
            }
            ReturnMode::Construct(object) => {
                self.stack.truncate(frame.stack_base);
                self.stack.push(Value::Object(object));
            }
            ReturnMode::Discard => self.stack.truncate(frame.stack_base),
            ReturnMode::Leave => (),
        }
    }

    /// Drops frames above `floor` without delivering results.
    fn unwind_to(&mut self, floor: usize) {
        while self.frames.len() > floor {
            if let Some(frame) = self.frames.pop() {
                self.stack.truncate(frame.stack_base);
            }
        }
    }

    /// One unwinding step for the pending exception: leave the innermost
    /// block of the top frame, or drop the frame if it has none.
    fn unwind_exception(&mut self) {
        let end = self
            .current_script_frame()
            .and_then(|f| f.blocks.last())
            .map(|b| b.end);
        if let Some(end) = end {
            if let Some(frame) = self.current_script_frame_mut() {
                frame.pc = end;
            }
            self.check_block();
            return;
        }
        if let Some(frame) = self.frames.pop() {
            self.stack.truncate(frame.stack_base);
        }
        if self.frames.is_empty() {
            if let Some(exception) = self.exception.take() {
                let text = self.to_rust_string(exception);
                log::warn!("uncaught exception: {text}");
            }
        }
    }

    /// Executes until the frame on top at entry has returned.
    pub fn run(&mut self) {
        let Some(floor) = self.frames.len().checked_sub(1) else {
            return;
        };
        while self.frames.len() > floor {
            if self.is_aborted() {
                self.unwind_to(floor);
                break;
            }
            if self.exception.is_some() {
                self.unwind_exception();
                continue;
            }
            let native = match self.frames.last_mut().map(|f| &mut f.kind) {
                Some(FrameKind::Native(native)) => {
                    Some((native.function.clone(), std::mem::take(&mut native.args)))
                }
                _ => None,
            };
            match native {
                Some((function, args)) => {
                    let this = self.frames.last().and_then(|f| f.this);
                    let result = if args.len() < function.min_args {
                        log::debug!(
                            "{} needs {} arguments, got {}",
                            function.name,
                            function.min_args,
                            args.len()
                        );
                        Value::Undefined
                    } else {
                        (function.func)(self, this, &args)
                    };
                    if self.exception.is_none() && !self.is_aborted() {
                        self.return_from_frame(result);
                    }
                }
                None => self.run_script(),
            }
        }
    }

    /// Runs the top script frame until it calls, returns or throws.
    fn run_script(&mut self) {
        let depth = self.frames.len();
        let Some(frame) = self.current_script_frame() else {
            return;
        };
        if !frame.admitted {
            let script = frame.script.clone();
            if !self.permits(&script) {
                log::warn!("{} denied by the security policy", script.name);
                self.return_from_frame(Value::Undefined);
                return;
            }
            if let Some(frame) = self.current_script_frame_mut() {
                frame.admitted = true;
            }
        }

        loop {
            if self.frames.len() != depth || self.is_aborted() || self.exception.is_some() {
                return;
            }
            self.check_block();
            if self.exception.is_some() {
                return;
            }
            let Some((script, pc, base)) = self
                .frames
                .last()
                .and_then(|f| Some((f.script()?.script.clone(), f.script()?.pc, f.stack_base)))
            else {
                return;
            };

            if pc >= script.end() || script.buffer()[pc] == 0 {
                self.return_from_frame(Value::Undefined);
                return;
            }
            let action = match decode_action(script.buffer(), pc, script.end()) {
                Ok(action) => action,
                Err(err) => {
                    log::warn!("{}: {err}", script.name);
                    self.return_from_frame(Value::Undefined);
                    return;
                }
            };
            if let Some(frame) = self.current_script_frame_mut() {
                frame.pc = action.next;
            }
            let Some(spec) = actions::lookup(action.code) else {
                log::warn!(
                    "{}: unknown action 0x{:02X} at {pc}, skipping",
                    script.name,
                    action.code
                );
                continue;
            };
            if script.version < spec.since {
                log::debug!(
                    "{} is not defined for version {}, using the version {} handler",
                    spec.name,
                    script.version,
                    spec.handler_version(script.version)
                );
            }

            if let Some(consumed) = spec.effect.consumed {
                let padded = self.stack.ensure_size(base, consumed as usize);
                if padded > 0 {
                    log::debug!("{}: stack underflow, padded {padded} undefined", spec.name);
                }
            }
            if let Some(produced) = spec.effect.produced {
                self.stack.ensure_free(produced as usize);
            }
            let before = self.stack.len();
            if let Some(debugger) = self.heap.debugger_mut() {
                debugger.step(pc, action.code);
            }
            log::trace!("{pc:>6}: {}", spec.name);

            let result = (spec.handler)(self, &script.buffer()[action.args.clone()]);
            let same_frame = self.frames.len() == depth;
            match result {
                Ok(ActionResult::Continue) => {}
                Ok(ActionResult::Jump(target)) if same_frame => {
                    if !script.contains_pc(target) {
                        let err = ScriptError::JumpOutOfRange {
                            target,
                            start: script.start(),
                            end: script.end(),
                        };
                        log::warn!("{}: {err}", script.name);
                        self.return_from_frame(Value::Undefined);
                        return;
                    }
                    if let Some(frame) = self.current_script_frame_mut() {
                        frame.pc = target;
                    }
                }
                Ok(ActionResult::Jump(_)) => {}
                Err(err) => {
                    log::warn!("{}: {} at {pc}: {err}", script.name, spec.name);
                    continue;
                }
            }

            if let (Some(consumed), Some(produced)) = (spec.effect.consumed, spec.effect.produced) {
                if same_frame && self.exception.is_none() && !self.is_aborted() {
                    debug_assert_eq!(
                        self.stack.len(),
                        before - consumed as usize + produced as usize,
                        "stack effect mismatch for {}",
                        spec.name
                    );
                }
            }
        }
    }

    // ── Host-facing calls ────────────────────────────────────────────

    /// Calls `function` synchronously and returns its result. Exceptions
    /// it throws stay pending for the caller's frames.
    pub fn call_function(&mut self, function: ObjectId, this: Option<ObjectId>, args: &[Value]) -> Value {
        let base = self.stack.len();
        if !self.push_call(function, this, args.to_vec(), ReturnMode::Push) {
            return Value::Undefined;
        }
        self.run();
        let result = if self.stack.len() > base {
            self.stack.pop().unwrap_or_default()
        } else {
            Value::Undefined
        };
        self.stack.truncate(base);
        result
    }

    pub fn call_method(&mut self, object: ObjectId, name: &str, args: &[Value]) -> Value {
        let key = self.heap.intern(name);
        match self.get_member(object, key) {
            Some(Value::Object(function)) => self.call_function(function, Some(object), args),
            _ => Value::Undefined,
        }
    }

    /// `new constructor(args...)`.
    pub fn construct(&mut self, constructor: ObjectId, args: &[Value]) -> Value {
        if !self.is_function(constructor) {
            return Value::Undefined;
        }
        let object = self.new_instance(constructor);
        let base = self.stack.len();
        if !self.push_call(constructor, Some(object), args.to_vec(), ReturnMode::Construct(object)) {
            return Value::Undefined;
        }
        self.run();
        self.stack.truncate(base);
        Value::Object(object)
    }

    /// Whether the innermost frame was entered through `new`.
    pub fn is_constructing(&self) -> bool {
        self.frames.last().is_some_and(|f| f.construct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PushValue, ScriptBuilder};

    #[test]
    fn add_leaves_the_sum() {
        let mut context = Context::startup(8);
        let mut builder = ScriptBuilder::new(8);
        builder.push([PushValue::Int(10), PushValue::Int(20)]).add2();
        let values = context.execute(Rc::new(builder.build("add")));
        assert_eq!(values, vec![Value::Int(30)]);
        assert_eq!(context.call_depth(), 0);
    }

    #[test]
    fn unknown_actions_are_skipped() {
        let mut context = Context::startup(8);
        let mut builder = ScriptBuilder::new(8);
        builder.raw(&[0x01]).push([PushValue::Int(1)]);
        assert_eq!(context.execute(Rc::new(builder.build("skip"))), vec![Value::Int(1)]);
    }

    #[test]
    fn truncated_actions_end_the_frame() {
        let mut context = Context::startup(8);
        let script = Script::new("broken", 8, vec![0x96, 0x20, 0x00, 0x07]);
        assert!(context.execute(Rc::new(script)).is_empty());
        assert!(!context.is_aborted());
    }

    #[test]
    fn security_policy_can_deny_scripts() {
        struct DenyAll;
        impl crate::SecurityPolicy for DenyAll {
            fn permits(&self, _: &Script) -> bool {
                false
            }
        }
        let mut context = Context::startup(8);
        context.set_security(Box::new(DenyAll));
        let mut builder = ScriptBuilder::new(8);
        builder.push([PushValue::Int(1)]);
        assert!(context.execute(Rc::new(builder.build("denied"))).is_empty());
    }

    #[test]
    fn debugger_sees_each_action() {
        use std::cell::RefCell;

        struct Steps(Rc<RefCell<Vec<u8>>>);
        impl crate::DebugHook for Steps {
            fn step(&mut self, _: usize, action: u8) {
                self.0.borrow_mut().push(action);
            }
        }
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut context = Context::startup(8);
        context.set_debugger(Some(Box::new(Steps(seen.clone()))));
        let mut builder = ScriptBuilder::new(8);
        builder.push([PushValue::Int(1)]).pop();
        context.execute(Rc::new(builder.build("steps")));
        assert_eq!(*seen.borrow(), vec![0x96, 0x17]);
    }
}
