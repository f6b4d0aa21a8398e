use std::{cell::RefCell, fmt, rc::Rc, time::Instant};

use crate::{
    AbortReason, CollectError, DebugHook, Frame, GcStats, Heap, HeapSettings, MovieHost,
    NullMovie, Object, ObjectKind, ObjectId, OperandStack, OutOfMemory, RootProvider, Script,
    SettingsError, StringId, Value, Visitable, Visitor, natives,
    stack::DEFAULT_SEGMENT_SIZE,
};

/// Default ceiling for nested calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Lines written by `trace`, shared with the host.
pub type TraceLog = Rc<RefCell<Vec<String>>>;

/// Decides whether a script may run at all. Denied frames return
/// `undefined` without executing.
pub trait SecurityPolicy {
    fn permits(&self, script: &Script) -> bool {
        let _ = script;
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl SecurityPolicy for AllowAll {}

#[derive(Debug)]
pub struct ContextCreateInfo {
    /// Language version assumed when no script frame is active.
    pub version: u8,
    pub heap: HeapSettings,
    pub max_call_depth: usize,
    pub stack_segment_size: usize,
    pub random_seed: Option<u64>,
    /// Run once after the built-ins are installed.
    pub init_script: Option<Script>,
}

impl Default for ContextCreateInfo {
    fn default() -> Self {
        Self {
            version: 8,
            heap: HeapSettings::default(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            stack_segment_size: DEFAULT_SEGMENT_SIZE,
            random_seed: None,
            init_script: None,
        }
    }
}

impl ContextCreateInfo {
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.heap.validate()?;
        if self.max_call_depth == 0 {
            return Err(SettingsError("max_call_depth must be non-zero"));
        }
        if self.stack_segment_size == 0 {
            return Err(SettingsError("stack_segment_size must be non-zero"));
        }
        Ok(())
    }
}

/// Strings the engine compares against by identity. Interned as static so
/// they survive every collection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Keywords {
    pub empty: StringId,
    pub length: StringId,
    pub prototype: StringId,
    pub proto: StringId,
    pub constructor: StringId,
    pub hidden_constructor: StringId,
    pub this: StringId,
    pub arguments: StringId,
    pub callee: StringId,
    pub caller: StringId,
    pub super_: StringId,
    pub global: StringId,
    pub root: StringId,
    pub parent: StringId,
    pub undefined: StringId,
    pub null: StringId,
    pub true_: StringId,
    pub false_: StringId,
    pub value_of: StringId,
    pub to_string: StringId,
    pub object_object: StringId,
    pub type_object: StringId,
    pub type_function: StringId,
    pub nan: StringId,
    pub infinity: StringId,
    pub negative_infinity: StringId,
}

impl Keywords {
    fn intern(heap: &mut Heap) -> Self {
        let mut s = |text: &str| heap.intern_static(text);
        Self {
            empty: s(""),
            length: s("length"),
            prototype: s("prototype"),
            proto: s("__proto__"),
            constructor: s("constructor"),
            hidden_constructor: s("__constructor__"),
            this: s("this"),
            arguments: s("arguments"),
            callee: s("callee"),
            caller: s("caller"),
            super_: s("super"),
            global: s("_global"),
            root: s("_root"),
            parent: s("_parent"),
            undefined: s("undefined"),
            null: s("null"),
            true_: s("true"),
            false_: s("false"),
            value_of: s("valueOf"),
            to_string: s("toString"),
            object_object: s("[object Object]"),
            type_object: s("[type Object]"),
            type_function: s("[type Function]"),
            nan: s("NaN"),
            infinity: s("Infinity"),
            negative_infinity: s("-Infinity"),
        }
    }
}

/// Objects every context owns from startup. All of them are rooted.
#[derive(Debug, Clone, Copy)]
pub struct SpecialObjects {
    pub global: ObjectId,
    pub object_prototype: ObjectId,
    pub function_prototype: ObjectId,
    pub array_prototype: ObjectId,
}

/// One VM instance: heap, operand stack, call chain and built-ins.
pub struct Context {
    pub(crate) heap: Heap,
    pub(crate) stack: OperandStack,
    pub(crate) frames: Vec<Frame>,
    pub(crate) names: Keywords,
    pub(crate) specials: SpecialObjects,
    /// Exception currently unwinding, if any.
    pub(crate) exception: Option<Value>,
    pub(crate) rng: fastrand::Rng,
    version: u8,
    max_call_depth: usize,
    movie: Box<dyn MovieHost>,
    security: Box<dyn SecurityPolicy>,
    trace_log: TraceLog,
    started: Instant,
    root_target: Option<ObjectId>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("version", &self.version)
            .field("heap", &self.heap)
            .field("stack", &self.stack.len())
            .field("frames", &self.frames.len())
            .field("exception", &self.exception)
            .finish()
    }
}

struct ContextRoots<'a> {
    stack: &'a OperandStack,
    frames: &'a [Frame],
    exception: Option<Value>,
    root_target: Option<ObjectId>,
}

struct ForwardValues<'a>(&'a mut dyn FnMut(Value));

impl Visitor for ForwardValues<'_> {
    fn visit_object(&mut self, id: ObjectId) {
        (self.0)(Value::Object(id));
    }

    fn visit_string(&mut self, id: StringId) {
        (self.0)(Value::String(id));
    }
}

impl RootProvider for ContextRoots<'_> {
    fn visit_roots(&self, visitor: &mut dyn FnMut(Value)) {
        self.stack.iter().for_each(&mut *visitor);
        if let Some(exception) = self.exception {
            visitor(exception);
        }
        if let Some(target) = self.root_target {
            visitor(Value::Object(target));
        }
        let mut forward = ForwardValues(visitor);
        for frame in self.frames {
            frame.visit_edges(&mut forward);
        }
    }
}

impl Context {
    pub fn new(info: ContextCreateInfo) -> Result<Self, SettingsError> {
        info.validate()?;
        Ok(Self::build(info))
    }

    /// A context with default settings for scripts of `version`.
    pub fn startup(version: u8) -> Self {
        Self::build(ContextCreateInfo {
            version,
            ..ContextCreateInfo::default()
        })
    }

    fn build(info: ContextCreateInfo) -> Self {
        let mut heap = Heap::new(info.heap);
        let names = Keywords::intern(&mut heap);

        let object_prototype = heap.alloc(Object::new(ObjectKind::Plain, None));
        let function_prototype =
            heap.alloc(Object::new(ObjectKind::Plain, Some(object_prototype)));
        let array_prototype = heap.alloc(Object::new(ObjectKind::Plain, Some(object_prototype)));
        let global = heap.alloc(Object::new(ObjectKind::Plain, Some(object_prototype)));
        for id in [object_prototype, function_prototype, array_prototype, global] {
            heap.set_rooted(id, true);
        }

        let rng = match info.random_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        let mut context = Self {
            heap,
            stack: OperandStack::new(info.stack_segment_size),
            frames: Vec::new(),
            names,
            specials: SpecialObjects {
                global,
                object_prototype,
                function_prototype,
                array_prototype,
            },
            exception: None,
            rng,
            version: info.version,
            max_call_depth: info.max_call_depth,
            movie: Box::new(NullMovie),
            security: Box::new(AllowAll),
            trace_log: TraceLog::default(),
            started: Instant::now(),
            root_target: None,
        };
        natives::install(&mut context);
        log::debug!(
            "context started for version {}: {} bytes in use",
            context.version,
            context.heap.memory_used()
        );

        if let Some(script) = info.init_script {
            let leftover = context.execute(Rc::new(script));
            if !leftover.is_empty() {
                log::debug!("init script left {} values on the stack", leftover.len());
            }
        }
        context
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Version of the innermost running script, or the context default.
    pub fn version(&self) -> u8 {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.script().map(|s| s.script.version))
            .unwrap_or(self.version)
    }

    #[inline]
    pub fn global(&self) -> ObjectId {
        self.specials.global
    }

    #[inline]
    pub fn specials(&self) -> &SpecialObjects {
        &self.specials
    }

    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[inline]
    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    #[inline]
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    pub fn pending_exception(&self) -> Option<Value> {
        self.exception
    }

    pub fn trace_log(&self) -> TraceLog {
        self.trace_log.clone()
    }

    pub(crate) fn trace(&mut self, line: String) {
        log::info!(target: "trace", "{line}");
        self.trace_log.borrow_mut().push(line);
    }

    pub fn set_movie(&mut self, movie: Box<dyn MovieHost>) {
        self.movie = movie;
    }

    pub(crate) fn movie(&mut self) -> &mut dyn MovieHost {
        self.movie.as_mut()
    }

    pub fn set_security(&mut self, policy: Box<dyn SecurityPolicy>) {
        self.security = policy;
    }

    pub(crate) fn permits(&self, script: &Script) -> bool {
        self.security.permits(script)
    }

    pub fn set_debugger(&mut self, debugger: Option<Box<dyn DebugHook>>) {
        self.heap.set_debugger(debugger);
    }

    /// Object `_root` and absolute slash paths resolve to.
    pub fn root_target(&self) -> ObjectId {
        self.root_target.unwrap_or(self.specials.global)
    }

    pub fn set_root_target(&mut self, target: Option<ObjectId>) {
        self.root_target = target;
    }

    pub(crate) fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    // ── Abort ────────────────────────────────────────────────────────

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.heap.abort(AbortReason::Host(reason.into()));
    }

    pub(crate) fn abort_with(&mut self, reason: AbortReason) {
        self.heap.abort(reason);
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.heap.aborted().is_some()
    }

    pub fn aborted(&self) -> Option<&AbortReason> {
        self.heap.aborted()
    }

    // ── Memory ───────────────────────────────────────────────────────

    pub fn use_mem(&mut self, bytes: usize) -> Result<(), OutOfMemory> {
        self.heap.use_mem(bytes)
    }

    pub fn unuse_mem(&mut self, bytes: usize) {
        self.heap.unuse_mem(bytes);
    }

    /// Full collection. Refused while any frame is active.
    pub fn collect(&mut self) -> Result<GcStats, CollectError> {
        if !self.frames.is_empty() {
            return Err(CollectError::FrameActive(self.frames.len()));
        }
        if self.is_aborted() {
            return Err(CollectError::Aborted);
        }
        Ok(self.collect_now())
    }

    fn collect_now(&mut self) -> GcStats {
        let roots = ContextRoots {
            stack: &self.stack,
            frames: &self.frames,
            exception: self.exception,
            root_target: self.root_target,
        };
        self.heap.collect(&roots)
    }

    /// Collects once enough has been allocated since the last cycle.
    pub fn maybe_collect(&mut self) -> Option<GcStats> {
        if self.heap.since_gc() < self.heap.settings().gc_threshold {
            return None;
        }
        self.collect().ok()
    }

    /// Keeps `id` alive until unrooted, whether or not scripts reach it.
    pub fn root(&mut self, id: ObjectId) {
        self.heap.set_rooted(id, true);
    }

    pub fn unroot(&mut self, id: ObjectId) {
        self.heap.set_rooted(id, false);
    }

    /// Tears the context down. Every object must be collectable by now.
    pub fn dispose(mut self) {
        self.frames.clear();
        self.stack.truncate(0);
        self.exception = None;
        self.root_target = None;
        self.heap.unroot_all();
        self.collect_now();
        assert_eq!(
            self.heap.memory_used(),
            0,
            "context disposed with live memory"
        );
    }

    // ── Strings ──────────────────────────────────────────────────────

    pub fn get_string(&mut self, text: &str) -> StringId {
        self.heap.intern(text)
    }

    pub fn give_string(&mut self, text: String) -> StringId {
        self.heap.intern_owned(text)
    }

    pub fn string(&self, id: StringId) -> Rc<str> {
        self.heap.string(id)
    }

    // ── Script entry points ──────────────────────────────────────────

    /// Queues `script` as a top-level frame running on `target`. Call
    /// [`Context::run`] to execute it.
    pub fn push_script(&mut self, script: Rc<Script>, target: Option<ObjectId>) -> bool {
        let target = target.unwrap_or_else(|| self.root_target());
        self.push_script_frame(script, Some(target), None, crate::ReturnMode::Leave)
    }

    /// Runs `script` to completion on the root target and returns whatever
    /// it left on the operand stack, bottom first.
    ///
    /// Returned handles are not rooted; root them before collecting.
    pub fn execute(&mut self, script: Rc<Script>) -> Vec<Value> {
        self.execute_on(script, None)
    }

    pub fn execute_on(&mut self, script: Rc<Script>, target: Option<ObjectId>) -> Vec<Value> {
        if self.is_aborted() {
            return Vec::new();
        }
        let base = self.stack.len();
        if !self.push_script(script, target) {
            return Vec::new();
        }
        self.run();
        self.stack.drain_from(base)
    }

    // ── Paths ────────────────────────────────────────────────────────

    /// Evaluates a variable path relative to `object` (or the current
    /// scope when `None`). Dots separate members; paths containing `/` or
    /// `:` use slash notation (`/clip/inner:variable`).
    pub fn eval(&mut self, object: Option<ObjectId>, path: &str) -> Value {
        if self.is_aborted() {
            return Value::Undefined;
        }
        if path.contains(['/', ':']) {
            let (target, variable) = match path.rsplit_once(':') {
                Some((target, variable)) => (target, Some(variable)),
                None => (path, None),
            };
            let Some(target) = self.resolve_target(object, target) else {
                return Value::Undefined;
            };
            return match variable {
                Some(name) => {
                    let key = self.heap.intern(name);
                    self.get_member(target, key).unwrap_or_default()
                }
                None => Value::Object(target),
            };
        }

        let mut parts = path.split('.');
        let first = self.heap.intern(parts.next().unwrap_or_default());
        let mut current = match object {
            Some(object) => self.get_member(object, first).unwrap_or_default(),
            None => self.get_variable(first).map(|(v, _)| v).unwrap_or_default(),
        };
        for part in parts {
            let key = self.heap.intern(part);
            current = self.get_value_member(current, key);
        }
        current
    }

    /// Resolves a movie target path. A leading `/` starts at the root,
    /// `..` climbs to `_parent`, an empty path is `from` itself.
    pub fn resolve_target(&mut self, from: Option<ObjectId>, path: &str) -> Option<ObjectId> {
        let from = from.unwrap_or_else(|| self.current_target());
        if let Some(found) = self.movie.resolve_target(from, path) {
            return Some(found);
        }
        let (mut current, rest) = match path.strip_prefix('/') {
            Some(rest) => (self.root_target(), rest),
            None => (from, path),
        };
        for segment in rest.split(['/', '.']).filter(|s| !s.is_empty()) {
            let key = match segment {
                ".." => self.names.parent,
                "_root" => {
                    current = self.root_target();
                    continue;
                }
                name => self.heap.intern(name),
            };
            current = self.get_member(current, key)?.as_object()?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PushValue, ScriptBuilder, object::PROPERTY_SIZE};

    #[test]
    fn fresh_context_disposes_cleanly() {
        let context = Context::startup(8);
        assert!(context.heap().memory_used() > 0);
        context.dispose();
    }

    #[test]
    fn settings_are_validated() {
        let info = ContextCreateInfo {
            max_call_depth: 0,
            ..ContextCreateInfo::default()
        };
        assert!(Context::new(info).is_err());
    }

    #[test]
    fn collection_frees_unreachable_script_objects() {
        let mut context = Context::startup(8);
        let mut builder = ScriptBuilder::new(8);
        builder.push([PushValue::Int(0)]).init_object().pop();
        context.execute(Rc::new(builder.build("garbage")));
        let before = context.heap().object_count();
        let stats = context.collect().unwrap();
        assert_eq!(stats.objects_freed, 1);
        assert_eq!(context.heap().object_count(), before - 1);
        context.dispose();
    }

    #[test]
    fn eval_follows_dot_and_slash_paths() {
        let mut context = Context::startup(8);
        let clip = context.new_object();
        let inner = context.new_object();
        let key = context.get_string("clip");
        let global = context.global();
        context.set_member(global, key, Value::Object(clip));
        let key = context.get_string("inner");
        context.set_member(clip, key, Value::Object(inner));
        let key = context.get_string("x");
        context.set_member(inner, key, Value::Int(5));

        assert_eq!(context.eval(None, "clip.inner.x"), Value::Int(5));
        assert_eq!(context.eval(None, "/clip/inner:x"), Value::Int(5));
        assert_eq!(context.eval(Some(clip), "inner.x"), Value::Int(5));
        assert_eq!(context.eval(None, "/clip/inner"), Value::Object(inner));
        assert_eq!(context.eval(None, "clip.missing.x"), Value::Undefined);
    }

    #[test]
    fn host_memory_accounting_round_trips() {
        let mut context = Context::startup(8);
        let before = context.heap().memory_used();
        context.use_mem(128).unwrap();
        assert_eq!(context.heap().memory_used(), before + 128);
        context.unuse_mem(128);
        assert_eq!(context.heap().memory_used(), before);
        context.dispose();
    }

    #[test]
    fn property_tables_are_charged_per_entry() {
        let mut context = Context::startup(8);
        let values: Vec<Value> = (0..1000).map(Value::Int).collect();
        context.new_array(&values);

        let before = context.heap().memory_used();
        let second = context.new_array(&values);
        let charged = context.heap().memory_used() - before;
        assert!(charged >= 1001 * PROPERTY_SIZE, "charged {charged} bytes");

        let before = context.heap().memory_used();
        let key = context.get_string("0");
        assert!(context.delete_member(second, key));
        assert_eq!(context.heap().memory_used(), before - PROPERTY_SIZE);

        context.collect().unwrap();
        context.dispose();
    }

    #[test]
    fn filling_a_table_hits_the_memory_limit() {
        let mut context = Context::new(ContextCreateInfo {
            heap: HeapSettings {
                memory_limit: Some(1 << 20),
                ..HeapSettings::default()
            },
            ..ContextCreateInfo::default()
        })
        .unwrap();
        assert!(!context.is_aborted());
        let values: Vec<Value> = (0..100_000).map(Value::Int).collect();
        context.new_array(&values);
        assert!(matches!(
            context.aborted(),
            Some(AbortReason::OutOfMemory { .. })
        ));
    }

    #[test]
    fn host_abort_stops_execution() {
        let mut context = Context::startup(8);
        context.abort("shutting down");
        let mut builder = ScriptBuilder::new(8);
        builder.push([PushValue::Int(1)]);
        assert!(context.execute(Rc::new(builder.build("after abort"))).is_empty());
        assert!(matches!(context.aborted(), Some(AbortReason::Host(_))));
        assert!(matches!(context.collect(), Err(CollectError::Aborted)));
    }
}
