//! Property access over the prototype chain.

use crate::{
    Context, Function, NativeFn, NativeFunction, Object, ObjectKind, ObjectId, PropFlags,
    ScriptFunction, StringId, Value, function::ConstructKind, natives,
};

/// Prototype chains longer than this are treated as cyclic.
pub const MAX_PROTOTYPE_DEPTH: usize = 256;

/// Parses an array index: canonical decimal without sign or leading
/// zeros, below `u32::MAX`.
pub fn parse_index(text: &str) -> Option<u32> {
    if text.is_empty() || (text.len() > 1 && text.starts_with('0')) {
        return None;
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<u32>().ok().filter(|&i| i != u32::MAX)
}

impl Context {
    /// The key under which `object` stores `key`, honouring version
    /// visibility and, below version 7, ASCII case folding.
    pub(crate) fn find_own(&self, object: ObjectId, key: StringId) -> Option<StringId> {
        let version = self.version();
        let obj = self.heap.object(object)?;
        if let Some(property) = obj.own(key) {
            return property.flags.visible_in(version).then_some(key);
        }
        if version >= 7 {
            return None;
        }
        let text = self.heap.string(key);
        obj.properties
            .iter()
            .find(|(k, p)| {
                p.flags.visible_in(version) && self.heap.string(**k).eq_ignore_ascii_case(&text)
            })
            .map(|(k, _)| *k)
    }

    fn prototype_of(&self, object: ObjectId) -> Option<ObjectId> {
        self.heap.object(object).and_then(|o| o.prototype)
    }

    /// Reads `key` from `object` or its prototypes.
    pub fn get_member(&self, object: ObjectId, key: StringId) -> Option<Value> {
        let obj = self.heap.object(object)?;
        if key == self.names.proto {
            return Some(obj.prototype.map_or(Value::Undefined, Value::Object));
        }
        if key == self.names.hidden_constructor {
            return Some(obj.constructor.map_or(Value::Undefined, Value::Object));
        }
        let mut current = Some(object);
        for _ in 0..MAX_PROTOTYPE_DEPTH {
            let id = current?;
            if let Some(found) = self.find_own(id, key) {
                return self
                    .heap
                    .object(id)
                    .and_then(|o| o.own(found))
                    .map(|p| p.value);
            }
            current = self.prototype_of(id);
        }
        log::warn!("prototype chain of {object:?} is too deep");
        None
    }

    /// Member access on an arbitrary value. Strings expose `length`;
    /// other primitives have no members.
    pub fn get_value_member(&mut self, value: Value, key: StringId) -> Value {
        match value {
            Value::Object(id) => self.get_member(id, key).unwrap_or_default(),
            Value::String(s) if key == self.names.length => {
                Value::Int(self.heap.string(s).chars().count() as i32)
            }
            _ => Value::Undefined,
        }
    }

    pub fn has_property(&self, object: ObjectId, key: StringId) -> bool {
        key == self.names.proto || self.get_member(object, key).is_some()
    }

    pub fn has_own_property(&self, object: ObjectId, key: StringId) -> bool {
        self.find_own(object, key).is_some()
    }

    /// Assigns `key` on `object` itself. Read-only properties ignore the
    /// write; arrays keep `length` in sync.
    pub fn set_member(&mut self, object: ObjectId, key: StringId, value: Value) {
        if key == self.names.proto {
            if let Some(obj) = self.heap.object_mut(object) {
                obj.prototype = value.as_object();
            }
            return;
        }
        if key == self.names.hidden_constructor {
            if let Some(obj) = self.heap.object_mut(object) {
                obj.constructor = value.as_object();
            }
            return;
        }
        let existing = self.find_own(object, key);
        let Some(obj) = self.heap.object(object) else {
            return;
        };
        if let Some(found) = existing {
            if obj
                .own(found)
                .is_some_and(|p| p.flags.contains(PropFlags::READONLY))
            {
                log::debug!("write to read-only property ignored");
                return;
            }
        }
        let key = existing.unwrap_or(key);
        if obj.is_array() {
            natives::array::set_array_member(self, object, key, value);
        } else {
            self.store(object, key, value);
        }
    }

    /// Writes without any special-casing, keeping existing flags.
    pub(crate) fn store(&mut self, object: ObjectId, key: StringId, value: Value) {
        match self.heap.object_mut(object).and_then(|obj| obj.own_mut(key)) {
            Some(property) => property.value = value,
            None => self.heap.define_property(object, key, value, PropFlags::empty()),
        }
    }

    /// Defines or overwrites a property with explicit flags.
    pub fn define_property(&mut self, object: ObjectId, key: StringId, value: Value, flags: PropFlags) {
        self.heap.define_property(object, key, value, flags);
    }

    pub(crate) fn define_hidden(&mut self, object: ObjectId, name: &str, value: Value) {
        let key = self.heap.intern_static(name);
        self.define_property(object, key, value, PropFlags::HIDDEN);
    }

    /// Removes an own property. Permanent properties refuse.
    pub fn delete_member(&mut self, object: ObjectId, key: StringId) -> bool {
        let Some(found) = self.find_own(object, key) else {
            return false;
        };
        let refused = self
            .heap
            .object(object)
            .and_then(|obj| obj.own(found))
            .is_none_or(|p| p.flags.contains(PropFlags::PERMANENT));
        if refused {
            return false;
        }
        self.heap.remove_property(object, found).is_some()
    }

    /// Enumerable names of `object` and its prototypes, own first.
    pub fn enumerate(&self, object: ObjectId) -> Vec<StringId> {
        let version = self.version();
        let mut names = Vec::new();
        let mut seen = ahash::AHashSet::new();
        let mut current = Some(object);
        for _ in 0..MAX_PROTOTYPE_DEPTH {
            let Some(id) = current else {
                break;
            };
            let Some(obj) = self.heap.object(id) else {
                break;
            };
            for (&key, property) in &obj.properties {
                if !seen.insert(key) {
                    continue;
                }
                if property.flags.contains(PropFlags::HIDDEN) || !property.flags.visible_in(version)
                {
                    continue;
                }
                names.push(key);
            }
            current = obj.prototype;
        }
        names
    }

    /// Whether `constructor.prototype` (or an interface registered on one
    /// of the prototypes) appears on `object`'s chain.
    pub fn instance_of(&self, object: ObjectId, constructor: ObjectId) -> bool {
        let Some(Value::Object(target)) = self.get_member(constructor, self.names.prototype) else {
            return false;
        };
        let mut current = self.prototype_of(object);
        for _ in 0..MAX_PROTOTYPE_DEPTH {
            let Some(id) = current else {
                return false;
            };
            if id == target {
                return true;
            }
            if let Some(obj) = self.heap.object(id) {
                let implements = obj.interfaces.iter().any(|&interface| {
                    interface == target
                        || self.get_member(interface, self.names.prototype)
                            == Some(Value::Object(target))
                });
                if implements {
                    return true;
                }
            }
            current = self.prototype_of(id);
        }
        false
    }

    pub fn is_function(&self, id: ObjectId) -> bool {
        self.heap.object(id).is_some_and(|o| o.function().is_some())
    }

    pub fn is_array(&self, id: ObjectId) -> bool {
        self.heap.object(id).is_some_and(Object::is_array)
    }

    // ── Allocation ───────────────────────────────────────────────────

    pub fn new_object(&mut self) -> ObjectId {
        let proto = self.specials.object_prototype;
        self.heap.alloc(Object::new(ObjectKind::Plain, Some(proto)))
    }

    pub fn new_array(&mut self, values: &[Value]) -> ObjectId {
        let proto = self.specials.array_prototype;
        let id = self.heap.alloc(Object::new(ObjectKind::Array, Some(proto)));
        natives::array::init_length(self, id);
        natives::array::set_range(self, id, 0, values);
        id
    }

    /// Allocates the object `new` hands to a constructor.
    pub(crate) fn new_instance(&mut self, constructor: ObjectId) -> ObjectId {
        let kind = self
            .heap
            .object(constructor)
            .and_then(Object::function)
            .map(Function::construct_kind)
            .unwrap_or_default();
        let prototype = match self.get_member(constructor, self.names.prototype) {
            Some(Value::Object(proto)) => proto,
            _ => self.specials.object_prototype,
        };
        let id = match kind {
            ConstructKind::Array => {
                let id = self.heap.alloc(Object::new(ObjectKind::Array, Some(prototype)));
                natives::array::init_length(self, id);
                id
            }
            ConstructKind::Object => self.heap.alloc(Object::new(ObjectKind::Plain, Some(prototype))),
        };
        if let Some(obj) = self.heap.object_mut(id) {
            obj.constructor = Some(constructor);
        }
        if self.version() < 6 {
            let key = self.names.constructor;
            self.define_property(id, key, Value::Object(constructor), PropFlags::HIDDEN);
        }
        id
    }

    pub fn new_native_function(
        &mut self,
        name: &'static str,
        min_args: usize,
        func: NativeFn,
        construct: ConstructKind,
    ) -> ObjectId {
        let proto = self.specials.function_prototype;
        self.heap.alloc(Object::new(
            ObjectKind::Function(Function::Native(NativeFunction {
                name,
                min_args,
                func,
                construct,
            })),
            Some(proto),
        ))
    }

    /// A script function plus its fresh `prototype` object.
    pub(crate) fn new_script_function(&mut self, function: ScriptFunction) -> ObjectId {
        let proto = self.specials.function_prototype;
        let id = self.heap.alloc(Object::new(
            ObjectKind::Function(Function::Script(function)),
            Some(proto),
        ));
        let prototype = self.new_object();
        let key = self.names.constructor;
        self.define_property(prototype, key, Value::Object(id), PropFlags::HIDDEN);
        let key = self.names.prototype;
        self.define_property(id, key, Value::Object(prototype), PropFlags::HIDDEN);
        id
    }

    pub(crate) fn index_key(&mut self, index: usize) -> StringId {
        self.heap.intern_owned(index.to_string())
    }

    // ── Host conveniences ────────────────────────────────────────────

    pub fn get(&mut self, object: ObjectId, name: &str) -> Value {
        let key = self.heap.intern(name);
        self.get_member(object, key).unwrap_or_default()
    }

    pub fn set(&mut self, object: ObjectId, name: &str, value: Value) {
        let key = self.heap.intern(name);
        self.set_member(object, key, value);
    }

    pub fn new_string(&mut self, text: &str) -> Value {
        Value::String(self.heap.intern(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_parsing_is_canonical() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("42"), Some(42));
        assert_eq!(parse_index("042"), None);
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("1.5"), None);
        assert_eq!(parse_index("4294967295"), None);
        assert_eq!(parse_index(""), None);
    }

    #[test]
    fn lookups_walk_the_prototype_chain() {
        let mut context = Context::startup(8);
        let parent = context.new_object();
        let child = context.new_object();
        context.set(parent, "shared", Value::Int(1));
        context.set(child, "__proto__", Value::Object(parent));
        assert_eq!(context.get(child, "shared"), Value::Int(1));
        context.set(child, "shared", Value::Int(2));
        assert_eq!(context.get(child, "shared"), Value::Int(2));
        assert_eq!(context.get(parent, "shared"), Value::Int(1));
    }

    #[test]
    fn flags_guard_writes_and_deletes() {
        let mut context = Context::startup(8);
        let object = context.new_object();
        let key = context.get_string("fixed");
        context.define_property(
            object,
            key,
            Value::Int(1),
            PropFlags::READONLY | PropFlags::PERMANENT,
        );
        context.set_member(object, key, Value::Int(2));
        assert_eq!(context.get_member(object, key), Some(Value::Int(1)));
        assert!(!context.delete_member(object, key));
        let other = context.get_string("loose");
        context.set_member(object, other, Value::Int(3));
        assert!(context.delete_member(object, other));
        assert_eq!(context.get_member(object, other), None);
    }

    #[test]
    fn old_versions_fold_case() {
        let mut context = Context::startup(6);
        let object = context.new_object();
        context.set(object, "Score", Value::Int(10));
        assert_eq!(context.get(object, "score"), Value::Int(10));
        context.set(object, "SCORE", Value::Int(11));
        assert_eq!(context.get(object, "Score"), Value::Int(11));

        let mut strict = Context::startup(7);
        let object = strict.new_object();
        strict.set(object, "Score", Value::Int(10));
        assert_eq!(strict.get(object, "score"), Value::Undefined);
    }

    #[test]
    fn enumeration_skips_hidden_properties() {
        let mut context = Context::startup(8);
        let object = context.new_object();
        context.set(object, "a", Value::Int(1));
        context.define_hidden(object, "secret", Value::Int(2));
        context.set(object, "b", Value::Int(3));
        let names: Vec<String> = context
            .enumerate(object)
            .into_iter()
            .map(|k| context.string(k).to_string())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }
}
