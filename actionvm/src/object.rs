use std::{fmt, mem};

use bitflags::bitflags;
use indexmap::IndexMap;

use crate::{Function, StringId, Value, Visitable, Visitor, arena::RawHandle};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) RawHandle);

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({:?})", self.0)
    }
}

bitflags! {
    /// Per-property attributes. The bit values match the ones scripts pass
    /// to `ASSetPropFlags`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct PropFlags: u16 {
        const HIDDEN = 1 << 0;
        const PERMANENT = 1 << 1;
        const READONLY = 1 << 2;
        const VERSION_6_UP = 1 << 7;
        const VERSION_NOT_6 = 1 << 8;
        const VERSION_7_UP = 1 << 10;
        const VERSION_8_UP = 1 << 12;
        const VERSION_9_UP = 1 << 13;
    }
}

impl PropFlags {
    pub const VERSION_MASK: PropFlags = PropFlags::VERSION_6_UP
        .union(PropFlags::VERSION_NOT_6)
        .union(PropFlags::VERSION_7_UP)
        .union(PropFlags::VERSION_8_UP)
        .union(PropFlags::VERSION_9_UP);

    /// Whether a property carrying these flags exists for scripts of `version`.
    pub fn visible_in(self, version: u8) -> bool {
        if self.contains(PropFlags::VERSION_6_UP) && version < 6 {
            return false;
        }
        if self.contains(PropFlags::VERSION_NOT_6) && version == 6 {
            return false;
        }
        if self.contains(PropFlags::VERSION_7_UP) && version < 7 {
            return false;
        }
        if self.contains(PropFlags::VERSION_8_UP) && version < 8 {
            return false;
        }
        if self.contains(PropFlags::VERSION_9_UP) && version < 9 {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Property {
    pub value: Value,
    pub flags: PropFlags,
}

impl Property {
    pub fn new(value: Value, flags: PropFlags) -> Self {
        Self { value, flags }
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct ObjectFlags: u8 {
        const MARKED = 1 << 0;
        /// Kept alive regardless of reachability.
        const ROOTED = 1 << 1;
    }
}

/// Specialisations sharing the generic property table.
#[derive(Debug)]
pub enum ObjectKind {
    Plain,
    /// Indexed properties plus a `length` kept in sync on every set.
    Array,
    Function(Function),
    /// Local variable store of one function activation.
    Activation,
    Boolean(bool),
    Number(f64),
    String(StringId),
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Plain => "Object",
            ObjectKind::Array => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Activation => "Activation",
            ObjectKind::Boolean(_) => "Boolean",
            ObjectKind::Number(_) => "Number",
            ObjectKind::String(_) => "String",
        }
    }
}

pub type PropertyTable = IndexMap<StringId, Property, ahash::RandomState>;

/// Bytes charged for each entry in a property table.
pub const PROPERTY_SIZE: usize = mem::size_of::<(StringId, Property)>() + mem::size_of::<usize>();

#[derive(Debug)]
pub struct Object {
    pub properties: PropertyTable,
    /// `__proto__`; used for lookups only.
    pub prototype: Option<ObjectId>,
    /// `__constructor__`, set by `new`.
    pub constructor: Option<ObjectId>,
    /// Interfaces registered through `implements`.
    pub interfaces: Vec<ObjectId>,
    pub kind: ObjectKind,
    flags: ObjectFlags,
    size: usize,
}

impl Object {
    pub fn new(kind: ObjectKind, prototype: Option<ObjectId>) -> Self {
        Self {
            properties: PropertyTable::default(),
            prototype,
            constructor: None,
            interfaces: Vec::new(),
            kind,
            flags: ObjectFlags::empty(),
            size: mem::size_of::<Self>(),
        }
    }

    /// Bytes charged for this object: the header plus one entry per
    /// property it currently holds.
    #[inline]
    pub fn heap_size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    #[inline]
    pub fn set_flag(&mut self, flag: ObjectFlags, value: bool) {
        self.flags.set(flag, value);
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array)
    }

    #[inline]
    pub fn function(&self) -> Option<&Function> {
        match &self.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }

    #[inline]
    pub fn own(&self, key: StringId) -> Option<&Property> {
        self.properties.get(&key)
    }

    #[inline]
    pub fn own_mut(&mut self, key: StringId) -> Option<&mut Property> {
        self.properties.get_mut(&key)
    }

    /// Inserts or overwrites a property, ignoring flags on the old entry.
    /// Returns true when the key is new and the object grew.
    pub(crate) fn define(&mut self, key: StringId, value: Value, flags: PropFlags) -> bool {
        let added = self
            .properties
            .insert(key, Property::new(value, flags))
            .is_none();
        if added {
            self.size += PROPERTY_SIZE;
        }
        added
    }

    pub(crate) fn remove(&mut self, key: StringId) -> Option<Property> {
        let removed = self.properties.shift_remove(&key);
        if removed.is_some() {
            self.size -= PROPERTY_SIZE;
        }
        removed
    }
}

impl Visitable for Object {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        if let Some(proto) = self.prototype {
            visitor.visit_object(proto);
        }
        if let Some(ctor) = self.constructor {
            visitor.visit_object(ctor);
        }
        for &interface in &self.interfaces {
            visitor.visit_object(interface);
        }
        for (&key, property) in &self.properties {
            visitor.visit_string(key);
            visitor.visit(property.value);
        }
        match &self.kind {
            ObjectKind::Function(function) => function.visit_edges(visitor),
            ObjectKind::String(s) => visitor.visit_string(*s),
            _ => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_flags_gate_visibility() {
        let v6 = PropFlags::VERSION_6_UP;
        assert!(!v6.visible_in(5));
        assert!(v6.visible_in(6));
        let not6 = PropFlags::VERSION_NOT_6 | PropFlags::HIDDEN;
        assert!(not6.visible_in(5));
        assert!(!not6.visible_in(6));
        assert!(not6.visible_in(7));
        assert!(!PropFlags::VERSION_8_UP.visible_in(7));
        assert!(PropFlags::empty().visible_in(4));
    }
}
