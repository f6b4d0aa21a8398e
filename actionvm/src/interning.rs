use std::{fmt, mem, rc::Rc};

use ahash::AHashMap;
use bitflags::bitflags;

use crate::arena::{Arena, RawHandle};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(RawHandle);

impl fmt::Debug for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringId({:?})", self.0)
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct StringFlags: u8 {
        const MARKED = 1 << 0;
        /// Permanently live; never considered by the sweep.
        const STATIC = 1 << 1;
    }
}

#[derive(Debug)]
pub struct InternedString {
    flags: StringFlags,
    text: Rc<str>,
}

impl InternedString {
    /// Bytes charged against the heap for this entry.
    pub fn heap_size(&self) -> usize {
        mem::size_of::<Self>() + self.text.len()
    }

    pub fn text(&self) -> &Rc<str> {
        &self.text
    }

    pub fn flags(&self) -> StringFlags {
        self.flags
    }
}

/// Deduplicating string table: equal content always yields the same id.
#[derive(Debug, Default)]
pub struct InternedStrings {
    table: Arena<InternedString>,
    mappings: AHashMap<Rc<str>, StringId>,
}

impl InternedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn lookup(&self, value: &str) -> Option<StringId> {
        self.mappings.get(value).copied()
    }

    /// Returns the id for `value` and, if the entry was created, the number
    /// of bytes the caller has to charge for it.
    pub fn get_or_add(&mut self, value: &str) -> (StringId, Option<usize>) {
        if let Some(&id) = self.mappings.get(value) {
            return (id, None);
        }
        self.insert(Rc::from(value))
    }

    pub fn get_or_add_owned(&mut self, value: String) -> (StringId, Option<usize>) {
        if let Some(&id) = self.mappings.get(value.as_str()) {
            return (id, None);
        }
        self.insert(Rc::from(value))
    }

    fn insert(&mut self, text: Rc<str>) -> (StringId, Option<usize>) {
        let entry = InternedString {
            flags: StringFlags::empty(),
            text: text.clone(),
        };
        let size = entry.heap_size();
        let id = StringId(self.table.insert(entry));
        self.mappings.insert(text, id);
        (id, Some(size))
    }

    pub fn get(&self, id: StringId) -> Option<&Rc<str>> {
        self.table.get(id.0).map(|s| &s.text)
    }

    pub fn entry(&self, id: StringId) -> Option<&InternedString> {
        self.table.get(id.0)
    }

    pub fn set_static(&mut self, id: StringId, value: bool) {
        if let Some(entry) = self.table.get_mut(id.0) {
            entry.flags.set(StringFlags::STATIC, value);
        }
    }

    pub fn clear_static(&mut self) {
        for (_, entry) in self.table.iter_mut() {
            entry.flags.remove(StringFlags::STATIC);
        }
    }

    /// Marks `id` for the current cycle. Static strings keep their bit clear.
    #[inline]
    pub fn mark(&mut self, id: StringId) {
        if let Some(entry) = self.table.get_mut(id.0) {
            if !entry.flags.contains(StringFlags::STATIC) {
                entry.flags.insert(StringFlags::MARKED);
            }
        }
    }

    /// Frees every string that is neither marked nor static and clears the
    /// mark on the survivors. Returns the number of strings and bytes freed.
    pub fn sweep(&mut self) -> (usize, usize) {
        let removed = self.table.retain(|_, entry| {
            if entry.flags.contains(StringFlags::STATIC) {
                return true;
            }
            let marked = entry.flags.contains(StringFlags::MARKED);
            entry.flags.remove(StringFlags::MARKED);
            marked
        });
        let mut bytes = 0;
        for (_, entry) in &removed {
            bytes += entry.heap_size();
            self.mappings.remove(&entry.text);
        }
        (removed.len(), bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut strings = InternedStrings::new();
        let (a, charged) = strings.get_or_add("length");
        assert!(charged.is_some());
        let (b, charged) = strings.get_or_add_owned(String::from("length"));
        assert_eq!(a, b);
        assert!(charged.is_none());
        assert_eq!(strings.len(), 1);
    }

    #[test]
    fn sweep_keeps_marked_and_static_strings() {
        let mut strings = InternedStrings::new();
        let (live, _) = strings.get_or_add("live");
        let (dead, _) = strings.get_or_add("dead");
        let (keyword, _) = strings.get_or_add("prototype");
        strings.set_static(keyword, true);
        strings.mark(live);

        let (count, bytes) = strings.sweep();
        assert_eq!(count, 1);
        assert!(bytes >= "dead".len());
        assert!(strings.get(dead).is_none());
        assert!(strings.lookup("dead").is_none());
        assert!(strings.get(live).is_some());
        assert!(strings.get(keyword).is_some());

        // marks are cleared for the next cycle
        let (count, _) = strings.sweep();
        assert_eq!(count, 1);
        assert!(strings.get(live).is_none());
    }
}
