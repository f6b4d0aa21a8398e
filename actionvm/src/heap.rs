//! Mark-sweep heap owning every object and interned string.
//!
//! Objects and strings live in generation-checked arenas; a collection
//! marks from the roots a [`RootProvider`] reports plus every object
//! flagged [`ObjectFlags::ROOTED`], then frees whatever stayed unmarked.

use std::{fmt, rc::Rc};

use crate::{
    AbortReason, InternedStrings, Object, ObjectFlags, ObjectId, OutOfMemory, PropFlags, Property,
    SettingsError, StringId, Value, Visitable, Visitor, arena::Arena, object::PROPERTY_SIZE,
};

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapSettings {
    /// Bytes allocated since the last cycle before `maybe_collect` runs one.
    pub gc_threshold: usize,
    /// Hard ceiling; exceeding it aborts the engine.
    pub memory_limit: Option<usize>,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            gc_threshold: 8 * 1024 * 1024,
            memory_limit: None,
        }
    }
}

impl HeapSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.gc_threshold == 0 {
            return Err(SettingsError("gc_threshold must be non-zero"));
        }
        if self.memory_limit == Some(0) {
            return Err(SettingsError("memory_limit must be non-zero"));
        }
        Ok(())
    }
}

// ── Collaborator traits ──────────────────────────────────────────────

/// Supplies the live roots at collection time (operand stack, frames,
/// context-held objects).
pub trait RootProvider {
    fn visit_roots(&self, visitor: &mut dyn FnMut(Value));
}

/// Native debugger attachment.
pub trait DebugHook {
    /// Called before every dispatched action.
    fn step(&mut self, pc: usize, action: u8) {
        let _ = (pc, action);
    }

    /// Called for each object right before the collector releases it.
    fn object_freed(&mut self, id: ObjectId) {
        let _ = id;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GcStats {
    pub objects_freed: usize,
    pub strings_freed: usize,
    pub bytes_freed: usize,
    pub objects_live: usize,
    pub strings_live: usize,
}

// ── Heap ─────────────────────────────────────────────────────────────

pub struct Heap {
    objects: Arena<Object>,
    strings: InternedStrings,
    memory_used: usize,
    since_gc: usize,
    settings: HeapSettings,
    aborted: Option<AbortReason>,
    debugger: Option<Box<dyn DebugHook>>,
    cycles: usize,
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("objects", &self.objects.len())
            .field("strings", &self.strings.len())
            .field("memory_used", &self.memory_used)
            .field("since_gc", &self.since_gc)
            .field("aborted", &self.aborted)
            .field("cycles", &self.cycles)
            .finish()
    }
}

struct Marker<'a> {
    strings: &'a mut InternedStrings,
    pending: Vec<ObjectId>,
}

impl Visitor for Marker<'_> {
    #[inline]
    fn visit_object(&mut self, id: ObjectId) {
        self.pending.push(id);
    }

    #[inline]
    fn visit_string(&mut self, id: StringId) {
        self.strings.mark(id);
    }
}

impl Heap {
    pub fn new(settings: HeapSettings) -> Self {
        Self {
            objects: Arena::new(),
            strings: InternedStrings::new(),
            memory_used: 0,
            since_gc: 0,
            settings,
            aborted: None,
            debugger: None,
            cycles: 0,
        }
    }

    #[inline]
    pub fn settings(&self) -> &HeapSettings {
        &self.settings
    }

    #[inline]
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    #[inline]
    pub fn since_gc(&self) -> usize {
        self.since_gc
    }

    #[inline]
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn aborted(&self) -> Option<&AbortReason> {
        self.aborted.as_ref()
    }

    /// Moves the heap into the aborted state. The first reason wins.
    pub fn abort(&mut self, reason: AbortReason) {
        if self.aborted.is_none() {
            log::error!("aborting: {reason}");
            self.aborted = Some(reason);
        }
    }

    pub fn set_debugger(&mut self, debugger: Option<Box<dyn DebugHook>>) {
        self.debugger = debugger;
    }

    pub(crate) fn debugger_mut(&mut self) -> Option<&mut (dyn DebugHook + 'static)> {
        self.debugger.as_deref_mut()
    }

    // ── Accounting ───────────────────────────────────────────────────

    /// Charges `bytes` on behalf of the host. Fails once the engine is
    /// aborted or the charge would cross the memory limit; a failed charge
    /// is not recorded.
    pub fn use_mem(&mut self, bytes: usize) -> Result<(), OutOfMemory> {
        let limit = self.settings.memory_limit.unwrap_or(usize::MAX);
        if self.aborted.is_some() {
            return Err(OutOfMemory { limit });
        }
        let used = self.memory_used.saturating_add(bytes);
        if used > limit {
            self.abort(AbortReason::OutOfMemory { used, limit });
            return Err(OutOfMemory { limit });
        }
        self.memory_used = used;
        self.since_gc = self.since_gc.saturating_add(bytes);
        Ok(())
    }

    pub fn unuse_mem(&mut self, bytes: usize) {
        assert!(
            bytes <= self.memory_used,
            "releasing {bytes} bytes with only {} in use",
            self.memory_used
        );
        self.memory_used -= bytes;
    }

    /// Charges an allocation the heap already performed. Crossing the limit
    /// aborts the engine but the entity stays accounted until it is swept.
    fn charge(&mut self, bytes: usize) {
        self.memory_used += bytes;
        self.since_gc = self.since_gc.saturating_add(bytes);
        if let Some(limit) = self.settings.memory_limit {
            if self.memory_used > limit {
                self.abort(AbortReason::OutOfMemory {
                    used: self.memory_used,
                    limit,
                });
            }
        }
    }

    // ── Strings ──────────────────────────────────────────────────────

    pub fn intern(&mut self, text: &str) -> StringId {
        let (id, charged) = self.strings.get_or_add(text);
        if let Some(bytes) = charged {
            self.charge(bytes);
        }
        id
    }

    pub fn intern_owned(&mut self, text: String) -> StringId {
        let (id, charged) = self.strings.get_or_add_owned(text);
        if let Some(bytes) = charged {
            self.charge(bytes);
        }
        id
    }

    /// Interns a string that is never collected.
    pub fn intern_static(&mut self, text: &str) -> StringId {
        let id = self.intern(text);
        self.strings.set_static(id, true);
        id
    }

    pub fn lookup_string(&self, text: &str) -> Option<StringId> {
        self.strings.lookup(text)
    }

    /// Content of `id`. A stale id reads as the empty string.
    pub fn string(&self, id: StringId) -> Rc<str> {
        match self.strings.get(id) {
            Some(text) => text.clone(),
            None => {
                debug_assert!(false, "stale string id {id:?}");
                Rc::from("")
            }
        }
    }

    pub fn string_is_live(&self, id: StringId) -> bool {
        self.strings.get(id).is_some()
    }

    // ── Objects ──────────────────────────────────────────────────────

    pub fn alloc(&mut self, object: Object) -> ObjectId {
        self.charge(object.heap_size());
        ObjectId(self.objects.insert(object))
    }

    /// Inserts or overwrites a property of `id`. A new key is charged.
    pub fn define_property(&mut self, id: ObjectId, key: StringId, value: Value, flags: PropFlags) {
        let added = self
            .objects
            .get_mut(id.0)
            .is_some_and(|object| object.define(key, value, flags));
        if added {
            self.charge(PROPERTY_SIZE);
        }
    }

    /// Removes an own property of `id` and releases its charge.
    pub fn remove_property(&mut self, id: ObjectId, key: StringId) -> Option<Property> {
        let removed = self.objects.get_mut(id.0)?.remove(key)?;
        self.unuse_mem(PROPERTY_SIZE);
        Some(removed)
    }

    #[inline]
    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0)
    }

    #[inline]
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0)
    }

    #[inline]
    pub fn is_live(&self, id: ObjectId) -> bool {
        self.objects.contains(id.0)
    }

    pub fn set_rooted(&mut self, id: ObjectId, rooted: bool) {
        if let Some(object) = self.objects.get_mut(id.0) {
            object.set_flag(ObjectFlags::ROOTED, rooted);
        }
    }

    /// Drops every root, static strings included. Only used when the
    /// owning context is torn down.
    pub(crate) fn unroot_all(&mut self) {
        for (_, object) in self.objects.iter_mut() {
            object.set_flag(ObjectFlags::ROOTED, false);
        }
        self.strings.clear_static();
    }

    // ── Collection ───────────────────────────────────────────────────

    pub fn collect(&mut self, roots: &dyn RootProvider) -> GcStats {
        let mut marker = Marker {
            strings: &mut self.strings,
            pending: Vec::new(),
        };
        roots.visit_roots(&mut |value| marker.visit(value));
        for (handle, object) in self.objects.iter() {
            if object.flags().contains(ObjectFlags::ROOTED) {
                marker.pending.push(ObjectId(handle));
            }
        }

        while let Some(id) = marker.pending.pop() {
            let Some(object) = self.objects.get_mut(id.0) else {
                continue;
            };
            if object.flags().contains(ObjectFlags::MARKED) {
                continue;
            }
            object.set_flag(ObjectFlags::MARKED, true);
            object.visit_edges(&mut marker);
        }

        let removed = self.objects.retain(|_, object| {
            let keep = object
                .flags()
                .intersects(ObjectFlags::MARKED | ObjectFlags::ROOTED);
            object.set_flag(ObjectFlags::MARKED, false);
            keep
        });

        let mut stats = GcStats::default();
        for (handle, object) in &removed {
            if let Some(debugger) = self.debugger.as_deref_mut() {
                debugger.object_freed(ObjectId(*handle));
            }
            stats.bytes_freed += object.heap_size();
        }
        stats.objects_freed = removed.len();
        drop(removed);

        let (strings_freed, string_bytes) = self.strings.sweep();
        stats.strings_freed = strings_freed;
        stats.bytes_freed += string_bytes;

        self.unuse_mem(stats.bytes_freed);
        self.since_gc = 0;
        self.cycles += 1;
        stats.objects_live = self.objects.len();
        stats.strings_live = self.strings.len();
        log::debug!(
            "gc #{}: freed {} objects, {} strings, {} bytes; {} bytes live",
            self.cycles,
            stats.objects_freed,
            stats.strings_freed,
            stats.bytes_freed,
            self.memory_used
        );
        stats
    }
}
