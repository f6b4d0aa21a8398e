//! `Array` on top of the generic property table.
//!
//! Elements are ordinary properties named by their decimal index; only
//! `length` is special. Every method is written against four range
//! primitives ([`move_range`], [`remove_range`], [`set_range`] and
//! [`append_range`]) so that it works the same on real arrays and on
//! array-like objects that merely carry a `length`.

use std::{cmp::Ordering, ops::Range};

use bitflags::bitflags;

use crate::{
    Context, ObjectId, PropFlags, StringId, Value, function::ConstructKind,
    properties::parse_index,
};

use super::{NativeDesc, define_constant, define_constructor, define_methods};

bitflags! {
    /// Options accepted by `sort` and `sortOn`, with the values scripts
    /// see as `Array.CASEINSENSITIVE` and friends.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct SortFlags: u32 {
        const CASE_INSENSITIVE = 1;
        const DESCENDING = 2;
        const UNIQUE = 4;
        const RETURN_INDEXED_ARRAY = 8;
        const NUMERIC = 16;
    }
}

// ── length ───────────────────────────────────────────────────────────

pub(crate) fn init_length(ctx: &mut Context, array: ObjectId) {
    let key = ctx.names.length;
    ctx.define_property(array, key, Value::Int(0), PropFlags::HIDDEN | PropFlags::PERMANENT);
}

/// `length` of any object, clamped to a valid element count.
pub fn length_of(ctx: &mut Context, object: ObjectId) -> usize {
    let key = ctx.names.length;
    let value = ctx.get_member(object, key).unwrap_or_default();
    let n = ctx.to_number(value);
    if n.is_nan() || n <= 0.0 {
        0
    } else {
        n.min(f64::from(u32::MAX)) as usize
    }
}

fn set_length(ctx: &mut Context, object: ObjectId, length: usize) {
    let key = ctx.names.length;
    ctx.set_member(object, key, Value::number(length as f64));
}

/// The array override of property assignment. Shrinking `length` drops
/// the elements past the end; writing an element past the end grows it.
pub(crate) fn set_array_member(ctx: &mut Context, array: ObjectId, key: StringId, value: Value) {
    let length_key = ctx.names.length;
    if key == length_key {
        let old = length_of(ctx, array);
        let n = ctx.to_number(value);
        let new = if n.is_nan() || n <= 0.0 {
            0
        } else {
            n.min(f64::from(u32::MAX)) as usize
        };
        if new < old {
            remove_range(ctx, array, new, old - new);
        }
        ctx.store(array, length_key, Value::number(new as f64));
        return;
    }
    ctx.store(array, key, value);
    if let Some(index) = parse_index(&ctx.heap.string(key)) {
        let index = index as usize;
        if index >= length_of(ctx, array) {
            ctx.store(array, length_key, Value::number((index + 1) as f64));
        }
    }
}

// ── range primitives ─────────────────────────────────────────────────

/// Own elements of `object` with an index in `from..from + count`.
fn elements(ctx: &Context, object: ObjectId, from: usize, count: usize) -> Vec<(usize, StringId, Value)> {
    let Some(obj) = ctx.heap.object(object) else {
        return Vec::new();
    };
    let end = from.saturating_add(count);
    obj.properties
        .iter()
        .filter_map(|(&key, property)| {
            let index = parse_index(&ctx.heap.string(key))? as usize;
            (index >= from && index < end).then_some((index, key, property.value))
        })
        .collect()
}

fn remove_keys(ctx: &mut Context, object: ObjectId, keys: impl IntoIterator<Item = StringId>) {
    for key in keys {
        ctx.heap.remove_property(object, key);
    }
}

/// Deletes the elements `from..from + count`. `length` is left alone.
pub fn remove_range(ctx: &mut Context, object: ObjectId, from: usize, count: usize) {
    let doomed = elements(ctx, object, from, count);
    remove_keys(ctx, object, doomed.into_iter().map(|(_, key, _)| key));
}

/// Renames the elements `from..from + count` to start at `to`. Holes move
/// too: whatever sat in the destination range is gone afterwards.
pub fn move_range(ctx: &mut Context, object: ObjectId, from: usize, count: usize, to: usize) {
    if from == to || count == 0 {
        return;
    }
    let moved = elements(ctx, object, from, count);
    remove_keys(ctx, object, moved.iter().map(|&(_, key, _)| key));
    remove_range(ctx, object, to, count);
    for (index, _, value) in moved {
        let key = ctx.index_key(index - from + to);
        ctx.store(object, key, value);
    }
}

/// Assigns `values` to consecutive elements starting at `start`.
pub fn set_range(ctx: &mut Context, object: ObjectId, start: usize, values: &[Value]) {
    for (i, &value) in values.iter().enumerate() {
        let key = ctx.index_key(start + i);
        ctx.set_member(object, key, value);
    }
}

/// Copies `source` elements `from..from + count` into `dest`, renumbered
/// to start at `offset`. Holes stay holes.
pub fn append_range(
    ctx: &mut Context,
    dest: ObjectId,
    offset: usize,
    source: ObjectId,
    from: usize,
    count: usize,
) {
    let mut copied = elements(ctx, source, from, count);
    copied.sort_unstable_by_key(|&(index, ..)| index);
    for (index, _, value) in copied {
        let key = ctx.index_key(index - from + offset);
        ctx.set_member(dest, key, value);
    }
}

// ── methods ──────────────────────────────────────────────────────────

fn element(ctx: &mut Context, object: ObjectId, index: usize) -> Value {
    let key = ctx.index_key(index);
    ctx.get_member(object, key).unwrap_or_default()
}

/// A relative position: negative counts from the end. Clamped to
/// `0..=length`.
fn position(ctx: &mut Context, value: Value, length: usize) -> usize {
    let n = i64::from(ctx.to_integer(value));
    if n < 0 {
        (length as i64 + n).max(0) as usize
    } else {
        (n as usize).min(length)
    }
}

fn array_constructor(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let array = match this {
        Some(this) if ctx.is_constructing() => this,
        _ => ctx.new_array(&[]),
    };
    match args {
        [] => {}
        [size] if size.is_number() => {
            let n = ctx.to_integer(*size).max(0) as usize;
            set_length(ctx, array, n);
        }
        values => set_range(ctx, array, 0, values),
    }
    Value::Object(array)
}

fn push(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let Some(this) = this else {
        return Value::Undefined;
    };
    let length = length_of(ctx, this);
    set_range(ctx, this, length, args);
    set_length(ctx, this, length + args.len());
    Value::number((length + args.len()) as f64)
}

fn pop(ctx: &mut Context, this: Option<ObjectId>, _: &[Value]) -> Value {
    let Some(this) = this else {
        return Value::Undefined;
    };
    let length = length_of(ctx, this);
    if length == 0 {
        set_length(ctx, this, 0);
        return Value::Undefined;
    }
    let value = element(ctx, this, length - 1);
    remove_range(ctx, this, length - 1, 1);
    set_length(ctx, this, length - 1);
    value
}

fn shift(ctx: &mut Context, this: Option<ObjectId>, _: &[Value]) -> Value {
    let Some(this) = this else {
        return Value::Undefined;
    };
    let length = length_of(ctx, this);
    if length == 0 {
        set_length(ctx, this, 0);
        return Value::Undefined;
    }
    let value = element(ctx, this, 0);
    remove_range(ctx, this, 0, 1);
    move_range(ctx, this, 1, length - 1, 0);
    set_length(ctx, this, length - 1);
    value
}

fn unshift(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let Some(this) = this else {
        return Value::Undefined;
    };
    let length = length_of(ctx, this);
    move_range(ctx, this, 0, length, args.len());
    set_range(ctx, this, 0, args);
    set_length(ctx, this, length + args.len());
    Value::number((length + args.len()) as f64)
}

/// `splice(start, deleteCount?, items...)`: returns the removed elements.
fn splice(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let (Some(this), Some(&start)) = (this, args.first()) else {
        return Value::Undefined;
    };
    let length = length_of(ctx, this);
    let start = position(ctx, start, length);
    let count = match args.get(1) {
        Some(&count) => (ctx.to_integer(count).max(0) as usize).min(length - start),
        None => length - start,
    };
    let items = args.get(2..).unwrap_or_default();

    let removed = ctx.new_array(&[]);
    append_range(ctx, removed, 0, this, start, count);
    set_length(ctx, removed, count);

    remove_range(ctx, this, start, count);
    let tail = length - start - count;
    move_range(ctx, this, start + count, tail, start + items.len());
    set_range(ctx, this, start, items);
    set_length(ctx, this, length - count + items.len());
    Value::Object(removed)
}

fn slice(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let Some(this) = this else {
        return Value::Undefined;
    };
    let length = length_of(ctx, this);
    let start = match args.first() {
        Some(&start) => position(ctx, start, length),
        None => 0,
    };
    let end = match args.get(1) {
        Some(&end) => position(ctx, end, length),
        None => length,
    };
    let count = end.saturating_sub(start);
    let result = ctx.new_array(&[]);
    append_range(ctx, result, 0, this, start, count);
    set_length(ctx, result, count);
    Value::Object(result)
}

/// Copies `this` and then each argument; arrays are flattened one level.
fn concat(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let result = ctx.new_array(&[]);
    let mut offset = 0;
    let parts = this.map(Value::Object).into_iter().chain(args.iter().copied());
    for part in parts.collect::<Vec<_>>() {
        match part {
            Value::Object(source) if ctx.is_array(source) || Some(source) == this => {
                let length = length_of(ctx, source);
                append_range(ctx, result, offset, source, 0, length);
                offset += length;
            }
            value => {
                set_range(ctx, result, offset, &[value]);
                offset += 1;
            }
        }
    }
    set_length(ctx, result, offset);
    Value::Object(result)
}

fn reverse(ctx: &mut Context, this: Option<ObjectId>, _: &[Value]) -> Value {
    let Some(this) = this else {
        return Value::Undefined;
    };
    let length = length_of(ctx, this);
    let entries = elements(ctx, this, 0, length);
    remove_keys(ctx, this, entries.iter().map(|&(_, key, _)| key));
    for (index, _, value) in entries {
        let key = ctx.index_key(length - 1 - index);
        ctx.store(this, key, value);
    }
    Value::Object(this)
}

pub(crate) fn join_with(ctx: &mut Context, object: ObjectId, separator: &str) -> String {
    let length = length_of(ctx, object);
    let mut out = String::new();
    for i in 0..length {
        if i > 0 {
            out.push_str(separator);
        }
        let value = element(ctx, object, i);
        out.push_str(&ctx.to_rust_string(value));
    }
    out
}

fn join(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let Some(this) = this else {
        return Value::Undefined;
    };
    let separator = match args.first() {
        Some(&Value::Undefined) | None => ",".into(),
        Some(&separator) => ctx.to_rust_string(separator),
    };
    let text = join_with(ctx, this, &separator);
    Value::String(ctx.give_string(text))
}

fn to_string(ctx: &mut Context, this: Option<ObjectId>, _: &[Value]) -> Value {
    let Some(this) = this else {
        return Value::Undefined;
    };
    let text = join_with(ctx, this, ",");
    Value::String(ctx.give_string(text))
}

// ── sorting ──────────────────────────────────────────────────────────

/// How two elements are ordered.
enum Comparator {
    Values(SortFlags),
    Function(ObjectId, SortFlags),
    /// `sortOn`: field names with their own flags, compared in order.
    Fields(Vec<(StringId, SortFlags)>),
}

fn compare_values(ctx: &mut Context, a: Value, b: Value, flags: SortFlags) -> Ordering {
    let ordering = match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        (a, b) if flags.contains(SortFlags::NUMERIC) && a.is_number() && b.is_number() => {
            let (x, y) = (ctx.to_number(a), ctx.to_number(b));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (a, b) => {
            let (x, y) = (ctx.to_rust_string(a), ctx.to_rust_string(b));
            if flags.contains(SortFlags::CASE_INSENSITIVE) {
                x.to_lowercase().cmp(&y.to_lowercase())
            } else {
                x.cmp(&y)
            }
        }
    };
    if flags.contains(SortFlags::DESCENDING) {
        ordering.reverse()
    } else {
        ordering
    }
}

fn compare(ctx: &mut Context, comparator: &Comparator, a: Value, b: Value) -> Ordering {
    match comparator {
        Comparator::Values(flags) => compare_values(ctx, a, b, *flags),
        Comparator::Function(function, flags) => {
            let ordering = match (a, b) {
                (Value::Undefined, Value::Undefined) => Ordering::Equal,
                (Value::Undefined, _) => Ordering::Greater,
                (_, Value::Undefined) => Ordering::Less,
                (a, b) => {
                    let result = ctx.call_function(*function, None, &[a, b]);
                    let n = ctx.to_number(result);
                    n.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
                }
            };
            if flags.contains(SortFlags::DESCENDING) {
                ordering.reverse()
            } else {
                ordering
            }
        }
        Comparator::Fields(fields) => {
            for &(field, flags) in fields {
                let x = ctx.get_value_member(a, field);
                let y = ctx.get_value_member(b, field);
                match compare_values(ctx, x, y, flags) {
                    Ordering::Equal => continue,
                    ordering => return ordering,
                }
            }
            Ordering::Equal
        }
    }
}

/// Why a sort produced no ordering.
enum SortFailure {
    /// Two elements compared equal under `UNIQUE`.
    Duplicate,
    /// A comparator threw or the engine aborted.
    Interrupted,
}

/// Binary insertion into an ordered candidate list. Equal elements keep
/// their original order; under `unique` the first tie fails the sort.
fn ordered(
    ctx: &mut Context,
    comparator: &Comparator,
    entries: Vec<(usize, Value)>,
    unique: bool,
) -> Result<Vec<(usize, Value)>, SortFailure> {
    let mut sorted: Vec<(usize, Value)> = Vec::with_capacity(entries.len() + 1);
    for (index, value) in entries {
        let (mut lo, mut hi) = (0, sorted.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            let ordering = compare(ctx, comparator, sorted[mid].1, value);
            if ctx.pending_exception().is_some() || ctx.is_aborted() {
                return Err(SortFailure::Interrupted);
            }
            if ordering == Ordering::Greater {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        if unique && lo > 0 && compare(ctx, comparator, sorted[lo - 1].1, value) == Ordering::Equal {
            return Err(SortFailure::Duplicate);
        }
        sorted.insert(lo, (index, value));
    }
    Ok(sorted)
}

/// The elements a sort works on: every defined own element, plus one
/// candidate standing for all undefined slots (holes included).
struct Candidates {
    /// Sorted by index; the undefined candidate sits at the first
    /// undefined slot.
    entries: Vec<(usize, Value)>,
    undefined: usize,
    /// Explicitly stored `undefined` values; the rest of the run are holes.
    stored_undefined: usize,
}

fn candidates(ctx: &Context, this: ObjectId, length: usize) -> Candidates {
    let mut present = elements(ctx, this, 0, length);
    present.sort_unstable_by_key(|&(index, ..)| index);

    let mut first_hole = present.len();
    for (expected, &(index, ..)) in present.iter().enumerate() {
        if index != expected {
            first_hole = expected;
            break;
        }
    }
    let first_hole = (first_hole < length).then_some(first_hole);

    let mut entries = Vec::with_capacity(present.len() + 1);
    let mut first_stored = None;
    let mut stored_undefined = 0;
    for (index, _, value) in present.iter().copied() {
        if value == Value::Undefined {
            first_stored.get_or_insert(index);
            stored_undefined += 1;
        } else {
            entries.push((index, value));
        }
    }
    let holes = length - present.len();
    let undefined_at = match (first_hole, first_stored) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    if let Some(at) = undefined_at {
        let slot = entries.partition_point(|&(index, _)| index < at);
        entries.insert(slot, (at, Value::Undefined));
    }
    Candidates {
        entries,
        undefined: holes + stored_undefined,
        stored_undefined,
    }
}

/// Index runs covering the undefined slots of `this` below `length`:
/// stored `undefined` values first, then the holes in order.
fn undefined_runs(ctx: &Context, this: ObjectId, length: usize) -> Vec<Range<usize>> {
    let mut present = elements(ctx, this, 0, length);
    present.sort_unstable_by_key(|&(index, ..)| index);
    let mut runs = Vec::new();
    let mut gaps = Vec::with_capacity(present.len() + 1);
    let mut next = 0;
    for &(index, _, value) in &present {
        gaps.push(next..index);
        next = index + 1;
        if value == Value::Undefined {
            runs.push(index..index + 1);
        }
    }
    gaps.push(next..length);
    runs.extend(gaps);
    runs
}

/// Sorts `this` in place, or returns the sorted indices when asked to.
/// A failed `UNIQUE` sort returns `0` and leaves the array untouched.
///
/// Only the elements actually present are compared. All undefined slots
/// share one candidate and are written back as a single run: the stored
/// `undefined` values first, then holes.
fn sort_with(ctx: &mut Context, this: ObjectId, comparator: Comparator, flags: SortFlags) -> Value {
    let length = length_of(ctx, this);
    let candidates = candidates(ctx, this, length);
    let unique = flags.contains(SortFlags::UNIQUE);
    if unique && candidates.undefined > 1 {
        return Value::Int(0);
    }
    let sorted = match ordered(ctx, &comparator, candidates.entries, unique) {
        Ok(sorted) => sorted,
        Err(SortFailure::Duplicate) => return Value::Int(0),
        Err(SortFailure::Interrupted) => return Value::Undefined,
    };
    if flags.contains(SortFlags::RETURN_INDEXED_ARRAY) {
        let result = ctx.new_array(&[]);
        let mut position = 0;
        for (index, value) in sorted {
            if value == Value::Undefined {
                let runs = undefined_runs(ctx, this, length);
                for undefined in runs.into_iter().flatten() {
                    let key = ctx.index_key(position);
                    ctx.set_member(result, key, Value::number(undefined as f64));
                    position += 1;
                    if ctx.is_aborted() {
                        return Value::Undefined;
                    }
                }
            } else {
                let key = ctx.index_key(position);
                ctx.set_member(result, key, Value::number(index as f64));
                position += 1;
            }
        }
        return Value::Object(result);
    }

    let mut position = 0;
    for (_, value) in sorted {
        if value == Value::Undefined {
            remove_range(ctx, this, position, candidates.undefined);
            set_range(ctx, this, position, &vec![Value::Undefined; candidates.stored_undefined]);
            position += candidates.undefined;
        } else {
            set_range(ctx, this, position, &[value]);
            position += 1;
        }
    }
    Value::Object(this)
}

fn flags_of(ctx: &mut Context, value: Option<&Value>) -> SortFlags {
    match value {
        Some(&value) if !value.is_null_or_undefined() => {
            SortFlags::from_bits_truncate(ctx.to_integer(value) as u32)
        }
        _ => SortFlags::empty(),
    }
}

/// `sort()`, `sort(flags)`, `sort(compare)` or `sort(compare, flags)`.
fn sort(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let Some(this) = this else {
        return Value::Undefined;
    };
    let (comparator, flags) = match args.first() {
        Some(&Value::Object(function)) if ctx.is_function(function) => {
            let flags = flags_of(ctx, args.get(1));
            (Comparator::Function(function, flags), flags)
        }
        first => {
            let flags = flags_of(ctx, first);
            (Comparator::Values(flags), flags)
        }
    };
    sort_with(ctx, this, comparator, flags)
}

/// Strings of an array argument, or the argument itself as one string.
fn string_list(ctx: &mut Context, value: Value) -> Vec<Value> {
    match value {
        Value::Object(id) if ctx.is_array(id) => {
            let length = length_of(ctx, id);
            (0..length).map(|i| element(ctx, id, i)).collect()
        }
        value => vec![value],
    }
}

/// `sortOn(field | [fields], flags | [flags])`. With per-field flags, the
/// first field's flags also decide `UNIQUE` and `RETURNINDEXEDARRAY`.
fn sort_on(ctx: &mut Context, this: Option<ObjectId>, args: &[Value]) -> Value {
    let (Some(this), Some(&fields)) = (this, args.first()) else {
        return Value::Undefined;
    };
    let names = string_list(ctx, fields);
    let field_flags: Vec<SortFlags> = match args.get(1) {
        Some(&Value::Object(id)) if ctx.is_array(id) => {
            let length = length_of(ctx, id);
            (0..length)
                .map(|i| {
                    let value = element(ctx, id, i);
                    flags_of(ctx, Some(&value))
                })
                .collect()
        }
        other => vec![flags_of(ctx, other)],
    };
    let flags = field_flags.first().copied().unwrap_or_default();
    let shared = field_flags.len() != names.len();
    let fields: Vec<(StringId, SortFlags)> = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let key = ctx.to_string_id(name);
            (key, if shared { flags } else { field_flags[i] })
        })
        .collect();
    sort_with(ctx, this, Comparator::Fields(fields), flags)
}

const ARRAY_METHODS: &[NativeDesc] = &[
    NativeDesc::new("push", 0, push),
    NativeDesc::new("pop", 0, pop),
    NativeDesc::new("shift", 0, shift),
    NativeDesc::new("unshift", 0, unshift),
    NativeDesc::new("splice", 0, splice),
    NativeDesc::new("slice", 0, slice),
    NativeDesc::new("concat", 0, concat),
    NativeDesc::new("reverse", 0, reverse),
    NativeDesc::new("join", 0, join),
    NativeDesc::new("toString", 0, to_string),
    NativeDesc::new("sort", 0, sort),
    NativeDesc::new("sortOn", 1, sort_on),
];

pub(crate) fn install(ctx: &mut Context) {
    let prototype = ctx.specials.array_prototype;
    let constructor =
        define_constructor(ctx, "Array", array_constructor, ConstructKind::Array, prototype);
    for (name, flag) in [
        ("CASEINSENSITIVE", SortFlags::CASE_INSENSITIVE),
        ("DESCENDING", SortFlags::DESCENDING),
        ("UNIQUESORT", SortFlags::UNIQUE),
        ("RETURNINDEXEDARRAY", SortFlags::RETURN_INDEXED_ARRAY),
        ("NUMERIC", SortFlags::NUMERIC),
    ] {
        define_constant(ctx, constructor, name, Value::Int(flag.bits() as i32));
    }

    define_methods(ctx, prototype, ARRAY_METHODS);
}
