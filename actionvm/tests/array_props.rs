use std::cmp::Ordering;

use actionvm::{ConstructKind, Context, ObjectId, SortFlags, Value, parse_index};
use proptest::prelude::*;

fn elements(ctx: &mut Context, array: ObjectId) -> Vec<Value> {
    let length = ctx.get(array, "length");
    let length = ctx.to_number(length) as usize;
    (0..length).map(|i| ctx.get(array, &i.to_string())).collect()
}

fn ints(values: &[i32]) -> Vec<Value> {
    values.iter().map(|&i| Value::Int(i)).collect()
}

fn flag(flags: SortFlags) -> Value {
    Value::Int(flags.bits() as i32)
}

fn returned_array(value: Value) -> ObjectId {
    match value {
        Value::Object(id) => id,
        other => panic!("expected an array, got {other:?}"),
    }
}

fn highest_index(ctx: &Context, array: ObjectId) -> Option<u32> {
    let heap = ctx.heap();
    heap.object(array)?
        .properties
        .keys()
        .filter_map(|&key| parse_index(&heap.string(key)))
        .max()
}

#[derive(Debug, Clone)]
enum Op {
    Push(Vec<i32>),
    Pop,
    Shift,
    Unshift(Vec<i32>),
    Splice(usize, Option<usize>, Vec<i32>),
}

fn op() -> impl Strategy<Value = Op> {
    let items = || prop::collection::vec(-50i32..50, 0..4);
    prop_oneof![
        items().prop_map(Op::Push),
        Just(Op::Pop),
        Just(Op::Shift),
        items().prop_map(Op::Unshift),
        (0usize..24, prop::option::of(0usize..6), items())
            .prop_map(|(start, count, items)| Op::Splice(start, count, items)),
    ]
}

/// Applies `op` to the array and to a plain vector, returning both results.
fn apply(ctx: &mut Context, array: ObjectId, model: &mut Vec<i32>, op: &Op) -> (Value, Value) {
    let undefined_or = |v: Option<i32>| v.map_or(Value::Undefined, Value::Int);
    match op {
        Op::Push(items) => {
            model.extend(items);
            let got = ctx.call_method(array, "push", &ints(items));
            (got, Value::Int(model.len() as i32))
        }
        Op::Pop => {
            let got = ctx.call_method(array, "pop", &[]);
            (got, undefined_or(model.pop()))
        }
        Op::Shift => {
            let got = ctx.call_method(array, "shift", &[]);
            let expected = (!model.is_empty()).then(|| model.remove(0));
            (got, undefined_or(expected))
        }
        Op::Unshift(items) => {
            model.splice(0..0, items.iter().copied());
            let got = ctx.call_method(array, "unshift", &ints(items));
            (got, Value::Int(model.len() as i32))
        }
        Op::Splice(start, count, items) => {
            let mut args = vec![Value::Int(*start as i32)];
            if let Some(count) = count {
                args.push(Value::Int(*count as i32));
            }
            args.extend(ints(items));
            let removed = returned_array(ctx.call_method(array, "splice", &args));

            let start = (*start).min(model.len());
            let count = count.map_or(model.len() - start, |c| c.min(model.len() - start));
            let expected: Vec<i32> = model.splice(start..start + count, items.iter().copied()).collect();
            let length = ctx.get(removed, "length");
            (length, Value::Int(expected.len() as i32))
        }
    }
}

/// Mirrors the ordering `sort` applies for `flags`.
fn reference_order(ctx: &mut Context, a: Value, b: Value, flags: SortFlags) -> Ordering {
    let ordering = match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        (Value::Int(x), Value::Int(y)) if flags.contains(SortFlags::NUMERIC) => x.cmp(&y),
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

fn element() -> impl Strategy<Value = Element> {
    prop_oneof![
        (-20i32..20).prop_map(Element::Int),
        "[a-cA-C]{0,2}".prop_map(Element::Text),
        Just(Element::Undefined),
    ]
}

#[derive(Debug, Clone)]
enum Element {
    Int(i32),
    Text(String),
    Undefined,
}

fn materialize(ctx: &mut Context, elements: &[Element]) -> Vec<Value> {
    elements
        .iter()
        .map(|element| match element {
            Element::Int(i) => Value::Int(*i),
            Element::Text(text) => ctx.new_string(text),
            Element::Undefined => Value::Undefined,
        })
        .collect()
}

fn sort_flags() -> impl Strategy<Value = SortFlags> {
    (0u32..8).prop_map(|bits| {
        let mut flags = SortFlags::empty();
        flags.set(SortFlags::CASE_INSENSITIVE, bits & 1 != 0);
        flags.set(SortFlags::DESCENDING, bits & 2 != 0);
        flags.set(SortFlags::NUMERIC, bits & 4 != 0);
        flags
    })
}

/// Checks that `order` is a permutation of `values` that is sorted under
/// `compare` and keeps equal elements in their original order.
fn assert_stable_order(
    ctx: &mut Context,
    values: &[Value],
    order: &[Value],
    mut compare: impl FnMut(&mut Context, Value, Value) -> Ordering,
) -> Result<(), TestCaseError> {
    let order: Vec<usize> = order
        .iter()
        .map(|&index| ctx.to_number(index) as usize)
        .collect();
    let mut seen = order.clone();
    seen.sort_unstable();
    prop_assert_eq!(seen, (0..values.len()).collect::<Vec<_>>());
    for pair in order.windows(2) {
        let (i, j) = (pair[0], pair[1]);
        match compare(ctx, values[i], values[j]) {
            Ordering::Less => {}
            Ordering::Equal => prop_assert!(i < j, "equal elements {i} and {j} swapped"),
            Ordering::Greater => prop_assert!(false, "elements {i} and {j} out of order"),
        }
    }
    Ok(())
}

fn by_number(ctx: &mut Context, _: Option<ObjectId>, args: &[Value]) -> Value {
    let (a, b) = (ctx.to_number(args[0]), ctx.to_number(args[1]));
    Value::number(a - b)
}

proptest! {
    #[test]
    fn operation_sequences_match_a_vector(ops in prop::collection::vec(op(), 0..24)) {
        let mut ctx = Context::startup(8);
        let array = ctx.new_array(&[]);
        let mut model = Vec::new();
        for op in &ops {
            let (got, expected) = apply(&mut ctx, array, &mut model, op);
            prop_assert_eq!(got, expected, "{:?}", op);
            prop_assert_eq!(ctx.get(array, "length"), Value::Int(model.len() as i32));
            let highest = highest_index(&ctx, array).map_or(0, |i| i as usize + 1);
            prop_assert_eq!(highest, model.len());
        }
        prop_assert_eq!(elements(&mut ctx, array), ints(&model));
    }

    #[test]
    fn sorts_are_ordered_and_stable(items in prop::collection::vec(element(), 0..16), flags in sort_flags()) {
        let mut ctx = Context::startup(8);
        let values = materialize(&mut ctx, &items);
        let array = ctx.new_array(&values);

        let indexed = flag(flags | SortFlags::RETURN_INDEXED_ARRAY);
        let order = returned_array(ctx.call_method(array, "sort", &[indexed]));
        let order = elements(&mut ctx, order);
        assert_stable_order(&mut ctx, &values, &order, |ctx, a, b| reference_order(ctx, a, b, flags))?;
        prop_assert_eq!(elements(&mut ctx, array), values.clone());

        ctx.call_method(array, "sort", &[flag(flags)]);
        let expected: Vec<Value> = order
            .iter()
            .map(|&index| values[ctx.to_number(index) as usize])
            .collect();
        prop_assert_eq!(elements(&mut ctx, array), expected);
    }

    #[test]
    fn comparator_functions_order_stably(
        items in prop::collection::vec(prop::option::of(-20i32..20), 0..16),
        descending in any::<bool>(),
    ) {
        let mut ctx = Context::startup(8);
        let compare = ctx.new_native_function("byNumber", 2, by_number, ConstructKind::Object);
        let values: Vec<Value> = items
            .iter()
            .map(|item| item.map_or(Value::Undefined, Value::Int))
            .collect();
        let array = ctx.new_array(&values);

        let mut flags = SortFlags::RETURN_INDEXED_ARRAY;
        flags.set(SortFlags::DESCENDING, descending);
        let order = returned_array(ctx.call_method(array, "sort", &[Value::Object(compare), flag(flags)]));
        let order = elements(&mut ctx, order);
        let numeric = if descending {
            SortFlags::NUMERIC | SortFlags::DESCENDING
        } else {
            SortFlags::NUMERIC
        };
        assert_stable_order(&mut ctx, &values, &order, |ctx, a, b| reference_order(ctx, a, b, numeric))?;
    }

    #[test]
    fn length_follows_the_highest_index(values in prop::collection::vec(any::<i32>(), 0..16), index in 0usize..64) {
        let mut ctx = Context::startup(8);
        let array = ctx.new_array(&ints(&values));
        prop_assert_eq!(ctx.get(array, "length"), Value::Int(values.len() as i32));

        ctx.set(array, &index.to_string(), Value::Null);
        let expected = values.len().max(index + 1);
        prop_assert_eq!(ctx.get(array, "length"), Value::Int(expected as i32));

        ctx.set(array, "length", Value::Int(index as i32));
        prop_assert_eq!(ctx.get(array, &index.to_string()), Value::Undefined);
        prop_assert_eq!(elements(&mut ctx, array).len(), index);
    }

    #[test]
    fn push_then_pop_is_identity(values in prop::collection::vec(any::<i32>(), 0..16), extra in any::<i32>()) {
        let mut ctx = Context::startup(8);
        let array = ctx.new_array(&ints(&values));
        let length = ctx.call_method(array, "push", &[Value::Int(extra)]);
        prop_assert_eq!(length, Value::Int(values.len() as i32 + 1));
        prop_assert_eq!(ctx.call_method(array, "pop", &[]), Value::Int(extra));
        prop_assert_eq!(elements(&mut ctx, array), ints(&values));
    }

    #[test]
    fn numeric_sort_orders_like_std(values in prop::collection::vec(-1000i32..1000, 0..24)) {
        let mut ctx = Context::startup(8);
        let array = ctx.new_array(&ints(&values));
        ctx.call_method(array, "sort", &[flag(SortFlags::NUMERIC)]);
        let mut expected = values.clone();
        expected.sort();
        prop_assert_eq!(elements(&mut ctx, array), ints(&expected));

        ctx.call_method(array, "sort", &[flag(SortFlags::NUMERIC | SortFlags::DESCENDING)]);
        expected.reverse();
        prop_assert_eq!(elements(&mut ctx, array), ints(&expected));
    }

    #[test]
    fn unique_sort_fails_on_duplicates(values in prop::collection::vec(0i32..8, 2..12)) {
        let mut ctx = Context::startup(8);
        let array = ctx.new_array(&ints(&values));
        let result = ctx.call_method(array, "sort", &[flag(SortFlags::NUMERIC | SortFlags::UNIQUE)]);
        let mut distinct = values.clone();
        distinct.sort();
        distinct.dedup();
        if distinct.len() < values.len() {
            prop_assert_eq!(result, Value::Int(0));
            prop_assert_eq!(elements(&mut ctx, array), ints(&values));
        } else {
            prop_assert_eq!(result, Value::Object(array));
            prop_assert_eq!(elements(&mut ctx, array), ints(&distinct));
        }
    }

    #[test]
    fn slices_concatenate_back(values in prop::collection::vec(any::<i32>(), 0..16), cut in 0usize..17) {
        let cut = cut.min(values.len());
        let mut ctx = Context::startup(8);
        let array = ctx.new_array(&ints(&values));
        let head = returned_array(ctx.call_method(array, "slice", &[Value::Int(0), Value::Int(cut as i32)]));
        let tail = returned_array(ctx.call_method(array, "slice", &[Value::Int(cut as i32)]));
        let joined = returned_array(ctx.call_method(head, "concat", &[Value::Object(tail)]));
        prop_assert_eq!(elements(&mut ctx, joined), ints(&values));
    }
}
