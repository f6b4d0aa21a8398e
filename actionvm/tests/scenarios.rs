use std::rc::Rc;

use actionvm::{
    AbortReason, CollectError, ConstructKind, Context, ContextCreateInfo, ObjectId, PushValue,
    ScriptBuilder, Value,
};

fn run(ctx: &mut Context, builder: ScriptBuilder) -> Vec<Value> {
    ctx.execute(Rc::new(builder.build("scenario")))
}

fn text(ctx: &mut Context, value: Value) -> String {
    ctx.to_rust_string(value).to_string()
}

fn ints(values: &[i32]) -> Vec<Value> {
    values.iter().map(|&i| Value::Int(i)).collect()
}

fn traced(ctx: &Context) -> Vec<String> {
    ctx.trace_log().borrow().clone()
}

/// `receiver.method(args)` with the arguments already pushed in reverse.
fn call_on(b: &mut ScriptBuilder, receiver: &str, method: &str, argc: i32) {
    b.push([PushValue::Int(argc), PushValue::from(receiver)])
        .get_variable()
        .push([PushValue::from(method)])
        .call_method();
}

#[test]
fn legacy_add_leaves_the_sum() {
    let mut ctx = Context::startup(4);
    let mut b = ScriptBuilder::new(4);
    b.push([PushValue::Int(10), PushValue::Int(20)]).action(0x0A);
    assert_eq!(run(&mut ctx, b), vec![Value::Int(30)]);
}

#[test]
fn array_push_then_pop() {
    let mut ctx = Context::startup(8);
    let mut b = ScriptBuilder::new(8);
    b.push([PushValue::from("a"), PushValue::Int(0)]).init_array().define_local();
    let length = |b: &mut ScriptBuilder| {
        b.push([PushValue::from("a")])
            .get_variable()
            .push([PushValue::from("length")])
            .get_member();
    };
    b.push([PushValue::Int(3), PushValue::Int(2), PushValue::Int(1)]);
    call_on(&mut b, "a", "push", 3);
    b.pop();
    length(&mut b);
    call_on(&mut b, "a", "pop", 0);
    length(&mut b);
    assert_eq!(run(&mut ctx, b), ints(&[3, 3, 2]));
}

#[test]
fn sort_then_sort_descending() {
    let mut ctx = Context::startup(8);
    let mut b = ScriptBuilder::new(8);
    b.push([
        PushValue::from("list"),
        PushValue::from("c"),
        PushValue::from("a"),
        PushValue::from("b"),
        PushValue::Int(3),
    ])
    .init_array()
    .define_local();
    call_on(&mut b, "list", "sort", 0);
    b.pop();
    call_on(&mut b, "list", "join", 0);
    b.push([PushValue::from("Array")])
        .get_variable()
        .push([PushValue::from("DESCENDING")])
        .get_member();
    call_on(&mut b, "list", "sort", 1);
    b.pop();
    call_on(&mut b, "list", "join", 0);

    let values = run(&mut ctx, b);
    assert_eq!(values.len(), 2);
    assert_eq!(text(&mut ctx, values[0]), "a,b,c");
    assert_eq!(text(&mut ctx, values[1]), "c,b,a");
}

#[test]
fn with_scope_ends_when_jumping_out() {
    let mut ctx = Context::startup(8);
    let mut b = ScriptBuilder::new(8);
    b.push([
        PushValue::from("o"),
        PushValue::from("x"),
        PushValue::Int(7),
        PushValue::Int(1),
    ])
    .init_object()
    .define_local();
    b.push([PushValue::from("y"), PushValue::Int(2)]).set_variable();
    b.push([PushValue::from("o")]).get_variable().with_block(|body| {
        // Jump over the 13 bytes of `trace("skipped")` after the block.
        body.push([PushValue::from("x")])
            .get_variable()
            .trace()
            .push([PushValue::from("y")])
            .get_variable()
            .trace()
            .action_with(0x99, &13i16.to_le_bytes());
    });
    b.push([PushValue::from("skipped")]).trace();
    b.push([PushValue::from("x")]).get_variable().trace();

    assert!(run(&mut ctx, b).is_empty());
    assert_eq!(traced(&ctx), ["7", "2", "undefined"]);
}

fn recursive_countdown(b: &mut ScriptBuilder) {
    b.define_function("countdown", &["n"], |body| {
        body.push([PushValue::from("n")])
            .get_variable()
            .push([PushValue::Int(0)])
            .equals2()
            .not();
        let recurse = body.if_true();
        body.push([PushValue::Int(0)]).ret();
        body.bind(recurse);
        body.push([PushValue::from("n")])
            .get_variable()
            .push([PushValue::Int(1)])
            .action(0x0B)
            .push([PushValue::Int(1), PushValue::from("countdown")])
            .call_function()
            .ret();
    });
}

fn shallow_context(max_call_depth: usize) -> Context {
    Context::new(ContextCreateInfo {
        max_call_depth,
        ..ContextCreateInfo::default()
    })
    .expect("valid settings")
}

#[test]
fn recursion_below_the_ceiling_completes() {
    let mut ctx = shallow_context(16);
    let mut b = ScriptBuilder::new(8);
    recursive_countdown(&mut b);
    b.push([PushValue::Int(10), PushValue::Int(1), PushValue::from("countdown")])
        .call_function();
    assert_eq!(run(&mut ctx, b), vec![Value::Int(0)]);
    assert!(!ctx.is_aborted());
}

#[test]
fn runaway_recursion_aborts() {
    let mut ctx = shallow_context(16);
    let mut b = ScriptBuilder::new(8);
    b.define_function("forever", &[], |body| {
        body.push([PushValue::Int(0), PushValue::from("forever")])
            .call_function()
            .ret();
    });
    b.push([PushValue::Int(0), PushValue::from("forever")]).call_function();
    run(&mut ctx, b);
    assert_eq!(ctx.aborted(), Some(&AbortReason::StackOverflow { limit: 16 }));
    assert!(ctx.call_depth() == 0);

    let mut after = ScriptBuilder::new(8);
    after.push([PushValue::Int(1)]);
    assert!(run(&mut ctx, after).is_empty());
}

#[test]
fn try_catch_finally_runs_in_order() {
    let mut ctx = Context::startup(8);
    let mut b = ScriptBuilder::new(8);
    b.try_block(
        "e",
        |body| {
            body.push([PushValue::from("boom")]).throw();
            body.push([PushValue::from("unreached")]).trace();
        },
        Some(|catch: &mut ScriptBuilder| {
            catch.push([PushValue::from("e")]).get_variable().trace();
        }),
        Some(|finally: &mut ScriptBuilder| {
            finally.push([PushValue::from("cleanup")]).trace();
        }),
    );
    b.push([PushValue::from("after")]).trace();
    run(&mut ctx, b);
    assert_eq!(traced(&ctx), ["boom", "cleanup", "after"]);
    assert!(ctx.pending_exception().is_none());
}

#[test]
fn exceptions_cross_function_frames() {
    let mut ctx = Context::startup(8);
    let mut b = ScriptBuilder::new(8);
    b.define_function("thrower", &[], |body| {
        body.push([PushValue::from("deep")]).throw();
    });
    b.try_block(
        "e",
        |body| {
            body.push([PushValue::Int(0), PushValue::from("thrower")])
                .call_function()
                .pop();
        },
        Some(|catch: &mut ScriptBuilder| {
            catch.push([PushValue::from("e")]).get_variable().trace();
        }),
        None::<fn(&mut ScriptBuilder)>,
    );
    assert!(run(&mut ctx, b).is_empty());
    assert_eq!(traced(&ctx), ["deep"]);
}

#[test]
fn throwing_from_finally_replaces_the_exception() {
    let mut ctx = Context::startup(8);
    let mut b = ScriptBuilder::new(8);
    b.try_block(
        "e",
        |body| {
            body.try_block(
                "f",
                |inner| {
                    inner.push([PushValue::from("first")]).throw();
                },
                None::<fn(&mut ScriptBuilder)>,
                Some(|finally: &mut ScriptBuilder| {
                    finally.push([PushValue::from("second")]).throw();
                }),
            );
        },
        Some(|catch: &mut ScriptBuilder| {
            catch.push([PushValue::from("e")]).get_variable().trace();
        }),
        None::<fn(&mut ScriptBuilder)>,
    );
    b.push([PushValue::from("after")]).trace();
    assert!(run(&mut ctx, b).is_empty());
    assert_eq!(traced(&ctx), ["second", "after"]);
    assert!(ctx.pending_exception().is_none());
}

#[test]
fn jumping_out_of_a_try_runs_finally_first() {
    let mut ctx = Context::startup(8);
    let mut b = ScriptBuilder::new(8);
    b.try_block(
        "e",
        |body| {
            // Skip `trace("skipped")`, the finally block and
            // `trace("bypassed")`: 13 + 13 + 14 bytes.
            body.push([PushValue::from("body")])
                .trace()
                .action_with(0x99, &40i16.to_le_bytes());
            body.push([PushValue::from("skipped")]).trace();
        },
        None::<fn(&mut ScriptBuilder)>,
        Some(|finally: &mut ScriptBuilder| {
            finally.push([PushValue::from("cleanup")]).trace();
        }),
    );
    b.push([PushValue::from("bypassed")]).trace();
    b.push([PushValue::from("after")]).trace();
    assert!(run(&mut ctx, b).is_empty());
    assert_eq!(traced(&ctx), ["body", "cleanup", "after"]);
}

#[test]
fn string_extract_accepts_the_most_negative_index() {
    for code in [0x15, 0x35] {
        let mut ctx = Context::startup(8);
        let mut b = ScriptBuilder::new(8);
        b.push([PushValue::from("abc"), PushValue::Int(i32::MIN), PushValue::Int(1)])
            .action(code);
        let values = run(&mut ctx, b);
        assert_eq!(values.len(), 1);
        assert_eq!(text(&mut ctx, values[0]), "a");
    }
}

#[test]
fn uncaught_exceptions_are_cleared_at_the_boundary() {
    let mut ctx = Context::startup(8);
    let mut b = ScriptBuilder::new(8);
    b.push([PushValue::from("lost")]).throw();
    b.push([PushValue::from("unreached")]).trace();
    run(&mut ctx, b);
    assert!(ctx.pending_exception().is_none());
    assert!(traced(&ctx).is_empty());
    assert!(!ctx.is_aborted());
}

fn collect_from_native(ctx: &mut Context, _: Option<ObjectId>, _: &[Value]) -> Value {
    Value::Boolean(matches!(ctx.collect(), Err(CollectError::FrameActive(_))))
}

#[test]
fn collection_is_refused_inside_frames() {
    let mut ctx = Context::startup(8);
    let gc = ctx.new_native_function("gc", 0, collect_from_native, ConstructKind::Object);
    let global = ctx.global();
    ctx.set(global, "gc", Value::Object(gc));

    let mut b = ScriptBuilder::new(8);
    b.push([PushValue::Int(0), PushValue::from("gc")]).call_function();
    assert_eq!(run(&mut ctx, b), vec![Value::Boolean(true)]);
    assert!(ctx.collect().is_ok());
}

#[test]
fn identifiers_fold_case_before_version_7() {
    for (version, expected) in [(6, Value::Int(1)), (7, Value::Undefined)] {
        let mut ctx = Context::startup(version);
        let mut b = ScriptBuilder::new(version);
        b.push([PushValue::from("Foo"), PushValue::Int(1)])
            .set_variable()
            .push([PushValue::from("foo")])
            .get_variable();
        assert_eq!(run(&mut ctx, b), vec![expected], "version {version}");
    }
}

#[test]
fn garbage_is_collected_and_the_context_disposes() {
    let mut ctx = Context::startup(8);
    let mut b = ScriptBuilder::new(8);
    b.push([PushValue::Int(0)]).init_object().pop();
    run(&mut ctx, b);
    let stats = ctx.collect().expect("no frames are active");
    assert!(stats.objects_freed >= 1);
    ctx.dispose();
}
