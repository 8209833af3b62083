//! End-to-end tests for the expression engine
//!
//! Covers the language surface (arithmetic, logic, collections,
//! comprehensions, templates), error translation, the validate/evaluate
//! agreement and the determinism of evaluation.

use expr_sandbox::{
    Context, EngineConfig, ExpressionEngine, ExpressionError, FunctionRegistry, Value,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

fn context(json: serde_json::Value) -> Context {
    expr_sandbox::context::context_from_json(json).expect("context must be a JSON object")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn eval(engine: &ExpressionEngine, source: &str) -> Value {
    engine
        .evaluate(source, &Context::new())
        .expect("Test operation failed")
}

// ==================== Arithmetic ====================

#[test]
fn test_arithmetic_precedence() {
    let engine = ExpressionEngine::new();
    assert_eq!(eval(&engine, "2 + 3 * 4"), Value::Int(14));
    assert_eq!(eval(&engine, "(2 + 3) * 4"), Value::Int(20));
    assert_eq!(eval(&engine, "2 ** 10"), Value::Int(1024));
    assert_eq!(eval(&engine, "2 ** 3 ** 2"), Value::Int(512));
    assert_eq!(eval(&engine, "-2 ** 2"), Value::Int(-4));
    assert_eq!(eval(&engine, "10 // 3"), Value::Int(3));
    assert_eq!(eval(&engine, "-7 // 2"), Value::Int(-4));
    assert_eq!(eval(&engine, "10 % 3"), Value::Int(1));
    assert_eq!(eval(&engine, "-7 % 3"), Value::Int(2));
    assert_eq!(eval(&engine, "7 / 2"), Value::Float(3.5));
}

#[test]
fn test_division_by_zero_is_an_evaluation_error() {
    let engine = ExpressionEngine::new();
    let err = engine.evaluate("1 / 0", &Context::new());
    assert!(matches!(err, Err(ExpressionError::Evaluation { .. })));
}

#[test]
fn test_integer_overflow_is_reported() {
    let engine = ExpressionEngine::new();
    assert!(engine.evaluate("10 ** 100", &Context::new()).is_err());
    assert_eq!(eval(&engine, "10.0 ** 3"), Value::Float(1000.0));
}

// ==================== Logic and comparisons ====================

#[test]
fn test_comparisons_and_logic() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({"age": 30, "role": "admin", "tags": ["a", "b"]}));
    let check = |source: &str| engine.evaluate(source, &ctx).expect("Test operation failed");

    assert_eq!(check("18 <= age < 65"), Value::Bool(true));
    assert_eq!(check("age > 18 and role == 'admin'"), Value::Bool(true));
    assert_eq!(check("not (age > 18 or role == 'guest')"), Value::Bool(false));
    assert_eq!(check("'a' in tags and 'c' not in tags"), Value::Bool(true));
    assert_eq!(check("None is None"), Value::Bool(true));
    assert_eq!(check("1 == 1.0"), Value::Bool(true));
}

#[test]
fn test_conditional_branches() {
    let engine = ExpressionEngine::new();
    let adult = context(json!({"age": 30}));
    let minor = context(json!({"age": 10}));
    let source = "'adult' if age >= 18 else 'minor'";
    assert_eq!(
        engine.evaluate(source, &adult).expect("Test operation failed"),
        Value::from("adult")
    );
    assert_eq!(
        engine.evaluate(source, &minor).expect("Test operation failed"),
        Value::from("minor")
    );
    // the untaken branch is never evaluated
    assert_eq!(eval(&engine, "1 if True else 1 / 0"), Value::Int(1));
}

// ==================== Context access ====================

#[test]
fn test_context_access() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({
        "user": {"name": "Alice", "address": {"city": "Paris"}},
        "items": [],
        "scores": [3, 9, 4]
    }));
    let check = |source: &str| engine.evaluate(source, &ctx).expect("Test operation failed");

    assert_eq!(check("user.name"), Value::from("Alice"));
    assert_eq!(check("user['address']['city']"), Value::from("Paris"));
    assert_eq!(check("user.address.city.upper()"), Value::from("PARIS"));
    assert_eq!(check("user.get('email', 'none')"), Value::from("none"));
    assert_eq!(check("user.missing"), Value::None);
    assert_eq!(check("scores[-1]"), Value::Int(4));
    assert_eq!(check("scores[1:]"), Value::from(vec![9, 4]));
    assert_eq!(check("max(scores) - min(scores)"), Value::Int(6));
}

#[test]
fn test_missing_attribute_on_empty_dict_is_none() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({"a": {}}));
    assert_eq!(
        engine.evaluate("a.b", &ctx).expect("Test operation failed"),
        Value::None
    );
}

#[test]
fn test_index_on_empty_list_fails() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({"items": []}));
    let err = engine
        .evaluate("items[0]", &ctx)
        .expect_err("indexing an empty list must fail");
    assert!(
        err.to_string().to_lowercase().contains("index error"),
        "unexpected error: {err}"
    );
    assert_eq!(err.expression(), Some("items[0]"));
}

#[test]
fn test_undefined_names() {
    let engine = ExpressionEngine::new();
    assert!(matches!(
        engine.evaluate("missing + 1", &Context::new()),
        Err(ExpressionError::UndefinedVariable { ref name, .. }) if name == "missing"
    ));
    assert!(matches!(
        engine.evaluate("nothing_here(1)", &Context::new()),
        Err(ExpressionError::UndefinedFunction { ref name, .. }) if name == "nothing_here"
    ));
}

// ==================== Collections and comprehensions ====================

#[test]
fn test_collection_literals() {
    let engine = ExpressionEngine::new();
    assert_eq!(eval(&engine, "[1, 2] + [3]"), Value::from(vec![1, 2, 3]));
    assert_eq!(eval(&engine, "len({1, 2, 2, 3})"), Value::Int(3));
    assert_eq!(eval(&engine, "{'a': 1, 'b': 2}['b']"), Value::Int(2));
    assert_eq!(eval(&engine, "(1, 2)[0]"), Value::Int(1));
    assert_eq!(eval(&engine, "sorted([3, 1, 2])[::-1]"), Value::from(vec![3, 2, 1]));
}

#[test]
fn test_comprehensions() {
    let engine = ExpressionEngine::new();
    assert_eq!(
        eval(&engine, "sum([x ** 2 for x in range(5) if x % 2 == 0])"),
        Value::Int(20)
    );
    assert_eq!(
        eval(&engine, "[x * y for x in [1, 2] for y in [10, 100]]"),
        Value::from(vec![10, 100, 20, 200])
    );
    assert_eq!(
        eval(&engine, "{k: v * 2 for k, v in {'a': 1}.items()}"),
        Value::dict([("a", Value::Int(2))])
    );
    assert_eq!(eval(&engine, "sum(x for x in range(4))"), Value::Int(6));
}

#[test]
fn test_comprehension_bindings_do_not_leak() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({"x": "outer"}));
    assert_eq!(
        engine
            .evaluate("[[x for x in [1, 2]], x]", &ctx)
            .expect("Test operation failed"),
        Value::List(vec![Value::from(vec![1, 2]), Value::from("outer")])
    );
    // a failed comprehension leaves no binding behind either
    assert!(engine.evaluate("[1 / 0 for y in [1]]", &ctx).is_err());
    assert!(matches!(
        engine.evaluate("y", &ctx),
        Err(ExpressionError::UndefinedVariable { .. })
    ));
}

#[test]
fn test_templates() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({"name": "Bob", "total": 12.5}));
    assert_eq!(
        engine
            .evaluate("f'{name} owes {total:.2f}'", &ctx)
            .expect("Test operation failed"),
        Value::from("Bob owes 12.50")
    );
}

// ==================== Functions ====================

#[test]
fn test_builtin_library_is_available() {
    let engine = ExpressionEngine::new();
    assert_eq!(eval(&engine, "round(2.5)"), Value::Int(2));
    assert_eq!(eval(&engine, "upper('abc')"), Value::from("ABC"));
    assert_eq!(eval(&engine, "coalesce(None, 0, 5)"), Value::Int(0));
    assert_eq!(eval(&engine, "year('2024-02-29')"), Value::Int(2024));
    assert_eq!(eval(&engine, "add_days('2024-02-28', 2)"), Value::from("2024-03-01"));
    assert_eq!(eval(&engine, "int('42') + float('0.5')"), Value::Float(42.5));
}

#[test]
fn test_custom_function_round_trip() {
    let engine = ExpressionEngine::new();
    engine
        .register_function(
            "discount",
            |args| {
                let price = args.first().and_then(Value::as_float).unwrap_or_default();
                Ok(Value::Float(price * 0.9))
            },
            "Ten percent off",
        )
        .expect("Test operation failed");

    let ctx = context(json!({"price": 100}));
    assert_eq!(
        engine.evaluate("discount(price)", &ctx).expect("Test operation failed"),
        Value::Float(90.0)
    );
    assert!(engine.list_functions().contains(&"discount".to_string()));
    let docs = engine.function_documentation();
    let custom = docs
        .get(&expr_sandbox::FunctionCategory::Custom)
        .expect("custom category documented");
    assert_eq!(custom[0].description, "Ten percent off");
}

#[test]
fn test_custom_function_errors_from_anyhow() {
    use anyhow::Context as _;

    init_tracing();
    let engine = ExpressionEngine::new();
    engine
        .register_function(
            "parse_amount",
            |args| {
                let text = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("expected a string"))?;
                let amount: f64 = text
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid amount '{text}'"))?;
                Ok(Value::Float(amount))
            },
            "Parse a decimal amount",
        )
        .expect("Test operation failed");

    assert_eq!(eval(&engine, "parse_amount(' 2.5 ') * 2"), Value::Float(5.0));
    let err = engine
        .evaluate("parse_amount('ten')", &Context::new())
        .expect_err("bad amount must fail");
    assert!(err.to_string().contains("invalid amount 'ten'"), "{err}");
}

// ==================== Static inspection ====================

#[test]
fn test_get_variables_and_functions() {
    let engine = ExpressionEngine::new();
    let source = "round(price * quantity, 2) + tax(price) if enabled else 0";
    assert_eq!(
        engine.get_variables(source).expect("Test operation failed"),
        vec!["enabled", "price", "quantity"]
    );
    assert_eq!(
        engine.get_functions(source).expect("Test operation failed"),
        vec!["round", "tax"]
    );
    assert_eq!(
        engine
            .get_variables("[x for x in items if x > limit]")
            .expect("Test operation failed"),
        vec!["items", "limit", "x"]
    );
}

#[test]
fn test_validate_agrees_with_evaluate() {
    init_tracing();
    let engine = ExpressionEngine::new();
    let ctx = context(json!({"a": 1, "items": [1, 2, 3]}));
    let sources = [
        "a + 1",
        "len(items) > a",
        "1 +",
        "eval('1+1')",
        "a.__class__",
        "(x := 5)",
        "lambda: 1",
        "[i for i in items]",
        "open('/etc/passwd')",
    ];
    for source in sources {
        let problems = engine.validate(source);
        let rejected = matches!(
            engine.evaluate(source, &ctx),
            Err(ExpressionError::Parse { .. } | ExpressionError::SecurityViolation { .. })
        );
        assert_eq!(problems.is_empty(), !rejected, "disagreement for {source}: {problems:?}");
    }
}

#[test]
fn test_parse_errors_are_reported_before_evaluation() {
    let engine = ExpressionEngine::new();
    match engine.evaluate("(1 + 2", &Context::new()) {
        Err(ExpressionError::Parse { expression, .. }) => assert_eq!(expression, "(1 + 2"),
        other => panic!("expected parse error, got {other:?}"),
    }
    let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
    assert!(matches!(
        engine.evaluate(&deep, &Context::new()),
        Err(ExpressionError::Parse { .. })
    ));
}

// ==================== Configuration ====================

#[test]
fn test_engine_from_yaml_config() {
    let config = EngineConfig::from_yaml_str(
        "enable_sandbox: false\ncache_size: 8\nsandbox:\n  max_collection_size: 10\n",
    )
    .expect("Test operation failed");
    let engine = ExpressionEngine::with_config(config).expect("Test operation failed");

    // no checker, but limits still apply
    assert!(engine.validate("x.__class__").is_empty());
    assert!(engine.evaluate("list(range(100))", &Context::new()).is_err());
    assert_eq!(engine.cache_stats().map(|stats| stats.max_size), Some(8));
}

#[test]
fn test_engine_with_empty_registry() {
    let engine = ExpressionEngine::with_registry(EngineConfig::default(), FunctionRegistry::new());
    assert!(matches!(
        engine.evaluate("len([])", &Context::new()),
        Err(ExpressionError::UndefinedFunction { .. })
    ));
    assert_eq!(eval(&engine, "1 + 1"), Value::Int(2));
}

#[test]
fn test_oversized_inputs_are_errors_not_crashes() {
    let engine = ExpressionEngine::new();
    let ctx = Context::from([("x".to_string(), Value::Float(1.5))]);
    let sources = [
        format!("1{}", "+1".repeat(4999)),
        format!("a{}", ".b".repeat(4999)),
        format!("{}1", "-".repeat(9000)),
        format!("{}1", "not ".repeat(2000)),
        format!("1{}", " if 1 else 1".repeat(800)),
        format!("{}1{}", "[".repeat(4000), "]".repeat(4000)),
        "f'{x:.999999}'".to_string(),
        "f'{x:.70000f}'".to_string(),
        "f'{x:.70000e}'".to_string(),
        "f'{x:.70000g}'".to_string(),
        "f'{x:.70000%}'".to_string(),
        "f'{1:.70000f}'".to_string(),
    ];
    for source in &sources {
        assert!(engine.evaluate(source, &ctx).is_err(), "{source:.40} succeeded");
        let _ = engine.validate(source);
    }
}

#[test]
fn test_keyword_arguments() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({"x": 1.23456, "items": [3, 1, 2]}));
    let run = |source: &str| engine.evaluate(source, &ctx);

    assert_eq!(
        run("round(x, ndigits=2) == round(x, 2)").expect("Test operation failed"),
        Value::Bool(true)
    );
    assert_eq!(
        run("round(log(8, base=2))").expect("Test operation failed"),
        Value::Int(3)
    );
    assert_eq!(
        run("sorted(items, reverse=True)").expect("Test operation failed"),
        Value::from(vec![3i64, 2, 1])
    );
    assert_eq!(
        run("join(['a', 'b'], separator='-')").expect("Test operation failed"),
        Value::from("a-b")
    );
    assert_eq!(
        run("pad_left('7', width=3, char='0')").expect("Test operation failed"),
        Value::from("007")
    );

    for source in [
        "round(x, digits=2)",
        "round(x, 2, ndigits=2)",
        "dict(a=1)",
        "'abc'.upper(case=1)",
        "min(items, key=len)",
    ] {
        assert!(run(source).is_err(), "{source} was accepted");
    }
    assert!(matches!(
        run("round(x, ndigits=2, 1)"),
        Err(ExpressionError::Parse { .. })
    ));
}

// ==================== Properties ====================

proptest! {
    #[test]
    fn prop_arithmetic_matches_native(a in -10_000i64..10_000, b in -10_000i64..10_000) {
        let engine = ExpressionEngine::new();
        let ctx = Context::from([
            ("a".to_string(), Value::Int(a)),
            ("b".to_string(), Value::Int(b)),
        ]);
        let result = engine.evaluate("a * 3 + b - a", &ctx).expect("Test operation failed");
        prop_assert_eq!(result, Value::Int(a * 3 + b - a));
    }

    #[test]
    fn prop_evaluation_is_deterministic(values in prop::collection::vec(-1000i64..1000, 0..20)) {
        let engine = ExpressionEngine::new();
        let ctx = Context::from([("values".to_string(), Value::from(values))]);
        let source = "sorted([v * 2 for v in values if v % 3 != 0])";
        let first = engine.evaluate(source, &ctx).expect("Test operation failed");
        let second = engine.evaluate(source, &ctx).expect("Test operation failed");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_arbitrary_input_never_panics(source in "\\PC{0,40}") {
        let engine = ExpressionEngine::new();
        let _ = engine.evaluate(&source, &Context::new());
        let _ = engine.validate(&source);
    }

    #[test]
    fn prop_long_chains_never_panic(
        link in prop::sample::select(vec![
            "+1", "*2", "-x", ".b", "[0]", "()", " and 1", " < 2", "**1",
        ]),
        count in 1usize..5000,
    ) {
        let engine = ExpressionEngine::new();
        let ctx = Context::from([("x".to_string(), Value::Int(1))]);
        let source = format!("x{}", link.repeat(count));
        let _ = engine.evaluate(&source, &ctx);
        let _ = engine.validate(&source);
        let _ = engine.get_variables(&source);
    }

    #[test]
    fn prop_format_specs_never_panic(
        spec in "[<>^=]?[+ -]?#?0?[0-9]{0,7},?(\\.[0-9]{0,7})?[bcdeEfFgGosxX%]?",
        value in prop_oneof![
            any::<i64>().prop_map(Value::Int),
            (-1.0e300f64..1.0e300).prop_map(Value::Float),
            "[a-z]{0,8}".prop_map(Value::Str),
        ],
    ) {
        let engine = ExpressionEngine::new();
        let ctx = Context::from([("v".to_string(), value)]);
        let _ = engine.evaluate(&format!("f'{{v:{spec}}}'"), &ctx);
    }
}
