//! Security tests for the expression sandbox
//!
//! Test Categories:
//! - Code Injection: calls to evaluation and import facilities
//! - Introspection: dunder and private attribute access
//! - Statements: assignment expressions and lambdas
//! - Resource Exhaustion: size, depth and deadline limits
//! - Method Allowlist: runtime enforcement of per-type methods
//!
//! All tests verify that attacks are refused before or during evaluation
//! and that legitimate expressions keep working.

use std::sync::Arc;
use std::time::Duration;

use expr_sandbox::{
    Context, EngineConfig, ExpressionEngine, ExpressionError, ParseError, SafetyChecker,
    SandboxPolicy, Value, Violation,
};
use pretty_assertions::assert_eq;

/// Helper to create an engine with strict limits
fn create_secure_engine() -> ExpressionEngine {
    let mut config = EngineConfig::default();
    config.sandbox.max_execution_time = Duration::from_millis(100);
    config.sandbox.max_recursion_depth = 4;
    config.sandbox.max_string_length = 1024;
    config.sandbox.max_collection_size = 1000;
    config.sandbox.strict_private_access = true;
    ExpressionEngine::with_config(config).expect("Test operation failed")
}

fn violations(engine: &ExpressionEngine, source: &str) -> Vec<Violation> {
    match engine.evaluate(source, &Context::new()) {
        Err(ExpressionError::SecurityViolation { violations, .. }) => violations,
        other => panic!("expected a security violation for {source}, got {other:?}"),
    }
}

// ==================== Code Injection ====================

#[test]
fn test_eval_and_exec_are_refused() {
    let engine = create_secure_engine();
    for source in ["eval('1+1')", "exec('x = 1')", "compile('1', 'f', 'eval')"] {
        assert!(!violations(&engine, source).is_empty(), "{source} was accepted");
    }
}

#[test]
fn test_import_is_refused() {
    let engine = create_secure_engine();
    let found = violations(&engine, "__import__('os').system('ls')");
    assert!(found.contains(&Violation::ForbiddenName {
        name: "__import__".to_string()
    }));
    assert!(found.iter().any(|violation| violation.to_string().contains("__import__")));
}

#[test]
fn test_forbidden_names_cannot_be_smuggled_through_context() {
    // a context entry named like a forbidden builtin is still refused statically
    let engine = create_secure_engine();
    let context = Context::from([("open".to_string(), Value::from("harmless"))]);
    assert!(matches!(
        engine.evaluate("open", &context),
        Err(ExpressionError::SecurityViolation { .. })
    ));
}

#[test]
fn test_forbidden_comprehension_target() {
    let engine = create_secure_engine();
    assert!(!violations(&engine, "[eval for eval in [1]]").is_empty());
}

#[test]
fn test_every_violation_is_reported() {
    let engine = create_secure_engine();
    let found = violations(&engine, "eval(x.__class__) + open(y._secret)");
    assert!(found.len() >= 4, "only {found:?}");
}

// ==================== Introspection ====================

#[test]
fn test_dunder_attribute_chain_is_refused() {
    let engine = create_secure_engine();
    let found = violations(&engine, "().__class__.__bases__[0].__subclasses__()");
    assert!(found.iter().all(|violation| matches!(
        violation,
        Violation::DunderAttribute { .. } | Violation::ForbiddenCall { .. }
    )));
    assert!(found.contains(&Violation::DunderAttribute {
        attr: "__subclasses__".to_string()
    }));
}

#[test]
fn test_private_attributes_in_strict_mode() {
    let engine = create_secure_engine();
    assert_eq!(
        violations(&engine, "user._password"),
        vec![Violation::PrivateAttribute {
            attr: "_password".to_string()
        }]
    );

    let relaxed = ExpressionEngine::new();
    let context = Context::from([(
        "user".to_string(),
        Value::dict([("_password", Value::from("hunter2"))]),
    )]);
    assert_eq!(
        relaxed
            .evaluate("user._password", &context)
            .expect("Test operation failed"),
        Value::from("hunter2")
    );
}

// ==================== Statements ====================

#[test]
fn test_statements_are_refused() {
    let engine = create_secure_engine();
    assert!(matches!(
        violations(&engine, "(x := 1)").as_slice(),
        [Violation::Statement { .. }]
    ));
    assert!(matches!(
        violations(&engine, "lambda: 1").as_slice(),
        [Violation::Statement { .. }]
    ));
    // statement keywords never parse
    for source in ["import os", "x = 1", "del x", "while True: pass"] {
        assert!(matches!(
            engine.evaluate(source, &Context::new()),
            Err(ExpressionError::Parse { .. })
        ));
    }
}

// ==================== Resource Exhaustion ====================

#[test]
fn test_string_growth_is_bounded() {
    let engine = create_secure_engine();
    assert!(engine.evaluate("'a' * 2000", &Context::new()).is_err());
    assert!(engine.evaluate("'ab' * 100", &Context::new()).is_ok());
}

#[test]
fn test_collection_growth_is_bounded() {
    let engine = create_secure_engine();
    for source in ["[0] * 5000", "list(range(5000))", "[x for x in range(5000)]"] {
        assert!(
            engine.evaluate(source, &Context::new()).is_err(),
            "{source} was not bounded"
        );
    }
}

#[test]
fn test_nesting_is_bounded() {
    let engine = create_secure_engine();
    let nested = "[[[[[1 for a in [1]] for b in [1]] for c in [1]] for d in [1]] for e in [1]]";
    assert!(matches!(
        engine.evaluate(nested, &Context::new()),
        Err(ExpressionError::RecursionLimit { limit: 4, .. })
    ));

    let deep = format!("{}1{}", "[".repeat(300), "]".repeat(300));
    assert!(matches!(
        engine.evaluate(&deep, &Context::new()),
        Err(ExpressionError::Parse { .. })
    ));
}

#[test]
fn test_long_flat_chains_are_refused_gracefully() {
    // default limits: the chains fit in max_length but not in max_depth
    let engine = ExpressionEngine::new();
    for source in [
        format!("1{}", "+1".repeat(4999)),
        format!("a{}", ".b".repeat(4999)),
        format!("x{}", "[0]".repeat(3000)),
        format!("f{}", "()".repeat(4999)),
        format!("2{}", "*2".repeat(4999)),
    ] {
        assert!(source.len() <= 10_000);
        assert!(matches!(
            engine.evaluate(&source, &Context::new()),
            Err(ExpressionError::Parse {
                source: ParseError::TooDeep { .. },
                ..
            })
        ));
        assert!(engine.get_variables(&source).is_err());
        assert!(!engine.validate(&source).is_empty());
    }
}

#[test]
fn test_deadline_stops_runaway_comprehension() {
    let engine = create_secure_engine();
    let result = engine.evaluate(
        "sum(x * y for x in range(1000) for y in range(1000))",
        &Context::new(),
    );
    assert!(result.is_err());
}

#[test]
fn test_explicit_timeout_is_reported() {
    let config = EngineConfig::default().with_timeout(Duration::from_nanos(1));
    let engine = ExpressionEngine::with_config(config).expect("Test operation failed");
    assert!(matches!(
        engine.evaluate("[len(str(x)) for x in range(100)]", &Context::new()),
        Err(ExpressionError::Timeout { .. })
    ));
}

#[test]
fn test_integer_overflow_does_not_wrap() {
    let engine = create_secure_engine();
    let context = Context::from([("big".to_string(), Value::Int(i64::MAX))]);
    assert!(engine.evaluate("big + 1", &context).is_err());
    assert!(engine.evaluate("2 ** 64", &context).is_err());
    assert!(engine.evaluate("1 << 70", &context).is_err());
}

// ==================== Method Allowlist ====================

#[test]
fn test_unlisted_methods_are_refused_at_runtime() {
    let mut config = EngineConfig::default();
    config
        .sandbox
        .allowed_type_attrs
        .insert(expr_sandbox::ValueKind::Str, ["lower".to_string()].into());
    let engine = ExpressionEngine::with_config(config).expect("Test operation failed");

    assert_eq!(
        engine
            .evaluate("'ABC'.lower()", &Context::new())
            .expect("Test operation failed"),
        Value::from("abc")
    );
    assert!(engine.evaluate("'abc'.upper()", &Context::new()).is_err());
    assert!(engine.evaluate("'abc'.format()", &Context::new()).is_err());
}

// ==================== Checker ====================

#[test]
fn test_checker_standalone() {
    let checker = SafetyChecker::new(Arc::new(SandboxPolicy::default()));
    assert!(checker.is_safe("2 + 2"));
    assert!(!checker.check("eval('1+1')").is_empty());
    assert!(matches!(
        checker.check("1 +").as_slice(),
        [Violation::Syntax { .. }]
    ));
}

#[test]
fn test_legitimate_complex_expression_still_works() {
    let engine = create_secure_engine();
    let context = Context::from([(
        "orders".to_string(),
        Value::List(vec![
            Value::dict([("total", Value::Int(120)), ("status", Value::from("paid"))]),
            Value::dict([("total", Value::Int(80)), ("status", Value::from("open"))]),
        ]),
    )]);
    assert_eq!(
        engine
            .evaluate(
                "sum([o['total'] for o in orders if o.status == 'paid']) * 1.1",
                &context
            )
            .expect("Test operation failed"),
        Value::Float(120.0 * 1.1)
    );
}
