//! Performance benchmarks for expression parsing, checking and evaluation.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use expr_sandbox::{Context, EngineConfig, ExpressionEngine, Parser, SafetyChecker, Value};
use std::fmt::Display;
use std::sync::Arc;

/// Helper that panics with context when a benchmark setup step fails.
fn require_ok<T, E>(result: Result<T, E>, context: &str) -> T
where
    E: Display,
{
    match result {
        Ok(value) => value,
        Err(err) => panic!("{context}: {err}"),
    }
}

const EXPRESSIONS: &[(&str, &str)] = &[
    ("simple_var", "name"),
    ("arithmetic", "age + 10"),
    ("comparison", "age >= 18 and age <= 65"),
    ("function_call", "len(name) > 0"),
    ("nested", "(value * 2) + (max(a, b) - min(c, d))"),
    (
        "comprehension",
        "sum([x ** 2 for x in items if x % 2 == 0])",
    ),
    ("template", "f'{name} is {age} years old'"),
];

fn sample_context() -> Context {
    Context::from([
        ("name".to_string(), Value::from("John Doe")),
        ("age".to_string(), Value::Int(30)),
        ("value".to_string(), Value::Int(42)),
        ("a".to_string(), Value::Int(10)),
        ("b".to_string(), Value::Int(20)),
        ("c".to_string(), Value::Int(5)),
        ("d".to_string(), Value::Int(15)),
        ("items".to_string(), Value::List((0..100).map(Value::Int).collect())),
    ])
}

/// Benchmark parsing of representative expressions.
fn bench_expression_parsing(c: &mut Criterion) {
    let parser = Parser::new();
    let mut group = c.benchmark_group("expression_parsing");

    for (name, expr) in EXPRESSIONS {
        group.bench_function(*name, |b| {
            b.iter(|| {
                let result = parser.parse(black_box(expr));
                assert!(result.is_ok());
            })
        });
    }

    group.finish();
}

/// Benchmark the static safety checker.
fn bench_safety_check(c: &mut Criterion) {
    let checker = SafetyChecker::new(Arc::new(Default::default()));
    let mut group = c.benchmark_group("safety_check");

    group.bench_function("safe", |b| {
        b.iter(|| checker.is_safe(black_box("sum([x for x in items]) + len(name)")))
    });
    group.bench_function("unsafe", |b| {
        b.iter(|| checker.check(black_box("().__class__.__bases__[0].__subclasses__()")))
    });

    group.finish();
}

/// Benchmark full evaluation with and without the compiled expression cache.
fn bench_expression_evaluation(c: &mut Criterion) {
    let context = sample_context();
    let cached = ExpressionEngine::new();
    let uncached = require_ok(
        ExpressionEngine::with_config(EngineConfig {
            enable_cache: false,
            ..EngineConfig::default()
        }),
        "failed to build uncached engine",
    );

    let mut group = c.benchmark_group("expression_evaluation");

    for (name, expr) in EXPRESSIONS {
        require_ok(cached.evaluate(expr, &context), "warm-up evaluation failed");
        group.bench_function(format!("cached_{name}"), |b| {
            b.iter(|| require_ok(cached.evaluate(black_box(expr), &context), "evaluation failed"))
        });
        group.bench_function(format!("uncached_{name}"), |b| {
            b.iter(|| {
                require_ok(uncached.evaluate(black_box(expr), &context), "evaluation failed")
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_expression_parsing,
    bench_safety_check,
    bench_expression_evaluation
);
criterion_main!(benches);
