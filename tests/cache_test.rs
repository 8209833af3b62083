//! Tests for compiled expression caching through the engine

use std::sync::Arc;

use expr_sandbox::{
    CacheStats, Context, EngineConfig, ExpressionCache, ExpressionEngine, Parser, Value,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn engine_with_cache(size: usize) -> ExpressionEngine {
    ExpressionEngine::with_config(EngineConfig {
        cache_size: size,
        ..EngineConfig::default()
    })
    .expect("Test operation failed")
}

#[test]
fn test_repeated_evaluation_hits_cache() {
    let engine = engine_with_cache(16);
    let context = Context::from([("x".to_string(), Value::Int(2))]);
    for _ in 0..3 {
        assert_eq!(
            engine.evaluate("x * 21", &context).expect("Test operation failed"),
            Value::Int(42)
        );
    }
    assert_eq!(
        engine.cache_stats(),
        Some(CacheStats {
            size: 1,
            max_size: 16,
            hits: 2,
            misses: 1,
            hit_rate: 2.0 / 3.0,
        })
    );
}

#[test]
fn test_compile_returns_shared_expression() {
    let engine = engine_with_cache(4);
    let first = engine.compile("a + b").expect("Test operation failed");
    let second = engine.compile("a + b").expect("Test operation failed");
    assert!(Arc::ptr_eq(&first, &second));

    let context = Context::from([
        ("a".to_string(), Value::Int(1)),
        ("b".to_string(), Value::Int(2)),
    ]);
    assert_eq!(
        engine
            .evaluate_compiled(&first, &context)
            .expect("Test operation failed"),
        Value::Int(3)
    );
}

#[test]
fn test_security_check_runs_on_cached_expressions() {
    let engine = engine_with_cache(4);
    assert!(engine.compile("eval('1')").is_ok());
    // the cache holds the parse, the sandbox still rejects every evaluation
    for _ in 0..2 {
        assert!(engine.evaluate("eval('1')", &Context::new()).is_err());
    }
}

#[test]
fn test_clear_cache() {
    let engine = engine_with_cache(4);
    engine
        .evaluate("1 + 1", &Context::new())
        .expect("Test operation failed");
    engine.clear_cache();
    let stats = engine.cache_stats().expect("cache enabled");
    assert_eq!((stats.size, stats.hits, stats.misses), (0, 0, 0));
}

#[test]
fn test_capacity_is_respected() {
    let engine = engine_with_cache(3);
    for n in 0..10 {
        engine
            .evaluate(&format!("{n} + 1"), &Context::new())
            .expect("Test operation failed");
    }
    let stats = engine.cache_stats().expect("cache enabled");
    assert_eq!(stats.size, 3);
    assert_eq!(stats.misses, 10);
}

#[test]
fn test_shared_engine_across_threads() {
    let engine = engine_with_cache(32);
    std::thread::scope(|scope| {
        for worker in 0..4i64 {
            let engine = &engine;
            scope.spawn(move || {
                let context = Context::from([("w".to_string(), Value::Int(worker))]);
                for n in 0..25i64 {
                    let result = engine
                        .evaluate(&format!("w * 100 + {}", n % 5), &context)
                        .expect("Test operation failed");
                    assert_eq!(result, Value::Int(worker * 100 + n % 5));
                }
            });
        }
    });
    let stats = engine.cache_stats().expect("cache enabled");
    assert_eq!(stats.hits + stats.misses, 100);
    assert_eq!(stats.size, 5);
}

proptest! {
    #[test]
    fn prop_lookups_are_counted(indices in prop::collection::vec(0usize..8, 1..60)) {
        let cache = ExpressionCache::new(4);
        let parser = Parser::new();
        for index in &indices {
            let source = format!("value + {index}");
            let compiled = cache.get_or_compile(&parser, &source).expect("Test operation failed");
            prop_assert_eq!(&compiled.source, &source);
        }
        let stats = cache.stats();
        prop_assert_eq!(stats.hits + stats.misses, indices.len() as u64);
        prop_assert!(stats.size <= 4);
        prop_assert!(stats.hit_rate >= 0.0 && stats.hit_rate <= 1.0);
    }

    #[test]
    fn prop_cached_and_uncached_agree(a in -1000i64..1000, b in 1i64..1000) {
        let cached = engine_with_cache(8);
        let uncached = ExpressionEngine::with_config(EngineConfig {
            enable_cache: false,
            ..EngineConfig::default()
        })
        .expect("Test operation failed");
        let context = Context::from([
            ("a".to_string(), Value::Int(a)),
            ("b".to_string(), Value::Int(b)),
        ]);
        let source = "[a // b, a % b, a * b] if a > 0 else -a";
        prop_assert_eq!(
            cached.evaluate(source, &context).expect("Test operation failed"),
            uncached.evaluate(source, &context).expect("Test operation failed")
        );
    }
}
