//! Compiled expression cache
//!
//! Entries are keyed by the BLAKE3 digest of the source text and verified
//! against the stored source on lookup, so a digest collision degrades to a
//! miss instead of returning the wrong expression. Compilation happens outside
//! the lock; parse failures are never cached.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::analyzer::analyze;
use crate::ast::Expression;
use crate::error::ParseError;
use crate::parser::Parser;

type Digest = [u8; 32];

/// A parsed expression with the names it references
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    /// Source text
    pub source: String,
    /// Parsed syntax tree
    pub ast: Expression,
    /// Names that are not called, sorted
    pub variables: Vec<String>,
    /// Names in call position, sorted
    pub functions: Vec<String>,
}

impl CompiledExpression {
    /// Parse `source` and classify its names
    ///
    /// # Errors
    ///
    /// Returns the parse error for malformed input
    pub fn compile(parser: &Parser, source: &str) -> Result<Self, ParseError> {
        let ast = parser.parse(source)?;
        let analysis = analyze(&ast, &HashSet::new());
        Ok(Self {
            source: source.to_string(),
            ast,
            variables: analysis.variables,
            functions: analysis.functions,
        })
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries currently cached
    pub size: usize,
    /// Capacity
    pub max_size: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to compile
    pub misses: u64,
    /// `hits / (hits + misses)`, zero before the first lookup
    pub hit_rate: f64,
}

struct CacheState {
    entries: LruCache<Digest, Arc<CompiledExpression>>,
    hits: u64,
    misses: u64,
}

/// Bounded LRU cache of compiled expressions, safe to share between threads
pub struct ExpressionCache {
    state: Mutex<CacheState>,
    max_size: usize,
}

fn digest(source: &str) -> Digest {
    *blake3::hash(source.as_bytes()).as_bytes()
}

impl ExpressionCache {
    /// Create a cache holding at most `max_size` expressions (at least one)
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
            max_size: capacity.get(),
        }
    }

    /// Look up `source`, counting a hit or a miss
    #[must_use]
    pub fn get(&self, source: &str) -> Option<Arc<CompiledExpression>> {
        let key = digest(source);
        let mut state = self.state.lock();
        match state.entries.get(&key) {
            Some(entry) if entry.source == source => {
                let entry = Arc::clone(entry);
                state.hits += 1;
                Some(entry)
            }
            _ => {
                state.misses += 1;
                None
            }
        }
    }

    /// Store a compiled expression, evicting the least recently used entry at capacity
    pub fn insert(&self, compiled: Arc<CompiledExpression>) {
        let key = digest(&compiled.source);
        self.state.lock().entries.put(key, compiled);
    }

    /// Cached expression for `source`, compiling it with `compute` on a miss
    ///
    /// # Errors
    ///
    /// Returns the error from `compute`; failures are not cached
    pub fn get_or_compute<F, E>(&self, source: &str, compute: F) -> Result<Arc<CompiledExpression>, E>
    where
        F: FnOnce(&str) -> Result<CompiledExpression, E>,
    {
        if let Some(compiled) = self.get(source) {
            debug!(expression = source, "expression cache hit");
            return Ok(compiled);
        }
        debug!(expression = source, "expression cache miss");
        let compiled = Arc::new(compute(source)?);
        self.insert(Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Cached expression for `source`, parsing it with `parser` on a miss
    ///
    /// # Errors
    ///
    /// Returns the parse error for malformed input
    pub fn get_or_compile(
        &self,
        parser: &Parser,
        source: &str,
    ) -> Result<Arc<CompiledExpression>, ParseError> {
        self.get_or_compute(source, |source| CompiledExpression::compile(parser, source))
    }

    /// Drop every entry and reset the counters
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.hits = 0;
        state.misses = 0;
    }

    /// Number of cached expressions
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let total = state.hits + state.misses;
        CacheStats {
            size: state.entries.len(),
            max_size: self.max_size,
            hits: state.hits,
            misses: state.misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                state.hits as f64 / total as f64
            },
        }
    }
}

impl std::fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hits_and_misses() -> Result<(), ParseError> {
        let cache = ExpressionCache::new(10);
        let parser = Parser::new();

        let first = cache.get_or_compile(&parser, "a + f(b)")?;
        let second = cache.get_or_compile(&parser, "a + f(b)")?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.variables, vec!["a", "b"]);
        assert_eq!(first.functions, vec!["f"]);

        let stats = cache.stats();
        assert_eq!((stats.size, stats.hits, stats.misses), (1, 1, 1));
        assert_eq!(stats.hit_rate, 0.5);
        Ok(())
    }

    #[test]
    fn test_lru_eviction() -> Result<(), ParseError> {
        let cache = ExpressionCache::new(2);
        let parser = Parser::new();
        cache.get_or_compile(&parser, "1")?;
        cache.get_or_compile(&parser, "2")?;
        // touch "1" so "2" becomes least recently used
        cache.get_or_compile(&parser, "1")?;
        cache.get_or_compile(&parser, "3")?;

        assert_eq!(cache.len(), 2);
        assert!(cache.get("1").is_some());
        assert!(cache.get("2").is_none());
        assert!(cache.get("3").is_some());
        Ok(())
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let cache = ExpressionCache::new(4);
        assert!(cache.get_or_compile(&Parser::new(), "1 +").is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_clear_resets_counters() -> Result<(), ParseError> {
        let cache = ExpressionCache::new(4);
        cache.get_or_compile(&Parser::new(), "x")?;
        cache.get_or_compile(&Parser::new(), "x")?;
        cache.clear();
        assert_eq!(
            cache.stats(),
            CacheStats {
                size: 0,
                max_size: 4,
                hits: 0,
                misses: 0,
                hit_rate: 0.0,
            }
        );
        Ok(())
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(ExpressionCache::new(0).stats().max_size, 1);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = ExpressionCache::new(8);
        let parser = Parser::new();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for n in 0..50 {
                        let source = format!("x + {}", n % 5);
                        assert!(cache.get_or_compile(&parser, &source).is_ok());
                    }
                });
            }
        });
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 200);
        assert_eq!(stats.size, 5);
    }
}
