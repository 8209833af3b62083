//! Expression engine
//!
//! [`ExpressionEngine`] ties the pieces together: it compiles through the
//! cache, runs the safety checker when sandboxing is enabled, and interprets
//! against the registered functions, the caller's context and the ambient
//! constants `e`, `pi`, `inf` and `nan`.
//!
//! Registry mutations are published as a new function table snapshot, so an
//! evaluation that is already running keeps the table it started with.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::analyzer::analyze;
use crate::cache::{CacheStats, CompiledExpression, ExpressionCache};
use crate::config::{ConfigError, EngineConfig};
use crate::context::{Context, context_from_json};
use crate::error::{EvaluationError, ExpressionError};
use crate::evaluator::Interpreter;
use crate::functions::{
    FunctionCategory, FunctionDefinition, FunctionDoc, FunctionError, FunctionRegistry,
    FunctionTable, PYTHON_BUILTIN_NAMES,
};
use crate::parser::Parser;
use crate::sandbox::{SafetyChecker, SandboxPolicy};
use crate::value::Value;

static CONSTANTS: Lazy<HashMap<String, Value>> = Lazy::new(|| {
    HashMap::from([
        ("e".to_string(), Value::Float(std::f64::consts::E)),
        ("pi".to_string(), Value::Float(std::f64::consts::PI)),
        ("inf".to_string(), Value::Float(f64::INFINITY)),
        ("nan".to_string(), Value::Float(f64::NAN)),
    ])
});

/// Function table published to evaluations
struct FunctionSnapshot {
    /// Callables visible to expressions
    table: FunctionTable,
    /// Every registered name and alias, sandbox-hidden ones included
    names: HashSet<String>,
}

/// Sandboxed expression engine, safe to share between threads
pub struct ExpressionEngine {
    config: EngineConfig,
    /// Runtime policy handed to the interpreter
    policy: Arc<SandboxPolicy>,
    parser: Parser,
    checker: Option<SafetyChecker>,
    cache: Option<ExpressionCache>,
    registry: Mutex<FunctionRegistry>,
    snapshot: ArcSwap<FunctionSnapshot>,
}

impl ExpressionEngine {
    /// Engine with the default configuration and the builtin library
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(EngineConfig::default(), FunctionRegistry::with_builtins())
    }

    /// Engine with `config` and the builtin library
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when the configuration fails validation
    pub fn with_config(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_registry(config, FunctionRegistry::with_builtins()))
    }

    /// Engine with `config` and a caller-built registry
    #[must_use]
    pub fn with_registry(config: EngineConfig, registry: FunctionRegistry) -> Self {
        let parser = Parser::from_limits(config.parser);
        let policy = Arc::new(config.sandbox.clone());
        let checker = config
            .enable_sandbox
            .then(|| SafetyChecker::with_parser(Arc::clone(&policy), parser.clone()));
        // without the sandbox the method allowlist is not a boundary, only the limits are
        let policy = if config.enable_sandbox {
            policy
        } else {
            Arc::new(SandboxPolicy {
                enforce_type_attrs: false,
                ..config.sandbox.clone()
            })
        };
        let cache = config
            .enable_cache
            .then(|| ExpressionCache::new(config.cache_size));
        let snapshot = ArcSwap::from_pointee(Self::build_snapshot(&registry, &config));

        debug!(
            functions = registry.len(),
            sandbox = config.enable_sandbox,
            cache = config.enable_cache,
            "expression engine created"
        );

        Self {
            config,
            policy,
            parser,
            checker,
            cache,
            registry: Mutex::new(registry),
            snapshot,
        }
    }

    fn build_snapshot(registry: &FunctionRegistry, config: &EngineConfig) -> FunctionSnapshot {
        let all = registry.callables();
        let names = all.keys().cloned().collect();
        let table = if config.enable_sandbox {
            registry
                .safe_callables()
                .into_iter()
                .filter(|(name, _)| {
                    !PYTHON_BUILTIN_NAMES.contains(&name.as_str())
                        || config.sandbox.allows_builtin(name)
                })
                .collect()
        } else {
            all
        };
        FunctionSnapshot { table, names }
    }

    fn publish(&self, registry: &FunctionRegistry) {
        self.snapshot
            .store(Arc::new(Self::build_snapshot(registry, &self.config)));
    }

    /// Configuration the engine was built with
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Policy applied during evaluation
    #[must_use]
    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Parse `source`, through the cache when enabled
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError::Parse` for malformed input
    pub fn compile(&self, source: &str) -> Result<Arc<CompiledExpression>, ExpressionError> {
        let compiled = match &self.cache {
            Some(cache) => cache.get_or_compile(&self.parser, source),
            None => CompiledExpression::compile(&self.parser, source).map(Arc::new),
        };
        compiled.map_err(|source_error| ExpressionError::Parse {
            expression: source.to_string(),
            source: source_error,
        })
    }

    /// Evaluate `source` against `context`
    ///
    /// # Errors
    ///
    /// Parse and sandbox failures are reported before anything runs; runtime
    /// failures carry the expression text and the original cause
    pub fn evaluate(&self, source: &str, context: &Context) -> Result<Value, ExpressionError> {
        let compiled = self.compile(source)?;
        self.evaluate_compiled(&compiled, context)
    }

    /// Evaluate an expression compiled earlier
    ///
    /// # Errors
    ///
    /// As [`ExpressionEngine::evaluate`], minus parse errors
    pub fn evaluate_compiled(
        &self,
        compiled: &CompiledExpression,
        context: &Context,
    ) -> Result<Value, ExpressionError> {
        if let Some(checker) = &self.checker {
            let violations = checker.check_expression(&compiled.ast);
            if !violations.is_empty() {
                warn!(
                    expression = %compiled.source,
                    violations = violations.len(),
                    "expression rejected by sandbox"
                );
                return Err(ExpressionError::SecurityViolation {
                    expression: compiled.source.clone(),
                    violations,
                });
            }
        }

        let snapshot = self.snapshot.load_full();
        trace!(expression = %compiled.source, "evaluating expression");
        Interpreter::new(context, &snapshot.table, &self.policy)
            .with_constants(&CONSTANTS)
            .evaluate(&compiled.ast)
            .map_err(|err| ExpressionError::from_evaluation(&compiled.source, err))
    }

    /// Evaluate with a JSON object as context, returning JSON
    ///
    /// `null` is accepted as an empty context.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError::Evaluation` when `context` is neither an
    /// object nor `null`, otherwise as [`ExpressionEngine::evaluate`]
    pub fn evaluate_json(
        &self,
        source: &str,
        context: serde_json::Value,
    ) -> Result<serde_json::Value, ExpressionError> {
        let context = if context.is_null() {
            Some(Context::new())
        } else {
            context_from_json(context)
        };
        let context = context.ok_or_else(|| ExpressionError::Evaluation {
            expression: source.to_string(),
            source: EvaluationError::invalid("context must be a JSON object"),
        })?;
        let value = self.evaluate(source, &context)?;
        Ok(serde_json::Value::from(&value))
    }

    // ========================================================================
    // Static inspection
    // ========================================================================

    /// Problems that would stop `source` from running, empty when it is valid
    ///
    /// Only parses and checks; never evaluates.
    #[must_use]
    pub fn validate(&self, source: &str) -> Vec<String> {
        let expr = match self.parser.parse(source) {
            Ok(expr) => expr,
            Err(err) => return vec![format!("Syntax error: {err}")],
        };
        self.checker
            .as_ref()
            .map(|checker| {
                checker
                    .check_expression(&expr)
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names the caller has to supply, sorted; registered functions excluded
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError::Parse` for malformed input
    pub fn get_variables(&self, source: &str) -> Result<Vec<String>, ExpressionError> {
        let compiled = self.compile(source)?;
        let snapshot = self.snapshot.load();
        Ok(analyze(&compiled.ast, &snapshot.names).variables)
    }

    /// Function names the expression calls or references, sorted
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError::Parse` for malformed input
    pub fn get_functions(&self, source: &str) -> Result<Vec<String>, ExpressionError> {
        let compiled = self.compile(source)?;
        let snapshot = self.snapshot.load();
        Ok(analyze(&compiled.ast, &snapshot.names).functions)
    }

    // ========================================================================
    // Function registry
    // ========================================================================

    /// Register a custom function accepting any number of arguments
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError::Registration` when the registry is locked,
    /// the name is empty, or sandboxing forbids the name
    pub fn register_function<F>(
        &self,
        name: &str,
        func: F,
        description: &str,
    ) -> Result<(), ExpressionError>
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.register_definition(
            FunctionDefinition::new(name, FunctionCategory::Custom, 0, None, func)
                .description(description),
        )
    }

    /// Register a fully described function
    ///
    /// # Errors
    ///
    /// As [`ExpressionEngine::register_function`]
    pub fn register_definition(&self, definition: FunctionDefinition) -> Result<(), ExpressionError> {
        let name = definition.name.clone();
        let refuse = |reason: String| {
            warn!(function = %name, %reason, "function registration refused");
            ExpressionError::Registration {
                name: name.clone(),
                reason,
            }
        };

        if self.config.enable_sandbox
            && let Some(forbidden) = std::iter::once(&definition.name)
                .chain(&definition.aliases)
                .find(|candidate| self.policy.is_forbidden(candidate))
        {
            return Err(refuse(format!("'{forbidden}' is forbidden by the sandbox")));
        }

        let mut registry = self.registry.lock();
        registry
            .register(definition)
            .map_err(|err| refuse(err.message))?;
        self.publish(&registry);
        debug!(function = %name, "function registered");
        Ok(())
    }

    /// Remove a function or alias, `false` when nothing was removed
    pub fn unregister_function(&self, name: &str) -> bool {
        let mut registry = self.registry.lock();
        let removed = registry.unregister(name);
        if removed {
            self.publish(&registry);
            debug!(function = name, "function unregistered");
        }
        removed
    }

    /// Whether a function or alias is registered
    #[must_use]
    pub fn has_function(&self, name: &str) -> bool {
        self.registry.lock().has(name)
    }

    /// Canonical names of every registered function, sorted
    #[must_use]
    pub fn list_functions(&self) -> Vec<String> {
        self.registry
            .lock()
            .list_all()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Documentation of every registered function, grouped by category
    #[must_use]
    pub fn function_documentation(&self) -> BTreeMap<FunctionCategory, Vec<FunctionDoc>> {
        self.registry.lock().to_documentation()
    }

    /// Refuse further registrations
    pub fn lock_functions(&self) {
        self.registry.lock().lock();
    }

    // ========================================================================
    // Cache
    // ========================================================================

    /// Cache statistics, `None` when caching is disabled
    #[must_use]
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ExpressionCache::stats)
    }

    /// Drop every cached expression
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExpressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionEngine")
            .field("config", &self.config)
            .field("functions", &self.snapshot.load().table.len())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

static DEFAULT_ENGINE: Lazy<ExpressionEngine> = Lazy::new(ExpressionEngine::new);

/// Process-wide engine with the default configuration, built on first use
#[must_use]
pub fn default_engine() -> &'static ExpressionEngine {
    &DEFAULT_ENGINE
}

/// Evaluate with the default engine
///
/// # Errors
///
/// As [`ExpressionEngine::evaluate`]
pub fn evaluate(source: &str, context: &Context) -> Result<Value, ExpressionError> {
    default_engine().evaluate(source, context)
}

/// Validate with the default engine
#[must_use]
pub fn validate(source: &str) -> Vec<String> {
    default_engine().validate(source)
}

/// Register a function on the default engine
///
/// # Errors
///
/// As [`ExpressionEngine::register_function`]
pub fn register_function<F>(name: &str, func: F, description: &str) -> Result<(), ExpressionError>
where
    F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    default_engine().register_function(name, func, description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx(entries: &[(&str, Value)]) -> Context {
        entries
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_constants_yield_to_context() -> Result<(), ExpressionError> {
        let engine = ExpressionEngine::new();
        let empty = Context::new();
        assert_eq!(engine.evaluate("round(pi * 100)", &empty)?, Value::Int(314));
        assert_eq!(engine.evaluate("inf > 10 ** 9", &empty)?, Value::Bool(true));
        assert_eq!(engine.evaluate("nan == nan", &empty)?, Value::Bool(false));
        assert_eq!(
            engine.evaluate("pi", &ctx(&[("pi", Value::Int(3))]))?,
            Value::Int(3)
        );
        Ok(())
    }

    #[test]
    fn test_sandbox_hides_unlisted_builtins() {
        let mut config = EngineConfig::default();
        config.sandbox.allowed_builtins.remove("len");
        let sandboxed = ExpressionEngine::with_registry(config, FunctionRegistry::with_builtins());
        assert!(matches!(
            sandboxed.evaluate("len([1])", &Context::new()),
            Err(ExpressionError::UndefinedFunction { ref name, .. }) if name == "len"
        ));
        // the alias is not a Python builtin name
        assert_eq!(
            sandboxed.evaluate("length([1])", &Context::new()).ok(),
            Some(Value::Int(1))
        );
    }

    #[test]
    fn test_unsafe_functions_only_without_sandbox() -> Result<(), ExpressionError> {
        let sandboxed = ExpressionEngine::new();
        let open = ExpressionEngine::with_registry(
            EngineConfig::unsandboxed(),
            FunctionRegistry::with_builtins(),
        );
        let definition = || {
            FunctionDefinition::new("host_name", FunctionCategory::Custom, 0, Some(0), |_| {
                Ok(Value::from("localhost"))
            })
            .safe(false)
        };
        sandboxed.register_definition(definition())?;
        open.register_definition(definition())?;

        assert!(sandboxed.evaluate("host_name()", &Context::new()).is_err());
        assert_eq!(open.evaluate("host_name()", &Context::new())?, Value::from("localhost"));
        Ok(())
    }

    #[test]
    fn test_register_and_unregister() -> Result<(), ExpressionError> {
        let engine = ExpressionEngine::new();
        engine.register_function(
            "tax",
            |args| match args {
                [Value::Int(amount)] => Ok(Value::Int(amount / 10)),
                _ => Err(FunctionError::new("tax expects one integer")),
            },
            "Ten percent tax",
        )?;
        let context = ctx(&[("price", Value::Int(100))]);
        assert_eq!(engine.evaluate("price + tax(price)", &context)?, Value::Int(110));
        assert!(engine.has_function("tax"));
        assert_eq!(engine.get_variables("price + tax(price)")?, vec!["price"]);

        assert!(engine.unregister_function("tax"));
        assert!(!engine.unregister_function("tax"));
        assert!(matches!(
            engine.evaluate("tax(price)", &context),
            Err(ExpressionError::UndefinedFunction { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_registration_refusals() {
        let engine = ExpressionEngine::new();
        assert!(matches!(
            engine.register_function("eval", |_| Ok(Value::None), ""),
            Err(ExpressionError::Registration { ref name, .. }) if name == "eval"
        ));
        assert!(engine.register_function("", |_| Ok(Value::None), "").is_err());

        engine.lock_functions();
        assert!(engine.register_function("late", |_| Ok(Value::None), "").is_err());
        assert!(!engine.unregister_function("len"));
    }

    #[test]
    fn test_function_errors_keep_cause() -> Result<(), ExpressionError> {
        let engine = ExpressionEngine::new();
        engine.register_function("boom", |_| Err(FunctionError::new("kaboom")), "")?;
        let err = engine.evaluate("boom()", &Context::new());
        match err {
            Err(ExpressionError::Evaluation { expression, source }) => {
                assert_eq!(expression, "boom()");
                assert!(source.to_string().contains("kaboom"));
            }
            other => panic!("expected evaluation error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_validate_follows_sandbox_setting() {
        let sandboxed = ExpressionEngine::new();
        let open = ExpressionEngine::with_registry(
            EngineConfig::unsandboxed(),
            FunctionRegistry::with_builtins(),
        );
        assert_eq!(sandboxed.validate("x.__class__").len(), 1);
        assert!(open.validate("x.__class__").is_empty());
        assert!(sandboxed.validate("1 +")[0].starts_with("Syntax error:"));
    }

    #[test]
    fn test_json_surface() -> Result<(), ExpressionError> {
        let engine = ExpressionEngine::new();
        let result = engine.evaluate_json(
            "[x * 2 for x in values]",
            serde_json::json!({"values": [1, 2, 3]}),
        )?;
        assert_eq!(result, serde_json::json!([2, 4, 6]));
        assert_eq!(
            engine.evaluate_json("1 + 1", serde_json::Value::Null)?,
            serde_json::json!(2)
        );
        assert!(engine.evaluate_json("1", serde_json::json!([1])).is_err());
        Ok(())
    }

    #[test]
    fn test_cache_disabled() -> Result<(), Box<dyn std::error::Error>> {
        let engine = ExpressionEngine::with_config(EngineConfig {
            enable_cache: false,
            ..EngineConfig::default()
        })?;
        assert_eq!(engine.evaluate("1 + 2", &Context::new())?, Value::Int(3));
        assert_eq!(engine.cache_stats(), None);
        engine.clear_cache();
        Ok(())
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            cache_size: 0,
            ..EngineConfig::default()
        };
        assert!(ExpressionEngine::with_config(config).is_err());
    }

    #[test]
    fn test_default_engine_free_functions() -> Result<(), ExpressionError> {
        assert_eq!(evaluate("2 + 3 * 4", &Context::new())?, Value::Int(14));
        assert!(validate("__import__('os')").iter().any(|msg| msg.contains("__import__")));
        register_function("engine_test_answer", |_| Ok(Value::Int(42)), "")?;
        assert_eq!(evaluate("engine_test_answer()", &Context::new())?, Value::Int(42));
        assert!(std::ptr::eq(default_engine(), default_engine()));
        Ok(())
    }
}
