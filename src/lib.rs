//! # Expression Sandbox
//!
//! Safe evaluation of untrusted, Python-style expressions against a caller
//! supplied context.
//!
//! Source text is parsed into an [`Expression`] tree, checked statically
//! against a [`SandboxPolicy`], and evaluated by a tree-walking
//! [`Interpreter`] that never reaches any host facility beyond the functions
//! in its [`FunctionRegistry`]. [`ExpressionEngine`] composes these stages
//! with an LRU cache of compiled expressions.
//!
//! ```no_run
//! use expr_sandbox::{Context, ExpressionEngine, Value};
//!
//! let engine = ExpressionEngine::new();
//! let context = Context::from([("price".to_string(), Value::Int(100))]);
//! let total = engine.evaluate("price * 2 if price > 50 else price", &context);
//! assert_eq!(total.ok(), Some(Value::Int(200)));
//! ```
//!
//! ## Design Principles
//!
//! - **Closed language**: a single expression; no assignment, lambdas or statements
//! - **Deny by default**: forbidden names, dunder attributes and unlisted methods are rejected
//! - **Bounded work**: depth, size and deadline limits turn runaway input into errors

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // int/float promotion follows Python semantics
#![allow(clippy::cast_possible_truncation)] // values are range-checked before narrowing
#![allow(clippy::float_cmp)] // numeric equality is part of the language
#![allow(clippy::match_same_arms)] // explicit matching can improve clarity

/// Identifier classification
pub mod analyzer;

/// Expression syntax tree
pub mod ast;

/// Compiled expression cache
pub mod cache;

/// Engine configuration
pub mod config;

/// Dotted and bracketed context paths
pub mod context;

/// Engine orchestration
pub mod engine;

/// Error types
pub mod error;

/// Tree-walking interpreter
pub mod evaluator;

/// Function registry and builtin library
pub mod functions;

/// Methods callable on values
pub mod methods;

/// Operator semantics
pub mod operators;

/// Expression parser
pub mod parser;

/// Sandbox policy and static checking
pub mod sandbox;

/// Dynamic values
pub mod value;

// Re-export commonly used types
pub use ast::Expression;
pub use cache::{CacheStats, CompiledExpression, ExpressionCache};
pub use config::{ConfigError, EngineConfig};
pub use context::{Context, ContextPath, PathError};
pub use engine::{ExpressionEngine, default_engine, evaluate, register_function, validate};
pub use error::{EvaluationError, ExpressionError, ParseError};
pub use evaluator::Interpreter;
pub use functions::{FunctionCategory, FunctionDefinition, FunctionError, FunctionRegistry};
pub use parser::{Parser, ParserLimits};
pub use sandbox::{SafetyChecker, SandboxPolicy, Violation};
pub use value::{Callable, Value, ValueKind};
