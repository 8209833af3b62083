//! Sandbox policy and static safety checking
//!
//! [`SandboxPolicy`] is the immutable rule set shared by the checker and the
//! interpreter. [`SafetyChecker`] walks a parsed expression and reports every
//! construct the policy forbids; the interpreter enforces the numeric limits.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ast::{Expression, Generator, Target};
use crate::methods::method_names;
use crate::parser::Parser;
use crate::value::ValueKind;

const FORBIDDEN_NAMES: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "open",
    "input",
    "__import__",
    "globals",
    "locals",
    "vars",
    "dir",
    "getattr",
    "setattr",
    "delattr",
    "hasattr",
    "type",
    "object",
    "classmethod",
    "staticmethod",
    "property",
    "file",
    "code",
    "memoryview",
    "breakpoint",
    "exit",
    "quit",
    "help",
    "copyright",
    "credits",
    "license",
];

const ALLOWED_BUILTINS: &[&str] = &[
    "int", "float", "str", "bool", "list", "tuple", "dict", "set", "abs", "round", "min", "max",
    "sum", "len", "sorted", "reversed", "enumerate", "zip", "map", "filter", "all", "any",
    "range", "repr", "bin", "hex", "oct", "ord", "chr", "pow", "divmod",
];

fn string_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

/// Rules governing which names, attributes and constructs an expression may use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxPolicy {
    /// Names that may not be referenced, called or bound
    pub forbidden_names: BTreeSet<String>,
    /// Flag single-underscore attributes as well as double-underscore ones
    pub strict_private_access: bool,
    /// Python-builtin-named functions exposed while sandboxing
    pub allowed_builtins: BTreeSet<String>,
    /// Methods callable on each value type
    pub allowed_type_attrs: BTreeMap<ValueKind, BTreeSet<String>>,
    /// Refuse methods missing from `allowed_type_attrs` at runtime
    pub enforce_type_attrs: bool,
    /// Wall-clock budget per evaluation, zero disables the deadline
    #[serde(with = "humantime_serde")]
    pub max_execution_time: Duration,
    /// Maximum comprehension nesting during evaluation
    pub max_recursion_depth: usize,
    /// Maximum length of any produced string, in characters
    pub max_string_length: usize,
    /// Maximum element count of any produced collection
    pub max_collection_size: usize,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        let allowed_type_attrs = [
            ValueKind::Str,
            ValueKind::List,
            ValueKind::Tuple,
            ValueKind::Dict,
            ValueKind::Set,
            ValueKind::Int,
            ValueKind::Float,
        ]
        .into_iter()
        .map(|kind| (kind, string_set(method_names(kind))))
        .collect();

        Self {
            forbidden_names: string_set(FORBIDDEN_NAMES),
            strict_private_access: false,
            allowed_builtins: string_set(ALLOWED_BUILTINS),
            allowed_type_attrs,
            enforce_type_attrs: true,
            max_execution_time: Duration::from_secs(5),
            max_recursion_depth: 100,
            max_string_length: 1_000_000,
            max_collection_size: 100_000,
        }
    }
}

impl SandboxPolicy {
    /// Whether `name` is on the denylist
    #[must_use]
    pub fn is_forbidden(&self, name: &str) -> bool {
        self.forbidden_names.contains(name)
    }

    /// Whether a Python-builtin-named function is exposed while sandboxing
    #[must_use]
    pub fn allows_builtin(&self, name: &str) -> bool {
        self.allowed_builtins.contains(name)
    }

    /// Whether `method` may be called on a value of `kind`
    #[must_use]
    pub fn allows_method(&self, kind: ValueKind, method: &str) -> bool {
        !self.enforce_type_attrs
            || self
                .allowed_type_attrs
                .get(&kind)
                .is_some_and(|methods| methods.contains(method))
    }

    /// Classify an attribute name, `None` when it is acceptable
    #[must_use]
    pub fn attribute_violation(&self, attr: &str) -> Option<Violation> {
        if attr.len() > 4 && attr.starts_with("__") && attr.ends_with("__") {
            return Some(Violation::DunderAttribute {
                attr: attr.to_string(),
            });
        }
        if attr.starts_with("__") || (self.strict_private_access && attr.starts_with('_')) {
            return Some(Violation::PrivateAttribute {
                attr: attr.to_string(),
            });
        }
        None
    }
}

/// A single policy violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The source does not parse
    Syntax {
        /// Parser message
        message: String,
    },
    /// Reference to or binding of a forbidden name
    ForbiddenName {
        /// The name
        name: String,
    },
    /// Call of a forbidden function or method
    ForbiddenCall {
        /// The called name
        name: String,
    },
    /// Access to a `__dunder__` attribute
    DunderAttribute {
        /// The attribute
        attr: String,
    },
    /// Access to a private attribute
    PrivateAttribute {
        /// The attribute
        attr: String,
    },
    /// Assignment expression or lambda
    Statement {
        /// Construct description
        construct: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { message } => write!(f, "syntax error: {message}"),
            Self::ForbiddenName { name } => write!(f, "forbidden name '{name}'"),
            Self::ForbiddenCall { name } => write!(f, "forbidden function call '{name}'"),
            Self::DunderAttribute { attr } => write!(f, "access to magic attribute '{attr}'"),
            Self::PrivateAttribute { attr } => write!(f, "access to private attribute '{attr}'"),
            Self::Statement { construct } => write!(f, "{construct} is not allowed"),
        }
    }
}

/// Static checker applying a [`SandboxPolicy`] to parsed expressions
#[derive(Debug, Clone)]
pub struct SafetyChecker {
    policy: Arc<SandboxPolicy>,
    parser: Parser,
}

impl SafetyChecker {
    /// Create a checker with the default parser
    #[must_use]
    pub fn new(policy: Arc<SandboxPolicy>) -> Self {
        Self::with_parser(policy, Parser::new())
    }

    /// Create a checker that parses with `parser`
    #[must_use]
    pub fn with_parser(policy: Arc<SandboxPolicy>, parser: Parser) -> Self {
        Self { policy, parser }
    }

    /// Policy in force
    #[must_use]
    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    /// Parse and check `source`; an empty result means it is safe
    ///
    /// Unparseable input yields a single [`Violation::Syntax`].
    #[must_use]
    pub fn check(&self, source: &str) -> Vec<Violation> {
        match self.parser.parse(source) {
            Ok(expr) => self.check_expression(&expr),
            Err(err) => vec![Violation::Syntax {
                message: err.to_string(),
            }],
        }
    }

    /// Whether `source` parses and passes every rule
    #[must_use]
    pub fn is_safe(&self, source: &str) -> bool {
        self.check(source).is_empty()
    }

    /// Check an already parsed expression
    #[must_use]
    pub fn check_expression(&self, expr: &Expression) -> Vec<Violation> {
        let mut walker = Walker {
            policy: &self.policy,
            violations: Vec::new(),
        };
        walker.visit(expr);
        walker.violations
    }
}

struct Walker<'p> {
    policy: &'p SandboxPolicy,
    violations: Vec<Violation>,
}

impl Walker<'_> {
    fn name(&mut self, name: &str) {
        if self.policy.is_forbidden(name) {
            self.violations.push(Violation::ForbiddenName {
                name: name.to_string(),
            });
        }
    }

    fn target(&mut self, target: &Target) {
        for name in target.names() {
            self.name(name);
        }
    }

    fn generators(&mut self, generators: &[Generator]) {
        for generator in generators {
            self.target(&generator.target);
        }
    }

    fn visit(&mut self, expr: &Expression) {
        match expr {
            Expression::Name(name) => self.name(name),
            Expression::Attribute { attr, .. } => {
                if let Some(violation) = self.policy.attribute_violation(attr) {
                    self.violations.push(violation);
                }
            }
            Expression::Call { func, .. } => {
                let called = match func.as_ref() {
                    Expression::Name(name) | Expression::Attribute { attr: name, .. } => {
                        Some(name)
                    }
                    _ => None,
                };
                if let Some(name) = called.filter(|name| self.policy.is_forbidden(name)) {
                    self.violations.push(Violation::ForbiddenCall { name: name.clone() });
                }
            }
            Expression::Comprehension { generators, .. }
            | Expression::DictComprehension { generators, .. } => self.generators(generators),
            Expression::Assign { target, .. } => {
                self.violations.push(Violation::Statement {
                    construct: "assignment expression".to_string(),
                });
                self.name(target);
            }
            Expression::Lambda { params, .. } => {
                self.violations.push(Violation::Statement {
                    construct: "lambda expression".to_string(),
                });
                for param in params {
                    self.name(param);
                }
            }
            _ => {}
        }
        expr.for_each_child(&mut |child| self.visit(child));
    }
}
