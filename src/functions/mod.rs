//! Function registry and the builtin function library
//!
//! A [`FunctionDefinition`] pairs a [`Callable`] with the metadata used for
//! arity checks, sandbox filtering and documentation. The engine builds its
//! per-evaluation function table from a [`FunctionRegistry`].

#![allow(missing_docs)]

pub mod convert;
pub mod datetime;
pub mod list;
pub mod logic;
pub mod math;
pub mod string;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EvaluationError;
use crate::value::{Callable, Number, Param, Value};

/// Error type for function calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FunctionError {
    /// Human-readable description
    pub message: String,
}

impl FunctionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Argument count outside `min..=max`
    #[must_use]
    pub fn wrong_arity(name: &str, min: usize, max: Option<usize>, actual: usize) -> Self {
        let expected = match max {
            Some(max) if max == min => format!("{min}"),
            Some(max) => format!("{min} to {max}"),
            None => format!("at least {min}"),
        };
        Self {
            message: format!("Function '{name}' expects {expected} arguments, got {actual}"),
        }
    }

    pub fn invalid_argument(name: &str, message: impl Into<String>) -> Self {
        Self {
            message: format!(
                "Invalid argument for function '{}': {}",
                name,
                message.into()
            ),
        }
    }
}

impl From<EvaluationError> for FunctionError {
    fn from(error: EvaluationError) -> Self {
        Self::new(error.to_string())
    }
}

impl From<anyhow::Error> for FunctionError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(format!("{error:#}"))
    }
}

/// Grouping used for listing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionCategory {
    Math,
    String,
    Datetime,
    Logic,
    List,
    Type,
    Custom,
}

impl fmt::Display for FunctionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Math => "math",
            Self::String => "string",
            Self::Datetime => "datetime",
            Self::Logic => "logic",
            Self::List => "list",
            Self::Type => "type",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// A registered function and its metadata
#[derive(Clone)]
pub struct FunctionDefinition {
    pub name: String,
    pub category: FunctionCategory,
    pub description: String,
    /// Human-readable call signature
    pub signature: String,
    pub examples: Vec<String>,
    pub min_args: usize,
    pub max_args: Option<usize>,
    /// Alternative names resolving to this definition
    pub aliases: Vec<String>,
    /// Exposed while sandboxing is enabled
    pub safe: bool,
    callable: Callable,
}

impl FunctionDefinition {
    /// Define a function from a closure; arity is checked before `func` runs
    pub fn new<F>(
        name: impl Into<String>,
        category: FunctionCategory,
        min_args: usize,
        max_args: Option<usize>,
        func: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            callable: Callable::new(name.as_str(), min_args, max_args, func),
            name,
            category,
            description: String::new(),
            signature: String::new(),
            examples: Vec::new(),
            min_args,
            max_args,
            aliases: Vec::new(),
            safe: true,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self.callable = self
            .callable
            .with_params(Param::from_signature(&self.signature));
        self
    }

    #[must_use]
    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Mark whether the function is exposed in sandbox mode
    #[must_use]
    pub fn safe(mut self, safe: bool) -> Self {
        self.safe = safe;
        self
    }

    /// The callable bound to the canonical name
    #[must_use]
    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    /// Invoke with arity validation
    pub fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
        self.callable.call(args)
    }

    fn documentation(&self) -> FunctionDoc {
        FunctionDoc {
            name: self.name.clone(),
            category: self.category,
            description: self.description.clone(),
            signature: self.signature.clone(),
            examples: self.examples.clone(),
            aliases: self.aliases.clone(),
            min_args: self.min_args,
            max_args: self.max_args,
            safe: self.safe,
        }
    }
}

impl fmt::Debug for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDefinition")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("aliases", &self.aliases)
            .field("safe", &self.safe)
            .finish_non_exhaustive()
    }
}

/// Serializable description of a registered function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDoc {
    pub name: String,
    pub category: FunctionCategory,
    pub description: String,
    pub signature: String,
    pub examples: Vec<String>,
    pub aliases: Vec<String>,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub safe: bool,
}

/// Name to callable lookup table handed to the interpreter
pub type FunctionTable = HashMap<String, Callable>;

/// Names of Python builtins; these are only exposed in sandbox mode when the
/// policy's `allowed_builtins` lists them
pub const PYTHON_BUILTIN_NAMES: &[&str] = &[
    "abs", "all", "any", "ascii", "bin", "bool", "bytes", "callable", "chr", "complex", "dict",
    "divmod", "enumerate", "filter", "float", "format", "frozenset", "hash", "hex", "id", "int",
    "isinstance", "issubclass", "iter", "len", "list", "map", "max", "min", "next", "oct", "ord",
    "pow", "print", "range", "repr", "reversed", "round", "set", "slice", "sorted", "str", "sum",
    "super", "tuple", "zip",
];

/// Registry of named functions with aliases
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, FunctionDefinition>,
    /// alias -> canonical name
    aliases: BTreeMap<String, String>,
    /// Whether the registry is locked to prevent further registrations
    locked: bool,
}

impl FunctionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the whole builtin library
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let definitions = math::definitions()
            .into_iter()
            .chain(string::definitions())
            .chain(datetime::definitions())
            .chain(logic::definitions())
            .chain(list::definitions())
            .chain(convert::definitions());
        for definition in definitions {
            registry.insert(definition);
        }
        registry
    }

    /// Lock the registry to prevent further registrations
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Check if the registry is locked
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Register a definition, replacing any function of the same name
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is locked, the name is empty or an
    /// alias collides with a registered function name
    pub fn register(&mut self, definition: FunctionDefinition) -> Result<(), FunctionError> {
        if self.locked {
            return Err(FunctionError::new("Function registry is locked"));
        }
        if definition.name.is_empty() {
            return Err(FunctionError::new("Function name must not be empty"));
        }
        self.check_aliases(&definition)?;
        self.insert(definition);
        Ok(())
    }

    /// Register a closure as a function
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is locked
    pub fn register_fn<F>(
        &mut self,
        name: &str,
        category: FunctionCategory,
        min_args: usize,
        max_args: Option<usize>,
        func: F,
    ) -> Result<(), FunctionError>
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.register(FunctionDefinition::new(
            name, category, min_args, max_args, func,
        ))
    }

    /// An alias may not shadow a canonical name, its own included
    fn check_aliases(&self, definition: &FunctionDefinition) -> Result<(), FunctionError> {
        match definition
            .aliases
            .iter()
            .find(|alias| **alias == definition.name || self.functions.contains_key(*alias))
        {
            Some(alias) => Err(FunctionError::new(format!(
                "Alias '{alias}' of '{}' collides with a function name",
                definition.name
            ))),
            None => Ok(()),
        }
    }

    fn insert(&mut self, definition: FunctionDefinition) {
        if let Some(previous) = self.functions.remove(&definition.name) {
            for alias in &previous.aliases {
                self.aliases.remove(alias);
            }
        }
        // names taken over from another definition leave its alias list
        for name in std::iter::once(&definition.name).chain(&definition.aliases) {
            if let Some(owner) = self.aliases.remove(name)
                && let Some(owner) = self.functions.get_mut(&owner)
            {
                owner.aliases.retain(|alias| alias != name);
            }
        }
        for alias in &definition.aliases {
            self.aliases.insert(alias.clone(), definition.name.clone());
        }
        self.functions.insert(definition.name.clone(), definition);
    }

    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    /// Look up a definition by name or alias
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.get(self.canonical(name))
    }

    /// Look up a callable by name or alias
    #[must_use]
    pub fn get_callable(&self, name: &str) -> Option<Callable> {
        self.get(name).map(|definition| definition.callable.clone())
    }

    /// Whether a name or alias is registered
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Canonical names, sorted
    #[must_use]
    pub fn list_all(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    /// Canonical names of one category, sorted
    #[must_use]
    pub fn list_by_category(&self, category: FunctionCategory) -> Vec<&str> {
        self.functions
            .values()
            .filter(|definition| definition.category == category)
            .map(|definition| definition.name.as_str())
            .collect()
    }

    /// Number of canonical functions
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn table(&self, include: impl Fn(&FunctionDefinition) -> bool) -> FunctionTable {
        let mut table: FunctionTable = self
            .functions
            .values()
            .filter(|definition| include(definition))
            .map(|definition| (definition.name.clone(), definition.callable.clone()))
            .collect();
        for (alias, canonical) in &self.aliases {
            if let Some(definition) = self.functions.get(canonical)
                && include(definition)
            {
                table.insert(alias.clone(), definition.callable.renamed(alias));
            }
        }
        table
    }

    /// Every callable, aliases included
    #[must_use]
    pub fn callables(&self) -> FunctionTable {
        self.table(|_| true)
    }

    /// Callables marked safe, aliases included
    #[must_use]
    pub fn safe_callables(&self) -> FunctionTable {
        self.table(|definition| definition.safe)
    }

    /// Remove a function; removing a canonical name drops its aliases
    ///
    /// Returns `false` when nothing was removed or the registry is locked.
    pub fn unregister(&mut self, name: &str) -> bool {
        if self.locked {
            return false;
        }
        if let Some(definition) = self.functions.remove(name) {
            for alias in &definition.aliases {
                self.aliases.remove(alias);
            }
            return true;
        }
        if let Some(canonical) = self.aliases.remove(name) {
            if let Some(definition) = self.functions.get_mut(&canonical) {
                definition.aliases.retain(|alias| alias != name);
            }
            return true;
        }
        false
    }

    /// Copy every definition of `other` into this registry, `other` winning
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is locked or an alias of `other`
    /// collides with a function name; definitions before the collision are kept
    pub fn merge(&mut self, other: &FunctionRegistry) -> Result<(), FunctionError> {
        if self.locked {
            return Err(FunctionError::new("Function registry is locked"));
        }
        for definition in other.functions.values() {
            self.check_aliases(definition)?;
            self.insert(definition.clone());
        }
        Ok(())
    }

    /// Documentation of every function grouped by category
    #[must_use]
    pub fn to_documentation(&self) -> BTreeMap<FunctionCategory, Vec<FunctionDoc>> {
        let mut docs: BTreeMap<FunctionCategory, Vec<FunctionDoc>> = BTreeMap::new();
        for definition in self.functions.values() {
            docs.entry(definition.category)
                .or_default()
                .push(definition.documentation());
        }
        docs
    }
}

// Argument helpers shared by the builtin modules

pub(crate) fn number_arg(name: &str, value: &Value) -> Result<Number, FunctionError> {
    value.as_number().ok_or_else(|| {
        FunctionError::invalid_argument(
            name,
            format!("expected a number, got {}", value.type_name()),
        )
    })
}

pub(crate) fn float_arg(name: &str, value: &Value) -> Result<f64, FunctionError> {
    number_arg(name, value).map(Number::to_f64)
}

pub(crate) fn int_arg(name: &str, value: &Value) -> Result<i64, FunctionError> {
    value.as_int().ok_or_else(|| {
        FunctionError::invalid_argument(
            name,
            format!("expected an integer, got {}", value.type_name()),
        )
    })
}

pub(crate) fn str_arg<'a>(name: &str, value: &'a Value) -> Result<&'a str, FunctionError> {
    value.as_str().ok_or_else(|| {
        FunctionError::invalid_argument(
            name,
            format!("expected a string, got {}", value.type_name()),
        )
    })
}

/// `str()` of a value with `None` rendered as the empty string
pub(crate) fn text_arg(value: &Value) -> String {
    match value {
        Value::None => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn callable_arg<'a>(name: &str, value: &'a Value) -> Result<&'a Callable, FunctionError> {
    match value {
        Value::Function(callable) => Ok(callable),
        other => Err(FunctionError::invalid_argument(
            name,
            format!("'{}' object is not callable", other.type_name()),
        )),
    }
}

pub(crate) fn usize_to_value(n: usize) -> Value {
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Upper bound on strings and lists generated from a size argument
pub(crate) const MAX_GENERATED_LEN: usize = 1_000_000;

pub(crate) fn generated_len(name: &str, len: usize) -> Result<usize, FunctionError> {
    if len > MAX_GENERATED_LEN {
        return Err(FunctionError::invalid_argument(
            name,
            format!("result of {len} elements exceeds the limit of {MAX_GENERATED_LEN}"),
        ));
    }
    Ok(len)
}
