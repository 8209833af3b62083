//! Dynamic values produced and consumed by expressions
//!
//! Values follow Python conventions where the expression language does:
//! truthiness, cross-type numeric equality (`1 == 1.0 == True`), hashing that
//! agrees with that equality, and `str()` / `repr()` rendering.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::EvaluationError;
use crate::functions::FunctionError;

/// Native function signature shared by registered functions and bound methods
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync>;

/// A value in the expression language
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// `None`
    #[default]
    None,
    /// `True` / `False`
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// Double precision float
    Float(f64),
    /// Unicode string
    Str(String),
    /// Ordered, heterogeneous list
    List(Vec<Value>),
    /// Immutable sequence
    Tuple(Vec<Value>),
    /// Insertion-ordered set of hashable values
    Set(IndexSet<Value>),
    /// Insertion-ordered mapping with hashable keys
    Dict(IndexMap<Value, Value>),
    /// Callable function value
    Function(Callable),
}

/// Type tag of a [`Value`], used for policy allowlists and error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// `None`
    None,
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Float
    Float,
    /// String
    Str,
    /// List
    List,
    /// Tuple
    Tuple,
    /// Set
    Set,
    /// Dictionary
    Dict,
    /// Function
    Function,
}

impl ValueKind {
    /// Python-style type name
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
            Self::Dict => "dict",
            Self::Function => "function",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Named parameter of a callable, used to bind keyword arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Name accepted as a keyword
    pub name: String,
    /// Value used when a later keyword argument skips this slot
    pub default: Option<Value>,
}

impl Param {
    /// Parameters of a `name(a, b=1, *rest) -> ret` signature
    ///
    /// Binding stops at the first variadic (`*rest`) or elided (`...`) entry.
    #[must_use]
    pub fn from_signature(signature: &str) -> Vec<Self> {
        let Some(open) = signature.find('(') else {
            return Vec::new();
        };
        let mut entries = Vec::new();
        let mut current = String::new();
        let mut depth = 0usize;
        let mut quote = None;
        for ch in signature[open + 1..].chars() {
            match (ch, quote) {
                (_, Some(q)) => {
                    if ch == q {
                        quote = None;
                    }
                    current.push(ch);
                }
                ('\'' | '"', None) => {
                    quote = Some(ch);
                    current.push(ch);
                }
                ('(' | '[', None) => {
                    depth += 1;
                    current.push(ch);
                }
                (')', None) if depth == 0 => break,
                (')' | ']', None) => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                (',', None) if depth == 0 => entries.push(std::mem::take(&mut current)),
                _ => current.push(ch),
            }
        }
        entries.push(current);

        entries
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .take_while(|entry| !entry.starts_with('*') && *entry != "...")
            .map(|entry| match entry.split_once('=') {
                Some((name, default)) => Self {
                    name: name.trim().to_string(),
                    default: default_literal(default.trim()),
                },
                None => Self {
                    name: entry.to_string(),
                    default: None,
                },
            })
            .collect()
    }
}

fn default_literal(text: &str) -> Option<Value> {
    match text {
        "None" => Some(Value::None),
        "True" => Some(Value::Bool(true)),
        "False" => Some(Value::Bool(false)),
        _ => {
            if let Ok(i) = text.parse::<i64>() {
                return Some(Value::Int(i));
            }
            if let Ok(f) = text.parse::<f64>() {
                return Some(Value::Float(f));
            }
            let quoted = text
                .strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
                .or_else(|| text.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')));
            quoted.map(|inner| Value::Str(inner.to_string()))
        }
    }
}

/// A named native function with arity bounds
#[derive(Clone)]
pub struct Callable {
    name: Arc<str>,
    min_args: usize,
    max_args: Option<usize>,
    params: Arc<[Param]>,
    func: NativeFn,
}

impl Callable {
    /// Wrap a closure
    pub fn new<F>(name: impl Into<Arc<str>>, min_args: usize, max_args: Option<usize>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Self::from_native(name, min_args, max_args, Arc::new(func))
    }

    /// Wrap an already shared function pointer
    pub fn from_native(
        name: impl Into<Arc<str>>,
        min_args: usize,
        max_args: Option<usize>,
        func: NativeFn,
    ) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
            params: Arc::from(Vec::new()),
            func,
        }
    }

    /// Declare parameter names so calls may pass keyword arguments
    #[must_use]
    pub fn with_params(mut self, params: Vec<Param>) -> Self {
        self.params = Arc::from(params);
        self
    }

    /// Declared parameters, empty when only positional calls are accepted
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Function name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same callable registered under another name
    #[must_use]
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Invoke with arity validation
    pub fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
        if args.len() < self.min_args || self.max_args.is_some_and(|max| args.len() > max) {
            return Err(FunctionError::wrong_arity(
                &self.name,
                self.min_args,
                self.max_args,
                args.len(),
            ));
        }
        (self.func)(args)
    }

    /// Merge keyword arguments into positional slots
    ///
    /// Slots skipped between the last positional argument and a keyword take
    /// the parameter default; a skipped parameter without one is an error.
    pub fn bind(
        &self,
        args: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> Result<Vec<Value>, FunctionError> {
        if keywords.is_empty() {
            return Ok(args);
        }
        if self.params.is_empty() {
            return Err(FunctionError::new(format!(
                "Function '{}' does not accept keyword arguments",
                self.name
            )));
        }
        let positional = args.len();
        let mut slots: Vec<Option<Value>> = args.into_iter().map(Some).collect();
        for (name, value) in keywords {
            let Some(index) = self.params.iter().position(|param| param.name == name) else {
                return Err(FunctionError::new(format!(
                    "Function '{}' got an unexpected keyword argument '{name}'",
                    self.name
                )));
            };
            if index < positional {
                return Err(FunctionError::new(format!(
                    "Function '{}' got multiple values for argument '{name}'",
                    self.name
                )));
            }
            if slots.len() <= index {
                slots.resize(index + 1, None);
            }
            slots[index] = Some(value);
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                let param = self.params.get(index);
                slot.or_else(|| param.and_then(|param| param.default.clone()))
                    .ok_or_else(|| {
                        FunctionError::new(format!(
                            "Function '{}' missing argument '{}'",
                            self.name,
                            param.map_or("", |param| param.name.as_str())
                        ))
                    })
            })
            .collect()
    }

    /// Whether two callables share the same underlying function
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.func).cast::<()>() as usize
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

impl Value {
    /// Type tag
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::None => ValueKind::None,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::List(_) => ValueKind::List,
            Self::Tuple(_) => ValueKind::Tuple,
            Self::Set(_) => ValueKind::Set,
            Self::Dict(_) => ValueKind::Dict,
            Self::Function(_) => ValueKind::Function,
        }
    }

    /// Python-style type name
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    /// Python truthiness
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) | Self::Tuple(items) => !items.is_empty(),
            Self::Set(items) => !items.is_empty(),
            Self::Dict(map) => !map.is_empty(),
            Self::Function(_) => true,
        }
    }

    /// Whether the value may be a set member or dict key
    #[must_use]
    pub fn is_hashable(&self) -> bool {
        match self {
            Self::List(_) | Self::Set(_) | Self::Dict(_) => false,
            Self::Tuple(items) => items.iter().all(Self::is_hashable),
            _ => true,
        }
    }

    /// Fail with a type error unless the value is hashable
    pub fn ensure_hashable(&self) -> Result<(), EvaluationError> {
        if self.is_hashable() {
            Ok(())
        } else {
            Err(EvaluationError::invalid(format!(
                "unhashable type: '{}'",
                self.type_name()
            )))
        }
    }

    /// `true` for `None`
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Borrow as string slice
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view, booleans included
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view of any numeric value
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric view, booleans count as integers
    #[must_use]
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(i64::from(*b))),
            Self::Int(i) => Some(Number::Int(*i)),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Elements produced by iterating the value
    ///
    /// Strings yield one-character strings and dicts yield their keys.
    pub fn iterate(&self) -> Result<Vec<Value>, EvaluationError> {
        match self {
            Self::List(items) | Self::Tuple(items) => Ok(items.clone()),
            Self::Set(items) => Ok(items.iter().cloned().collect()),
            Self::Dict(map) => Ok(map.keys().cloned().collect()),
            Self::Str(s) => Ok(s.chars().map(|c| Self::Str(c.to_string())).collect()),
            other => Err(EvaluationError::invalid(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Number of elements for sized values
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => Some(s.chars().count()),
            Self::List(items) | Self::Tuple(items) => Some(items.len()),
            Self::Set(items) => Some(items.len()),
            Self::Dict(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Ordering used by `<`, `<=`, `>`, `>=` and sorting
    ///
    /// `Ok(None)` means the values are comparable but unordered (NaN).
    pub fn try_cmp(&self, other: &Self) -> Result<Option<Ordering>, EvaluationError> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Ok(Some(a.cmp(b))),
            (Self::List(a), Self::List(b)) | (Self::Tuple(a), Self::Tuple(b)) => {
                for (left, right) in a.iter().zip(b) {
                    if left != right {
                        return left.try_cmp(right);
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
                _ => Err(EvaluationError::invalid(format!(
                    "'<' not supported between instances of '{}' and '{}'",
                    self.type_name(),
                    other.type_name()
                ))),
            },
        }
    }

    /// Python `repr()`
    #[must_use]
    pub fn repr(&self) -> String {
        match self {
            Self::Str(s) => quote_str(s),
            other => other.to_string(),
        }
    }

    /// Build a dict value from string keys
    pub fn dict<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (Self::Str(k.into()), v))
                .collect(),
        )
    }
}

/// Numeric view of a value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Integer (booleans included)
    Int(i64),
    /// Float
    Float(f64),
}

impl Number {
    /// Lossy float conversion
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    fn numeric_eq(self, other: Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(i), Self::Float(f)) | (Self::Float(f), Self::Int(i)) => {
                float_as_integer(f) == Some(i)
            }
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }
}

/// Exact integer value of an integral float within `i64` range
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn float_as_integer(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => a.len() == b.len() && a.iter().all(|v| b.contains(v)),
            (Self::Dict(a), Self::Dict(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|o| o == v))
            }
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.numeric_eq(b),
                _ => false,
            },
        }
    }
}

// NaN is the one value that is not equal to itself; sets and dicts tolerate that.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        fn integer<H: Hasher>(i: i64, state: &mut H) {
            1u8.hash(state);
            i.hash(state);
        }

        match self {
            Self::None => 0u8.hash(state),
            Self::Bool(b) => integer(i64::from(*b), state),
            Self::Int(i) => integer(*i, state),
            Self::Float(f) => match float_as_integer(*f) {
                Some(i) => integer(i, state),
                None => {
                    2u8.hash(state);
                    f.to_bits().hash(state);
                }
            },
            Self::Str(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Self::Tuple(items) => {
                4u8.hash(state);
                items.len().hash(state);
                for item in items {
                    item.hash(state);
                }
            }
            // Unhashable containers only reach a hasher through lookups; shape is enough.
            Self::List(items) => {
                5u8.hash(state);
                items.len().hash(state);
            }
            Self::Set(items) => {
                6u8.hash(state);
                items.len().hash(state);
            }
            Self::Dict(map) => {
                7u8.hash(state);
                map.len().hash(state);
            }
            Self::Function(func) => {
                8u8.hash(state);
                func.id().hash(state);
            }
        }
    }
}

/// Python float formatting: shortest round-trip digits, `.0` on integral
/// values, exponent notation outside `[1e-4, 1e16)`
#[must_use]
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let rendered = format!("{f:e}");
        if let Some((mantissa, exponent)) = rendered.split_once('e') {
            let exponent: i32 = exponent.parse().unwrap_or_default();
            let sign = if exponent < 0 { '-' } else { '+' };
            return format!("{mantissa}e{sign}{:02}", exponent.abs());
        }
        return rendered;
    }
    let rendered = f.to_string();
    if rendered.contains('.') {
        rendered
    } else {
        format!("{rendered}.0")
    }
}

fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn write_items<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = &'a Value>,
) -> fmt::Result {
    for (index, item) in items.into_iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        f.write_str(&item.repr())?;
    }
    Ok(())
}

/// Python `str()`
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => f.write_str(&format_float(*v)),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::Set(items) if items.is_empty() => f.write_str("set()"),
            Self::Set(items) => {
                f.write_str("{")?;
                write_items(f, items)?;
                f.write_str("}")
            }
            Self::Dict(map) => {
                f.write_str("{")?;
                for (index, (key, value)) in map.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key.repr(), value.repr())?;
                }
                f.write_str("}")
            }
            Self::Function(func) => write!(f, "<function {}>", func.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(value: HashMap<String, Value>) -> Self {
        Self::dict(value)
    }
}

impl From<serde_json::Value> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::Float(u as f64)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::dict(map.into_iter().map(|(k, v)| (k, Self::from(v))))
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::None => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(i) => Self::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Self::Null, Self::Number),
            Value::Str(s) => Self::String(s.clone()),
            Value::List(items) | Value::Tuple(items) => {
                Self::Array(items.iter().map(Self::from).collect())
            }
            Value::Set(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Dict(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Value::Str(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (key, Self::from(v))
                    })
                    .collect(),
            ),
            Value::Function(func) => Self::String(format!("<function {}>", func.name())),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_json::Value::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}
