//! Path access into evaluation contexts
//!
//! A [`ContextPath`] addresses a value nested inside a context, for example
//! `users[0].address.city` or `data['key with spaces']`. Lookups of missing
//! paths yield `None`; only writes through a non-container fail.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

use crate::value::Value;

/// Name to value bindings an expression is evaluated against
pub type Context = HashMap<String, Value>;

/// Largest gap a write may open at the end of a list
const MAX_LIST_EXTENSION: usize = 100_000;

/// Errors raised by context path parsing and writes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path text is not a valid path
    #[error("Invalid path '{path}' at offset {position}: {reason}")]
    Malformed {
        /// Path text
        path: String,
        /// Byte offset of the problem
        position: usize,
        /// What was expected
        reason: String,
    },

    /// A write had to traverse a value that cannot hold the next segment
    #[error("Cannot set '{path}': '{segment}' needs a container, found {type_name}")]
    NotAContainer {
        /// Path text
        path: String,
        /// Segment that could not be applied
        segment: String,
        /// Type found instead
        type_name: String,
    },

    /// A list index is out of range and cannot be created
    #[error("Cannot set '{path}': index {index} is out of range")]
    IndexOutOfRange {
        /// Path text
        path: String,
        /// Offending index
        index: i64,
    },
}

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Dict key, from `.name` or `['name']`
    Key(String),
    /// Sequence index, from `[n]`; negative counts from the end
    Index(i64),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Parsed path into a context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextPath {
    segments: Vec<PathSegment>,
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

impl ContextPath {
    /// Parse `a.b[0]['c']`
    ///
    /// # Errors
    ///
    /// Returns [`PathError::Malformed`] for empty paths, a leading index and
    /// unterminated or invalid brackets
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let malformed = |position: usize, reason: &str| PathError::Malformed {
            path: path.to_string(),
            position,
            reason: reason.to_string(),
        };
        let bytes = path.as_bytes();
        let mut segments = Vec::new();
        let mut position = 0;

        while position < bytes.len() {
            match bytes[position] {
                b'[' => {
                    let close = path[position..]
                        .find(']')
                        .map(|offset| position + offset)
                        .ok_or_else(|| malformed(position, "unterminated '['"))?;
                    let inner = path[position + 1..close].trim();
                    let quoted = inner.len() >= 2
                        && matches!(inner.as_bytes()[0], b'\'' | b'"')
                        && inner.as_bytes()[inner.len() - 1] == inner.as_bytes()[0];
                    let segment = if quoted {
                        PathSegment::Key(inner[1..inner.len() - 1].to_string())
                    } else {
                        inner
                            .parse::<i64>()
                            .map(PathSegment::Index)
                            .map_err(|_| malformed(position + 1, "expected an integer or a quoted key"))?
                    };
                    segments.push(segment);
                    position = close + 1;
                }
                b'.' if !segments.is_empty() => {
                    position += 1;
                    let end = path[position..]
                        .find(['.', '['])
                        .map_or(bytes.len(), |offset| position + offset);
                    let key = &path[position..end];
                    if !is_identifier(key) {
                        return Err(malformed(position, "expected a name after '.'"));
                    }
                    segments.push(PathSegment::Key(key.to_string()));
                    position = end;
                }
                _ if segments.is_empty() => {
                    let end = path.find(['.', '[']).unwrap_or(bytes.len());
                    let key = &path[..end];
                    if !is_identifier(key) {
                        return Err(malformed(0, "expected a name"));
                    }
                    segments.push(PathSegment::Key(key.to_string()));
                    position = end;
                }
                _ => return Err(malformed(position, "expected '.' or '['")),
            }
        }

        match segments.first() {
            None => Err(malformed(0, "empty path")),
            Some(PathSegment::Index(_)) => Err(malformed(0, "path must start with a name")),
            Some(PathSegment::Key(_)) => Ok(Self { segments }),
        }
    }

    /// Path made of plain keys, without parsing
    ///
    /// Returns `None` for an empty key list.
    #[must_use]
    pub fn from_keys<I, K>(keys: I) -> Option<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let segments: Vec<PathSegment> = keys
            .into_iter()
            .map(|key| PathSegment::Key(key.into()))
            .collect();
        (!segments.is_empty()).then_some(Self { segments })
    }

    /// Segments, first one always a key
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    fn split(&self) -> (&str, &[PathSegment]) {
        match self.segments.split_first() {
            Some((PathSegment::Key(root), rest)) => (root.as_str(), rest),
            // parse and from_keys never build other shapes
            _ => ("", &[]),
        }
    }

    /// Value at the path, if every step exists
    #[must_use]
    pub fn resolve<'c>(&self, context: &'c Context) -> Option<&'c Value> {
        let (root, rest) = self.split();
        rest.iter()
            .try_fold(context.get(root)?, |current, segment| step(current, segment))
    }

    /// Value at the path, or `default`
    #[must_use]
    pub fn resolve_or(&self, context: &Context, default: Value) -> Value {
        self.resolve(context).cloned().unwrap_or(default)
    }

    /// Whether the path exists
    #[must_use]
    pub fn has(&self, context: &Context) -> bool {
        self.resolve(context).is_some()
    }

    /// Write `value` at the path, creating missing dicts and lists on the way
    ///
    /// # Errors
    ///
    /// Fails when an existing value on the way is not a container of the right
    /// kind, or a list index cannot be created
    pub fn set(&self, context: &mut Context, value: Value) -> Result<(), PathError> {
        let (root, rest) = self.split();
        let slot = context.entry(root.to_string()).or_default();
        self.set_in(slot, rest, value)
    }

    fn set_in(&self, current: &mut Value, segments: &[PathSegment], value: Value) -> Result<(), PathError> {
        let Some((segment, rest)) = segments.split_first() else {
            *current = value;
            return Ok(());
        };
        if current.is_none() {
            *current = match segment {
                PathSegment::Key(_) => Value::Dict(IndexMap::new()),
                PathSegment::Index(_) => Value::List(Vec::new()),
            };
        }
        let slot = match (current, segment) {
            (Value::Dict(map), PathSegment::Key(key)) => {
                map.entry(Value::Str(key.clone())).or_default()
            }
            (Value::Dict(map), PathSegment::Index(index)) => {
                map.entry(Value::Int(*index)).or_default()
            }
            (Value::List(items), PathSegment::Index(index)) => {
                let position = self.list_slot(items.len(), *index)?;
                if position >= items.len() {
                    items.resize(position + 1, Value::None);
                }
                &mut items[position]
            }
            (other, segment) => {
                return Err(PathError::NotAContainer {
                    path: self.to_string(),
                    segment: segment.to_string(),
                    type_name: other.type_name().to_string(),
                });
            }
        };
        self.set_in(slot, rest, value)
    }

    fn list_slot(&self, len: usize, index: i64) -> Result<usize, PathError> {
        let out_of_range = || PathError::IndexOutOfRange {
            path: self.to_string(),
            index,
        };
        let position = if index < 0 {
            let back = usize::try_from(index.unsigned_abs()).map_err(|_| out_of_range())?;
            len.checked_sub(back).ok_or_else(out_of_range)?
        } else {
            usize::try_from(index).map_err(|_| out_of_range())?
        };
        if position > len.saturating_add(MAX_LIST_EXTENSION) {
            return Err(out_of_range());
        }
        Ok(position)
    }

    /// Remove and return the value at the path; missing paths are left alone
    pub fn delete(&self, context: &mut Context) -> Option<Value> {
        let (root, rest) = self.split();
        let Some((last, parents)) = rest.split_last() else {
            return context.remove(root);
        };
        let parent = parents
            .iter()
            .try_fold(context.get_mut(root)?, |current, segment| step_mut(current, segment))?;
        match (parent, last) {
            (Value::Dict(map), PathSegment::Key(key)) => map.shift_remove(&Value::Str(key.clone())),
            (Value::Dict(map), PathSegment::Index(index)) => map.shift_remove(&Value::Int(*index)),
            (Value::List(items), PathSegment::Index(index)) => {
                let position = normalize(items.len(), *index)?;
                Some(items.remove(position))
            }
            _ => None,
        }
    }
}

impl FromStr for ContextPath {
    type Err = PathError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        Self::parse(path)
    }
}

impl fmt::Display for ContextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if position == 0 => f.write_str(key)?,
                PathSegment::Key(key) if is_identifier(key) => write!(f, ".{key}")?,
                PathSegment::Key(key) => write!(f, "[{}]", Value::Str(key.clone()).repr())?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

fn normalize(len: usize, index: i64) -> Option<usize> {
    let position = if index < 0 {
        len.checked_sub(usize::try_from(index.unsigned_abs()).ok()?)?
    } else {
        usize::try_from(index).ok()?
    };
    (position < len).then_some(position)
}

fn step<'c>(current: &'c Value, segment: &PathSegment) -> Option<&'c Value> {
    match (current, segment) {
        (Value::Dict(map), PathSegment::Key(key)) => map.get(&Value::Str(key.clone())),
        (Value::Dict(map), PathSegment::Index(index)) => map.get(&Value::Int(*index)),
        (Value::List(items) | Value::Tuple(items), PathSegment::Index(index)) => {
            items.get(normalize(items.len(), *index)?)
        }
        _ => None,
    }
}

fn step_mut<'c>(current: &'c mut Value, segment: &PathSegment) -> Option<&'c mut Value> {
    match (current, segment) {
        (Value::Dict(map), PathSegment::Key(key)) => map.get_mut(&Value::Str(key.clone())),
        (Value::Dict(map), PathSegment::Index(index)) => map.get_mut(&Value::Int(*index)),
        (Value::List(items), PathSegment::Index(index)) => {
            let position = normalize(items.len(), *index)?;
            items.get_mut(position)
        }
        _ => None,
    }
}

/// Deep-merge `updates` into `base`; nested dicts merge, everything else is replaced
pub fn merge(base: &mut Context, updates: Context) {
    for (key, value) in updates {
        match (base.get_mut(&key), value) {
            (Some(Value::Dict(existing)), Value::Dict(incoming)) => merge_dicts(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn merge_dicts(base: &mut IndexMap<Value, Value>, updates: IndexMap<Value, Value>) {
    for (key, value) in updates {
        match (base.get_mut(&key), value) {
            (Some(Value::Dict(existing)), Value::Dict(incoming)) => merge_dicts(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Flatten nested dicts into dotted keys; lists are kept as leaves
#[must_use]
pub fn flatten(context: &Context) -> BTreeMap<String, Value> {
    let mut flat = BTreeMap::new();
    for (key, value) in context {
        flatten_into(&mut flat, key.clone(), value);
    }
    flat
}

fn flatten_into(flat: &mut BTreeMap<String, Value>, prefix: String, value: &Value) {
    match value {
        Value::Dict(map) => {
            for (key, nested) in map {
                let key = match key {
                    Value::Str(key) => key.clone(),
                    other => other.to_string(),
                };
                flatten_into(flat, format!("{prefix}.{key}"), nested);
            }
        }
        leaf => {
            flat.insert(prefix, leaf.clone());
        }
    }
}

/// Rebuild nested dicts from dotted keys
///
/// # Errors
///
/// Fails when one key is a prefix of another, e.g. `a` and `a.b`, and the
/// shorter one holds a non-dict value
pub fn unflatten<'k, I>(flat: I) -> Result<Context, PathError>
where
    I: IntoIterator<Item = (&'k String, &'k Value)>,
{
    let mut context = Context::new();
    for (key, value) in flat {
        if let Some(path) = ContextPath::from_keys(key.split('.')) {
            path.set(&mut context, value.clone())?;
        }
    }
    Ok(context)
}

/// Context from a JSON object; `None` for any other JSON value
#[must_use]
pub fn context_from_json(json: serde_json::Value) -> Option<Context> {
    match json {
        serde_json::Value::Object(map) => Some(
            map.into_iter()
                .map(|(key, value)| (key, Value::from(value)))
                .collect(),
        ),
        _ => None,
    }
}
