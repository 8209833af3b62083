//! Methods callable on values (`"a".upper()`, `d.get(k)`, ...)
//!
//! Every method here is pure: containers are never mutated in place, so a
//! context handed to the engine is observably read-only. Access is gated by
//! [`SandboxPolicy::allows_method`].

use indexmap::IndexSet;

use crate::error::EvaluationError;
use crate::functions::FunctionError;
use crate::operators::Limits;
use crate::sandbox::SandboxPolicy;
use crate::value::{Callable, Value, ValueKind, format_float};

const STR: &[&str] = &[
    "upper",
    "lower",
    "strip",
    "lstrip",
    "rstrip",
    "split",
    "join",
    "replace",
    "startswith",
    "endswith",
    "find",
    "rfind",
    "index",
    "rindex",
    "count",
    "isalpha",
    "isdigit",
    "isalnum",
    "isspace",
    "isupper",
    "islower",
    "title",
    "capitalize",
    "swapcase",
    "center",
    "ljust",
    "rjust",
    "zfill",
];
const LIST: &[&str] = &["index", "count", "copy"];
const TUPLE: &[&str] = &["index", "count"];
const DICT: &[&str] = &["keys", "values", "items", "get", "copy"];
const SET: &[&str] = &[
    "union",
    "intersection",
    "difference",
    "symmetric_difference",
    "issubset",
    "issuperset",
    "isdisjoint",
    "copy",
];
const INT: &[&str] = &["bit_length"];
const FLOAT: &[&str] = &["is_integer"];

/// Methods implemented for a value type
#[must_use]
pub fn method_names(kind: ValueKind) -> &'static [&'static str] {
    match kind {
        ValueKind::Str => STR,
        ValueKind::List => LIST,
        ValueKind::Tuple => TUPLE,
        ValueKind::Dict => DICT,
        ValueKind::Set => SET,
        ValueKind::Int => INT,
        ValueKind::Float => FLOAT,
        _ => &[],
    }
}

fn check_access(receiver: &Value, name: &str, policy: &SandboxPolicy) -> Result<(), EvaluationError> {
    let kind = receiver.kind();
    if !method_names(kind).contains(&name) {
        return Err(EvaluationError::Attribute {
            type_name: receiver.type_name().to_string(),
            attr: name.to_string(),
        });
    }
    if !policy.allows_method(kind, name) {
        return Err(EvaluationError::ForbiddenAttribute {
            type_name: receiver.type_name().to_string(),
            attr: name.to_string(),
        });
    }
    Ok(())
}

/// Call `receiver.name(*args)`
pub fn call_method(
    receiver: &Value,
    name: &str,
    args: &[Value],
    policy: &SandboxPolicy,
) -> Result<Value, EvaluationError> {
    check_access(receiver, name, policy)?;
    let limits = Limits::from_policy(policy);
    let result = dispatch(receiver, name, args, &limits)?;
    limits.check_value(&result)?;
    Ok(result)
}

/// `receiver.name` without a call, as a function value
pub fn bound_method(
    receiver: &Value,
    name: &str,
    policy: &SandboxPolicy,
) -> Result<Value, EvaluationError> {
    check_access(receiver, name, policy)?;
    let limits = Limits::from_policy(policy);
    let bound_receiver = receiver.clone();
    let method = name.to_string();
    let qualified = format!("{}.{name}", receiver.type_name());
    Ok(Value::Function(Callable::new(qualified, 0, None, move |args| {
        let result = dispatch(&bound_receiver, &method, args, &limits)?;
        limits.check_value(&result).map_err(FunctionError::from)?;
        Ok(result)
    })))
}

fn arity(
    receiver: &Value,
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), EvaluationError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("exactly {min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(EvaluationError::invalid(format!(
            "{}.{name}() takes {expected} arguments ({} given)",
            receiver.type_name(),
            args.len()
        )));
    }
    Ok(())
}

fn str_arg<'a>(method: &str, value: &'a Value) -> Result<&'a str, EvaluationError> {
    value.as_str().ok_or_else(|| {
        EvaluationError::invalid(format!(
            "{method}() argument must be str, not {}",
            value.type_name()
        ))
    })
}

fn int_arg(method: &str, value: &Value) -> Result<i64, EvaluationError> {
    value.as_int().ok_or_else(|| {
        EvaluationError::invalid(format!(
            "{method}() argument must be int, not {}",
            value.type_name()
        ))
    })
}

fn width_arg(method: &str, value: &Value, limits: &Limits) -> Result<usize, EvaluationError> {
    let width = usize::try_from(int_arg(method, value)?.max(0)).unwrap_or(0);
    limits.check_string(width)?;
    Ok(width)
}

fn dispatch(
    receiver: &Value,
    name: &str,
    args: &[Value],
    limits: &Limits,
) -> Result<Value, EvaluationError> {
    match receiver {
        Value::Str(s) => str_method(receiver, s, name, args, limits),
        Value::List(items) | Value::Tuple(items) => sequence_method(receiver, items, name, args),
        Value::Dict(map) => match name {
            "keys" => {
                arity(receiver, name, args, 0, 0)?;
                Ok(Value::List(map.keys().cloned().collect()))
            }
            "values" => {
                arity(receiver, name, args, 0, 0)?;
                Ok(Value::List(map.values().cloned().collect()))
            }
            "items" => {
                arity(receiver, name, args, 0, 0)?;
                Ok(Value::List(
                    map.iter()
                        .map(|(k, v)| Value::Tuple(vec![k.clone(), v.clone()]))
                        .collect(),
                ))
            }
            "get" => {
                arity(receiver, name, args, 1, 2)?;
                args[0].ensure_hashable()?;
                Ok(map
                    .get(&args[0])
                    .or_else(|| args.get(1))
                    .cloned()
                    .unwrap_or_default())
            }
            "copy" => {
                arity(receiver, name, args, 0, 0)?;
                Ok(receiver.clone())
            }
            _ => Err(no_attribute(receiver, name)),
        },
        Value::Set(items) => set_method(receiver, items, name, args, limits),
        Value::Int(i) if name == "bit_length" => {
            arity(receiver, name, args, 0, 0)?;
            Ok(Value::Int(i64::from(64 - i.unsigned_abs().leading_zeros())))
        }
        Value::Float(f) if name == "is_integer" => {
            arity(receiver, name, args, 0, 0)?;
            Ok(Value::Bool(f.is_finite() && f.fract() == 0.0))
        }
        _ => Err(no_attribute(receiver, name)),
    }
}

fn no_attribute(receiver: &Value, name: &str) -> EvaluationError {
    EvaluationError::Attribute {
        type_name: receiver.type_name().to_string(),
        attr: name.to_string(),
    }
}

fn char_index(s: &str, byte_offset: usize) -> i64 {
    i64::try_from(s[..byte_offset].chars().count()).unwrap_or(i64::MAX)
}

fn str_method(
    receiver: &Value,
    s: &str,
    name: &str,
    args: &[Value],
    limits: &Limits,
) -> Result<Value, EvaluationError> {
    let text = |value: String| Ok(Value::Str(value));
    match name {
        "upper" | "lower" | "title" | "capitalize" | "swapcase" => {
            arity(receiver, name, args, 0, 0)?;
            text(match name {
                "upper" => s.to_uppercase(),
                "lower" => s.to_lowercase(),
                "title" => title_case(s),
                "capitalize" => capitalize(s),
                _ => s
                    .chars()
                    .flat_map(|c| {
                        if c.is_uppercase() {
                            c.to_lowercase().collect::<Vec<_>>()
                        } else {
                            c.to_uppercase().collect::<Vec<_>>()
                        }
                    })
                    .collect(),
            })
        }
        "strip" | "lstrip" | "rstrip" => {
            arity(receiver, name, args, 0, 1)?;
            let chars: Option<Vec<char>> = match args.first() {
                None | Some(Value::None) => None,
                Some(value) => Some(str_arg(name, value)?.chars().collect()),
            };
            let strip = |c: char| chars.as_ref().map_or(c.is_whitespace(), |set| set.contains(&c));
            text(match name {
                "strip" => s.trim_matches(strip).to_string(),
                "lstrip" => s.trim_start_matches(strip).to_string(),
                _ => s.trim_end_matches(strip).to_string(),
            })
        }
        "split" => {
            arity(receiver, name, args, 0, 2)?;
            let maxsplit = match args.get(1) {
                Some(value) => usize::try_from(int_arg(name, value)?).ok(),
                None => None,
            };
            let parts = match args.first() {
                None | Some(Value::None) => split_whitespace(s, maxsplit),
                Some(value) => {
                    let separator = str_arg(name, value)?;
                    if separator.is_empty() {
                        return Err(EvaluationError::invalid("empty separator"));
                    }
                    match maxsplit {
                        Some(max) => s.splitn(max + 1, separator).map(str::to_string).collect(),
                        None => s.split(separator).map(str::to_string).collect(),
                    }
                }
            };
            limits.check_collection(parts.len())?;
            Ok(Value::List(parts.into_iter().map(Value::Str).collect()))
        }
        "join" => {
            arity(receiver, name, args, 1, 1)?;
            let pieces = args[0]
                .iterate()?
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        EvaluationError::invalid(format!(
                            "sequence item: expected str instance, {} found",
                            item.type_name()
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let total: usize = pieces.iter().map(|p| p.chars().count()).sum::<usize>()
                + s.chars().count() * pieces.len().saturating_sub(1);
            limits.check_string(total)?;
            text(pieces.join(s))
        }
        "replace" => {
            arity(receiver, name, args, 2, 3)?;
            let old = str_arg(name, &args[0])?;
            let new = str_arg(name, &args[1])?;
            let occurrences = if old.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(old).count()
            };
            let count = match args.get(2) {
                Some(value) => usize::try_from(int_arg(name, value)?).unwrap_or(occurrences),
                None => occurrences,
            }
            .min(occurrences);
            let grown = new.chars().count().saturating_sub(old.chars().count());
            limits.check_string(s.chars().count() + grown.saturating_mul(count))?;
            text(s.replacen(old, new, count))
        }
        "startswith" | "endswith" => {
            arity(receiver, name, args, 1, 1)?;
            let candidates: Vec<&str> = match &args[0] {
                Value::Tuple(items) => items
                    .iter()
                    .map(|item| str_arg(name, item))
                    .collect::<Result<_, _>>()?,
                other => vec![str_arg(name, other)?],
            };
            Ok(Value::Bool(candidates.iter().any(|candidate| {
                if name == "startswith" {
                    s.starts_with(candidate)
                } else {
                    s.ends_with(candidate)
                }
            })))
        }
        "find" | "rfind" | "index" | "rindex" => {
            arity(receiver, name, args, 1, 1)?;
            let needle = str_arg(name, &args[0])?;
            let found = if name.starts_with('r') {
                s.rfind(needle)
            } else {
                s.find(needle)
            };
            match found {
                Some(offset) => Ok(Value::Int(char_index(s, offset))),
                None if name.ends_with("find") => Ok(Value::Int(-1)),
                None => Err(EvaluationError::invalid("substring not found")),
            }
        }
        "count" => {
            arity(receiver, name, args, 1, 1)?;
            let needle = str_arg(name, &args[0])?;
            let count = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
        }
        "isalpha" | "isdigit" | "isalnum" | "isspace" => {
            arity(receiver, name, args, 0, 0)?;
            let test: fn(char) -> bool = match name {
                "isalpha" => char::is_alphabetic,
                "isdigit" => char::is_numeric,
                "isalnum" => char::is_alphanumeric,
                _ => char::is_whitespace,
            };
            Ok(Value::Bool(!s.is_empty() && s.chars().all(test)))
        }
        "isupper" => {
            arity(receiver, name, args, 0, 0)?;
            Ok(Value::Bool(
                s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase),
            ))
        }
        "islower" => {
            arity(receiver, name, args, 0, 0)?;
            Ok(Value::Bool(
                s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase),
            ))
        }
        "center" | "ljust" | "rjust" => {
            arity(receiver, name, args, 1, 2)?;
            let width = width_arg(name, &args[0], limits)?;
            let fill = match args.get(1) {
                Some(value) => {
                    let fill = str_arg(name, value)?;
                    let mut chars = fill.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => c,
                        _ => {
                            return Err(EvaluationError::invalid(
                                "The fill character must be exactly one character long",
                            ));
                        }
                    }
                }
                None => ' ',
            };
            let align = match name {
                "center" => '^',
                "ljust" => '<',
                _ => '>',
            };
            text(pad(s, width, fill, align))
        }
        "zfill" => {
            arity(receiver, name, args, 1, 1)?;
            let width = width_arg(name, &args[0], limits)?;
            let (sign, digits) = match s.chars().next() {
                Some(c @ ('+' | '-')) => (c.to_string(), &s[1..]),
                _ => (String::new(), s),
            };
            let len = s.chars().count();
            if len >= width {
                return text(s.to_string());
            }
            text(format!("{sign}{}{digits}", "0".repeat(width - len)))
        }
        _ => Err(no_attribute(receiver, name)),
    }
}

fn split_whitespace(s: &str, maxsplit: Option<usize>) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if maxsplit.is_some_and(|max| parts.len() == max) {
            parts.push(rest.to_string());
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(rest[..end].to_string());
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest.to_string());
                break;
            }
        }
    }
    parts
}

pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_cased = false;
    for c in s.chars() {
        if previous_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_cased = c.is_alphabetic();
    }
    out
}

pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Pad `s` to `width` characters; `align` is one of `<`, `>`, `^`
pub(crate) fn pad(s: &str, width: usize, fill: char, align: char) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let margin = width - len;
    let left = match align {
        '<' => 0,
        '>' => margin,
        _ => margin / 2 + (margin & width & 1),
    };
    let fill_str = |n: usize| std::iter::repeat_n(fill, n).collect::<String>();
    format!("{}{s}{}", fill_str(left), fill_str(margin - left))
}

fn sequence_method(
    receiver: &Value,
    items: &[Value],
    name: &str,
    args: &[Value],
) -> Result<Value, EvaluationError> {
    match name {
        "index" => {
            arity(receiver, name, args, 1, 1)?;
            items
                .iter()
                .position(|item| item == &args[0])
                .map(|i| Value::Int(i64::try_from(i).unwrap_or(i64::MAX)))
                .ok_or_else(|| {
                    EvaluationError::invalid(format!(
                        "{} is not in {}",
                        args[0].repr(),
                        receiver.type_name()
                    ))
                })
        }
        "count" => {
            arity(receiver, name, args, 1, 1)?;
            let count = items.iter().filter(|item| *item == &args[0]).count();
            Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
        }
        "copy" if matches!(receiver, Value::List(_)) => {
            arity(receiver, name, args, 0, 0)?;
            Ok(receiver.clone())
        }
        _ => Err(no_attribute(receiver, name)),
    }
}

fn to_set(value: &Value) -> Result<IndexSet<Value>, EvaluationError> {
    let items = value.iterate()?;
    for item in &items {
        item.ensure_hashable()?;
    }
    Ok(items.into_iter().collect())
}

fn set_method(
    receiver: &Value,
    items: &IndexSet<Value>,
    name: &str,
    args: &[Value],
    limits: &Limits,
) -> Result<Value, EvaluationError> {
    match name {
        "union" | "intersection" | "difference" | "symmetric_difference" => {
            let mut result = items.clone();
            for other in args {
                let other = to_set(other)?;
                result = match name {
                    "union" => result.union(&other).cloned().collect(),
                    "intersection" => result.intersection(&other).cloned().collect(),
                    "difference" => result.difference(&other).cloned().collect(),
                    _ => result.symmetric_difference(&other).cloned().collect(),
                };
                limits.check_collection(result.len())?;
            }
            Ok(Value::Set(result))
        }
        "issubset" | "issuperset" | "isdisjoint" => {
            arity(receiver, name, args, 1, 1)?;
            let other = to_set(&args[0])?;
            Ok(Value::Bool(match name {
                "issubset" => items.is_subset(&other),
                "issuperset" => items.is_superset(&other),
                _ => items.is_disjoint(&other),
            }))
        }
        "copy" => {
            arity(receiver, name, args, 0, 0)?;
            Ok(receiver.clone())
        }
        _ => Err(no_attribute(receiver, name)),
    }
}

/// Largest precision accepted for numeric format codes
const MAX_FORMAT_PRECISION: usize = 10_000;

/// Parsed `[[fill]align][sign][#][0][width][,][.precision][type]`
#[derive(Debug, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    /// `#`: radix prefix for `b`, `o`, `x` and `X`
    alternate: bool,
    zero: bool,
    width: usize,
    grouping: bool,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> Result<Self, EvaluationError> {
        let invalid = || EvaluationError::invalid(format!("Invalid format specifier '{spec}'"));
        let chars: Vec<char> = spec.chars().collect();
        let mut parsed = Self::default();
        let mut i = 0;

        let is_align = |c: &char| matches!(c, '<' | '>' | '^' | '=');
        if chars.get(1).is_some_and(is_align) {
            parsed.fill = chars.first().copied();
            parsed.align = chars.get(1).copied();
            i = 2;
        } else if chars.first().is_some_and(is_align) {
            parsed.align = chars.first().copied();
            i = 1;
        }
        if let Some(c @ ('+' | '-' | ' ')) = chars.get(i) {
            parsed.sign = Some(*c);
            i += 1;
        }
        if chars.get(i) == Some(&'#') {
            parsed.alternate = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            parsed.zero = true;
            i += 1;
        }
        let start = i;
        while chars.get(i).is_some_and(char::is_ascii_digit) {
            i += 1;
        }
        if i > start {
            let digits: String = chars[start..i].iter().collect();
            parsed.width = digits.parse().map_err(|_| invalid())?;
        }
        if chars.get(i) == Some(&',') {
            parsed.grouping = true;
            i += 1;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(char::is_ascii_digit) {
                i += 1;
            }
            let digits: String = chars[start..i].iter().collect();
            parsed.precision = Some(digits.parse().map_err(|_| invalid())?);
        }
        match &chars[i..] {
            [] => {}
            [c] if "bcdeEfFgGosxX%".contains(*c) => parsed.kind = Some(*c),
            _ => return Err(invalid()),
        }
        Ok(parsed)
    }
}

/// Python `format(value, spec)` for f-string fields
pub fn format_with_spec(
    value: &Value,
    spec: &str,
    limits: &Limits,
) -> Result<String, EvaluationError> {
    if spec.is_empty() {
        return Ok(value.to_string());
    }
    let spec = FormatSpec::parse(spec)?;
    limits.check_string(spec.width)?;

    let unsupported = || {
        EvaluationError::invalid(format!(
            "Unknown format code '{}' for object of type '{}'",
            spec.kind.unwrap_or(' '),
            value.type_name()
        ))
    };

    let (body, numeric) = match value {
        Value::Str(s) => {
            if !matches!(spec.kind, None | Some('s')) {
                return Err(unsupported());
            }
            let body = match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s.clone(),
            };
            (body, false)
        }
        Value::Int(_) | Value::Bool(_) | Value::Float(_) => {
            if let Some(precision) = spec.precision {
                limits.check_string(precision)?;
                if precision > MAX_FORMAT_PRECISION {
                    return Err(EvaluationError::invalid(format!(
                        "Format precision {precision} exceeds maximum of {MAX_FORMAT_PRECISION}"
                    )));
                }
            }
            (format_number(value, &spec).ok_or_else(unsupported)?, true)
        }
        other => {
            if spec.kind.is_some() {
                return Err(unsupported());
            }
            (other.to_string(), false)
        }
    };

    let (fill, align) = match (spec.fill, spec.align) {
        (fill, Some(align)) => (fill.unwrap_or(' '), align),
        (_, None) if spec.zero && numeric => ('0', '='),
        (_, None) => (' ', if numeric { '>' } else { '<' }),
    };
    if align == '=' {
        // padding goes between the sign and radix prefix and the digits
        let mut head = usize::from(body.starts_with(['+', '-', ' ']));
        if numeric && spec.alternate && matches!(spec.kind, Some('b' | 'o' | 'x' | 'X')) {
            head += 2;
        }
        let (head, digits) = body.split_at(head.min(body.len()));
        let inner = spec.width.saturating_sub(head.chars().count());
        return Ok(format!("{head}{}", pad(digits, inner, fill, '>')));
    }
    Ok(pad(&body, spec.width, fill, align))
}

fn format_number(value: &Value, spec: &FormatSpec) -> Option<String> {
    let (negative, magnitude) = match spec.kind {
        Some('b' | 'o' | 'x' | 'X' | 'c' | 'd') | None if !matches!(value, Value::Float(_)) => {
            let i = value.as_int()?;
            let prefix = match spec.kind {
                Some('b') if spec.alternate => "0b",
                Some('o') if spec.alternate => "0o",
                Some('x') if spec.alternate => "0x",
                Some('X') if spec.alternate => "0X",
                _ => "",
            };
            let digits = match spec.kind {
                Some('b') => format!("{prefix}{:b}", i.unsigned_abs()),
                Some('o') => format!("{prefix}{:o}", i.unsigned_abs()),
                Some('x') => format!("{prefix}{:x}", i.unsigned_abs()),
                Some('X') => format!("{prefix}{:X}", i.unsigned_abs()),
                Some('c') => {
                    return u32::try_from(i)
                        .ok()
                        .and_then(char::from_u32)
                        .map(|c| c.to_string());
                }
                _ => group(&i.unsigned_abs().to_string(), spec.grouping),
            };
            (i < 0, digits)
        }
        Some('b' | 'o' | 'x' | 'X' | 'c' | 'd') => return None,
        kind => {
            let f = value.as_float()?;
            let body = match kind {
                Some('f' | 'F') => format!("{:.*}", spec.precision.unwrap_or(6), f.abs()),
                Some('e' | 'E') => {
                    let rendered = scientific(f.abs(), spec.precision.unwrap_or(6));
                    if kind == Some('E') {
                        rendered.to_uppercase()
                    } else {
                        rendered
                    }
                }
                Some('%') => format!("{:.*}%", spec.precision.unwrap_or(6), f.abs() * 100.0),
                Some('g' | 'G') => general(f.abs(), spec.precision.unwrap_or(6)),
                _ => match spec.precision {
                    Some(p) => general(f.abs(), p),
                    None => format_float(f.abs()),
                },
            };
            let body = if f.is_finite() && spec.grouping {
                let (int_part, rest) = body
                    .find(|c: char| !c.is_ascii_digit())
                    .map_or((body.as_str(), ""), |at| body.split_at(at));
                format!("{}{rest}", group(int_part, true))
            } else {
                body
            };
            (f.is_sign_negative() && !f.is_nan(), body)
        }
    };
    let sign = match (negative, spec.sign) {
        (true, _) => "-",
        (false, Some('+')) => "+",
        (false, Some(' ')) => " ",
        _ => "",
    };
    Some(format!("{sign}{magnitude}"))
}

fn group(digits: &str, grouping: bool) -> String {
    if !grouping {
        return digits.to_string();
    }
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn scientific(f: f64, precision: usize) -> String {
    if !f.is_finite() {
        return format_float(f);
    }
    let rendered = format!("{f:.precision$e}");
    match rendered.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
        }
        None => rendered,
    }
}

fn general(f: f64, precision: usize) -> String {
    if !f.is_finite() {
        return format_float(f);
    }
    if f == 0.0 {
        return "0".to_string();
    }
    let precision = precision.max(1);
    let exponent = f.abs().log10().floor();
    let limit = i32::try_from(precision).unwrap_or(i32::MAX);
    #[allow(clippy::cast_possible_truncation)]
    let exponent = exponent as i32;
    let trim = |s: String| {
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        }
    };
    if (-4..limit).contains(&exponent) {
        let decimals = usize::try_from(limit - 1 - exponent).unwrap_or(0);
        trim(format!("{f:.decimals$}"))
    } else {
        let rendered = scientific(f, precision - 1);
        match rendered.split_once('e') {
            Some((mantissa, exponent)) => format!("{}e{exponent}", trim(mantissa.to_string())),
            None => rendered,
        }
    }
}
