//! Operator semantics on [`Value`]s
//!
//! Integer arithmetic is checked: results that do not fit in `i64` raise
//! [`EvaluationError::NumericOverflow`] instead of wrapping.

use indexmap::{IndexMap, IndexSet};

use crate::ast::{BinaryOp, CompareOp, UnaryOp};
use crate::error::EvaluationError;
use crate::sandbox::SandboxPolicy;
use crate::value::{Number, Value};

/// Size limits applied to values produced by operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum string length in characters
    pub max_string_length: usize,
    /// Maximum collection size
    pub max_collection_size: usize,
}

impl Limits {
    /// Limits configured by a policy
    #[must_use]
    pub fn from_policy(policy: &SandboxPolicy) -> Self {
        Self {
            max_string_length: policy.max_string_length,
            max_collection_size: policy.max_collection_size,
        }
    }

    /// Fail if a string of `length` characters is too long
    pub fn check_string(&self, length: usize) -> Result<(), EvaluationError> {
        if length > self.max_string_length {
            return Err(EvaluationError::StringTooLong {
                length,
                max: self.max_string_length,
            });
        }
        Ok(())
    }

    /// Fail if a collection of `size` elements is too large
    pub fn check_collection(&self, size: usize) -> Result<(), EvaluationError> {
        if size > self.max_collection_size {
            return Err(EvaluationError::CollectionTooLarge {
                size,
                max: self.max_collection_size,
            });
        }
        Ok(())
    }

    /// Check the top-level size of any value
    pub fn check_value(&self, value: &Value) -> Result<(), EvaluationError> {
        match value {
            Value::Str(s) => self.check_string(s.chars().count()),
            other => other
                .len()
                .map_or(Ok(()), |size| self.check_collection(size)),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::from_policy(&SandboxPolicy::default())
    }
}

/// Apply a binary operator
pub fn binary(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    limits: &Limits,
) -> Result<Value, EvaluationError> {
    use BinaryOp::{Add, BitAnd, BitOr, BitXor, Multiply, Subtract};

    match (op, left, right) {
        (Add, Value::Str(a), Value::Str(b)) => {
            limits.check_string(a.chars().count() + b.chars().count())?;
            Ok(Value::Str(format!("{a}{b}")))
        }
        (Add, Value::List(a), Value::List(b)) => {
            limits.check_collection(a.len() + b.len())?;
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (Add, Value::Tuple(a), Value::Tuple(b)) => {
            limits.check_collection(a.len() + b.len())?;
            Ok(Value::Tuple(a.iter().chain(b).cloned().collect()))
        }
        (Multiply, Value::Str(s), n) | (Multiply, n, Value::Str(s)) if n.as_int().is_some() => {
            let count = repeat_count(n);
            let total = s
                .chars()
                .count()
                .checked_mul(count)
                .ok_or(EvaluationError::NumericOverflow)?;
            limits.check_string(total)?;
            Ok(Value::Str(s.repeat(count)))
        }
        (Multiply, Value::List(items), n) | (Multiply, n, Value::List(items))
            if n.as_int().is_some() =>
        {
            Ok(Value::List(repeat_items(items, repeat_count(n), limits)?))
        }
        (Multiply, Value::Tuple(items), n) | (Multiply, n, Value::Tuple(items))
            if n.as_int().is_some() =>
        {
            Ok(Value::Tuple(repeat_items(items, repeat_count(n), limits)?))
        }
        (Subtract, Value::Set(a), Value::Set(b)) => {
            Ok(Value::Set(a.difference(b).cloned().collect()))
        }
        (BitAnd, Value::Set(a), Value::Set(b)) => {
            Ok(Value::Set(a.intersection(b).cloned().collect()))
        }
        (BitOr, Value::Set(a), Value::Set(b)) => {
            limits.check_collection(a.len() + b.len())?;
            Ok(Value::Set(a.union(b).cloned().collect()))
        }
        (BitXor, Value::Set(a), Value::Set(b)) => {
            Ok(Value::Set(a.symmetric_difference(b).cloned().collect()))
        }
        (BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut merged: IndexMap<Value, Value> = a.clone();
            merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
            limits.check_collection(merged.len())?;
            Ok(Value::Dict(merged))
        }
        (BitAnd, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a & *b)),
        (BitOr, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a | *b)),
        (BitXor, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a ^ *b)),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => arithmetic(op, a, b),
            _ => Err(EvaluationError::binary_type_error(
                op.symbol(),
                left.type_name(),
                right.type_name(),
            )),
        },
    }
}

fn repeat_count(n: &Value) -> usize {
    n.as_int()
        .and_then(|count| usize::try_from(count).ok())
        .unwrap_or(0)
}

fn repeat_items(
    items: &[Value],
    count: usize,
    limits: &Limits,
) -> Result<Vec<Value>, EvaluationError> {
    let total = items
        .len()
        .checked_mul(count)
        .ok_or(EvaluationError::NumericOverflow)?;
    limits.check_collection(total)?;
    let mut out = Vec::with_capacity(total);
    for _ in 0..count {
        out.extend_from_slice(items);
    }
    Ok(out)
}

fn checked(result: Option<i64>) -> Result<Value, EvaluationError> {
    result.map(Value::Int).ok_or(EvaluationError::NumericOverflow)
}

fn arithmetic(op: BinaryOp, a: Number, b: Number) -> Result<Value, EvaluationError> {
    use Number::Int;

    match op {
        BinaryOp::Add => match (a, b) {
            (Int(x), Int(y)) => checked(x.checked_add(y)),
            _ => Ok(Value::Float(a.to_f64() + b.to_f64())),
        },
        BinaryOp::Subtract => match (a, b) {
            (Int(x), Int(y)) => checked(x.checked_sub(y)),
            _ => Ok(Value::Float(a.to_f64() - b.to_f64())),
        },
        BinaryOp::Multiply => match (a, b) {
            (Int(x), Int(y)) => checked(x.checked_mul(y)),
            _ => Ok(Value::Float(a.to_f64() * b.to_f64())),
        },
        BinaryOp::Divide => {
            let divisor = b.to_f64();
            if divisor == 0.0 {
                return Err(EvaluationError::DivisionByZero);
            }
            Ok(Value::Float(a.to_f64() / divisor))
        }
        BinaryOp::FloorDivide => match (a, b) {
            (Int(_), Int(0)) => Err(EvaluationError::DivisionByZero),
            (Int(x), Int(y)) => {
                let quotient = x.checked_div(y).ok_or(EvaluationError::NumericOverflow)?;
                if x % y != 0 && ((x < 0) != (y < 0)) {
                    Ok(Value::Int(quotient - 1))
                } else {
                    Ok(Value::Int(quotient))
                }
            }
            _ => {
                let divisor = b.to_f64();
                if divisor == 0.0 {
                    return Err(EvaluationError::DivisionByZero);
                }
                Ok(Value::Float((a.to_f64() / divisor).floor()))
            }
        },
        BinaryOp::Modulo => match (a, b) {
            (Int(_), Int(0)) => Err(EvaluationError::DivisionByZero),
            (Int(x), Int(y)) => {
                let remainder = x.checked_rem(y).unwrap_or(0);
                if remainder != 0 && ((remainder < 0) != (y < 0)) {
                    Ok(Value::Int(remainder + y))
                } else {
                    Ok(Value::Int(remainder))
                }
            }
            _ => {
                let (x, y) = (a.to_f64(), b.to_f64());
                if y == 0.0 {
                    return Err(EvaluationError::DivisionByZero);
                }
                let remainder = x % y;
                if remainder != 0.0 && ((remainder < 0.0) != (y < 0.0)) {
                    Ok(Value::Float(remainder + y))
                } else {
                    Ok(Value::Float(remainder))
                }
            }
        },
        BinaryOp::Power => power(a, b),
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => match (a, b) {
            (Int(x), Int(y)) => Ok(Value::Int(match op {
                BinaryOp::BitAnd => x & y,
                BinaryOp::BitOr => x | y,
                _ => x ^ y,
            })),
            _ => Err(EvaluationError::binary_type_error(
                op.symbol(),
                number_type(a),
                number_type(b),
            )),
        },
        BinaryOp::LeftShift | BinaryOp::RightShift => match (a, b) {
            (Int(_), Int(shift)) if shift < 0 => {
                Err(EvaluationError::invalid("negative shift count"))
            }
            (Int(x), Int(shift)) => shift_value(op, x, shift),
            _ => Err(EvaluationError::binary_type_error(
                op.symbol(),
                number_type(a),
                number_type(b),
            )),
        },
    }
}

fn number_type(number: Number) -> &'static str {
    match number {
        Number::Int(_) => "int",
        Number::Float(_) => "float",
    }
}

fn shift_value(op: BinaryOp, x: i64, shift: i64) -> Result<Value, EvaluationError> {
    if op == BinaryOp::RightShift {
        let shift = u32::try_from(shift.min(63)).unwrap_or(63);
        return Ok(Value::Int(x >> shift));
    }
    if x == 0 {
        return Ok(Value::Int(0));
    }
    let shift = u32::try_from(shift).map_err(|_| EvaluationError::NumericOverflow)?;
    if shift >= 64 {
        return Err(EvaluationError::NumericOverflow);
    }
    let widened = i128::from(x) << shift;
    i64::try_from(widened)
        .map(Value::Int)
        .map_err(|_| EvaluationError::NumericOverflow)
}

fn power(a: Number, b: Number) -> Result<Value, EvaluationError> {
    use Number::Int;

    match (a, b) {
        (Int(base), Int(exponent)) if exponent >= 0 => match base {
            0 => Ok(Value::Int(i64::from(exponent == 0))),
            1 => Ok(Value::Int(1)),
            -1 => Ok(Value::Int(if exponent % 2 == 0 { 1 } else { -1 })),
            _ => {
                let exponent =
                    u32::try_from(exponent).map_err(|_| EvaluationError::NumericOverflow)?;
                checked(base.checked_pow(exponent))
            }
        },
        _ => {
            let (base, exponent) = (a.to_f64(), b.to_f64());
            if base == 0.0 && exponent < 0.0 {
                return Err(EvaluationError::DivisionByZero);
            }
            if base < 0.0 && exponent.fract() != 0.0 {
                return Err(EvaluationError::invalid(
                    "negative number cannot be raised to a fractional power",
                ));
            }
            let result = base.powf(exponent);
            if result.is_infinite() && base.is_finite() && exponent.is_finite() {
                return Err(EvaluationError::NumericOverflow);
            }
            Ok(Value::Float(result))
        }
    }
}

/// Apply a unary operator
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, EvaluationError> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Negate, value) if value.as_int().is_some() => {
            checked(value.as_int().and_then(i64::checked_neg))
        }
        (UnaryOp::Plus, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOp::Plus, value) if value.as_int().is_some() => {
            Ok(value.as_int().map_or(Value::None, Value::Int))
        }
        (UnaryOp::Invert, value) if value.as_int().is_some() => {
            Ok(value.as_int().map_or(Value::None, |i| Value::Int(!i)))
        }
        (op, value) => Err(EvaluationError::unary_type_error(
            op.symbol(),
            value.type_name(),
        )),
    }
}

/// Evaluate a single comparison
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvaluationError> {
    match op {
        CompareOp::Equal => Ok(left == right),
        CompareOp::NotEqual => Ok(left != right),
        CompareOp::Is => Ok(identical(left, right)),
        CompareOp::IsNot => Ok(!identical(left, right)),
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => contains(right, left).map(|found| !found),
        CompareOp::Less
        | CompareOp::LessOrEqual
        | CompareOp::Greater
        | CompareOp::GreaterOrEqual => ordered(op, left, right),
    }
}

/// Identity for singletons, same type and equal otherwise
fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
        _ => left.kind() == right.kind() && left == right,
    }
}

fn ordered(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvaluationError> {
    if let (Value::Set(a), Value::Set(b)) = (left, right) {
        return Ok(set_ordering(op, a, b));
    }
    let ordering = left.try_cmp(right).map_err(|_| {
        EvaluationError::invalid(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
    })?;
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        CompareOp::Less => ordering.is_lt(),
        CompareOp::LessOrEqual => ordering.is_le(),
        CompareOp::Greater => ordering.is_gt(),
        _ => ordering.is_ge(),
    })
}

fn set_ordering(op: CompareOp, a: &IndexSet<Value>, b: &IndexSet<Value>) -> bool {
    match op {
        CompareOp::Less => a.len() < b.len() && a.is_subset(b),
        CompareOp::LessOrEqual => a.is_subset(b),
        CompareOp::Greater => a.len() > b.len() && a.is_superset(b),
        _ => a.is_superset(b),
    }
}

/// Membership test `item in container`
pub fn contains(container: &Value, item: &Value) -> Result<bool, EvaluationError> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(EvaluationError::invalid(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) | Value::Tuple(items) => Ok(items.contains(item)),
        Value::Set(items) => {
            item.ensure_hashable()?;
            Ok(items.contains(item))
        }
        Value::Dict(map) => {
            item.ensure_hashable()?;
            Ok(map.contains_key(item))
        }
        other => Err(EvaluationError::invalid(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let position = if index < 0 { index + len } else { index };
    if (0..len).contains(&position) {
        usize::try_from(position).ok()
    } else {
        None
    }
}

/// `value[index]`
pub fn subscript(value: &Value, index: &Value) -> Result<Value, EvaluationError> {
    match value {
        Value::List(items) | Value::Tuple(items) => {
            let Some(position) = index.as_int() else {
                return Err(EvaluationError::invalid(format!(
                    "{} indices must be integers or slices, not {}",
                    value.type_name(),
                    index.type_name()
                )));
            };
            normalize_index(position, items.len())
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| EvaluationError::Index {
                    message: format!("{} index out of range", value.type_name()),
                })
        }
        Value::Str(s) => {
            let Some(position) = index.as_int() else {
                return Err(EvaluationError::invalid(format!(
                    "string indices must be integers, not {}",
                    index.type_name()
                )));
            };
            normalize_index(position, s.chars().count())
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| EvaluationError::Index {
                    message: "string index out of range".to_string(),
                })
        }
        Value::Dict(map) => {
            index.ensure_hashable()?;
            map.get(index).cloned().ok_or_else(|| EvaluationError::Key {
                key: index.repr(),
            })
        }
        other => Err(EvaluationError::invalid(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn slice_bound(bound: Option<&Value>) -> Result<Option<i64>, EvaluationError> {
    match bound {
        None | Some(Value::None) => Ok(None),
        Some(value) => value.as_int().map(Some).ok_or_else(|| {
            EvaluationError::invalid("slice indices must be integers or None")
        }),
    }
}

/// Positions selected by a slice over a sequence of `len` elements
fn slice_positions(len: usize, lower: Option<i64>, upper: Option<i64>, step: i64) -> Vec<usize> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let clamp = |bound: i64, low: i64, high: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };

    let mut positions = Vec::new();
    if step > 0 {
        let start = lower.map_or(0, |b| clamp(b, 0, len));
        let stop = upper.map_or(len, |b| clamp(b, 0, len));
        let mut i = start;
        while i < stop {
            positions.extend(usize::try_from(i).ok());
            i = i.saturating_add(step);
        }
    } else {
        let start = lower.map_or(len - 1, |b| clamp(b, -1, len - 1));
        let stop = upper.map_or(-1, |b| clamp(b, -1, len - 1));
        let mut i = start;
        while i > stop {
            positions.extend(usize::try_from(i).ok());
            i = i.saturating_add(step);
        }
    }
    positions
}

/// `value[lower:upper:step]`
pub fn slice(
    value: &Value,
    lower: Option<&Value>,
    upper: Option<&Value>,
    step: Option<&Value>,
) -> Result<Value, EvaluationError> {
    let step = slice_bound(step)?.unwrap_or(1);
    if step == 0 {
        return Err(EvaluationError::invalid("slice step cannot be zero"));
    }
    let (lower, upper) = (slice_bound(lower)?, slice_bound(upper)?);

    match value {
        Value::List(items) | Value::Tuple(items) => {
            let selected: Vec<Value> = slice_positions(items.len(), lower, upper, step)
                .into_iter()
                .filter_map(|i| items.get(i).cloned())
                .collect();
            Ok(if matches!(value, Value::List(_)) {
                Value::List(selected)
            } else {
                Value::Tuple(selected)
            })
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(
                slice_positions(chars.len(), lower, upper, step)
                    .into_iter()
                    .filter_map(|i| chars.get(i))
                    .collect(),
            ))
        }
        other => Err(EvaluationError::invalid(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(op: BinaryOp, left: impl Into<Value>, right: impl Into<Value>) -> Result<Value, EvaluationError> {
        binary(op, &left.into(), &right.into(), &Limits::default())
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(eval(BinaryOp::Add, 2, 3).ok(), Some(Value::Int(5)));
        assert_eq!(eval(BinaryOp::Power, 2, 10).ok(), Some(Value::Int(1024)));
        assert_eq!(eval(BinaryOp::FloorDivide, 10, 3).ok(), Some(Value::Int(3)));
        assert_eq!(eval(BinaryOp::FloorDivide, -7, 2).ok(), Some(Value::Int(-4)));
        assert_eq!(eval(BinaryOp::Modulo, 10, 3).ok(), Some(Value::Int(1)));
        assert_eq!(eval(BinaryOp::Modulo, -7, 3).ok(), Some(Value::Int(2)));
        assert_eq!(eval(BinaryOp::Modulo, 7, -3).ok(), Some(Value::Int(-2)));
        assert_eq!(eval(BinaryOp::Divide, 7, 2).ok(), Some(Value::Float(3.5)));
        assert_eq!(eval(BinaryOp::Power, 2, -1).ok(), Some(Value::Float(0.5)));
        assert_eq!(eval(BinaryOp::LeftShift, 1, 4).ok(), Some(Value::Int(16)));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert!(matches!(eval(BinaryOp::Divide, 1, 0), Err(EvaluationError::DivisionByZero)));
        assert!(matches!(eval(BinaryOp::Modulo, 1, 0), Err(EvaluationError::DivisionByZero)));
        assert!(matches!(
            eval(BinaryOp::Multiply, i64::MAX, 2),
            Err(EvaluationError::NumericOverflow)
        ));
        assert!(matches!(
            eval(BinaryOp::Add, 1, "a"),
            Err(EvaluationError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_sequence_operators() {
        assert_eq!(eval(BinaryOp::Add, "ab", "cd").ok(), Some(Value::from("abcd")));
        assert_eq!(eval(BinaryOp::Multiply, "ab", 3).ok(), Some(Value::from("ababab")));
        assert_eq!(eval(BinaryOp::Multiply, 2, vec![1]).ok(), Some(Value::from(vec![1, 1])));
        assert_eq!(eval(BinaryOp::Multiply, "x", -1).ok(), Some(Value::from("")));

        let limits = Limits {
            max_string_length: 5,
            max_collection_size: 3,
        };
        assert!(matches!(
            binary(BinaryOp::Multiply, &Value::from("ab"), &Value::Int(3), &limits),
            Err(EvaluationError::StringTooLong { length: 6, max: 5 })
        ));
        assert!(matches!(
            binary(BinaryOp::Multiply, &Value::from(vec![1, 2]), &Value::Int(2), &limits),
            Err(EvaluationError::CollectionTooLarge { size: 4, max: 3 })
        ));
    }

    #[test]
    fn test_comparisons() -> Result<(), EvaluationError> {
        assert!(compare(CompareOp::Less, &Value::Int(1), &Value::Float(1.5))?);
        assert!(compare(CompareOp::Equal, &Value::Int(1), &Value::Float(1.0))?);
        assert!(!compare(CompareOp::Is, &Value::Int(1), &Value::Float(1.0))?);
        assert!(compare(CompareOp::Is, &Value::None, &Value::None)?);
        assert!(compare(CompareOp::In, &Value::from("ell"), &Value::from("hello"))?);
        assert!(compare(CompareOp::NotIn, &Value::Int(4), &Value::from(vec![1, 2]))?);
        assert!(!compare(CompareOp::Less, &Value::Float(f64::NAN), &Value::Int(1))?);
        assert!(compare(CompareOp::Less, &Value::None, &Value::Int(1)).is_err());
        Ok(())
    }

    #[test]
    fn test_subscript_and_slice() -> Result<(), EvaluationError> {
        let items = Value::from(vec![10, 20, 30, 40]);
        assert_eq!(subscript(&items, &Value::Int(-1))?, Value::Int(40));
        assert!(matches!(
            subscript(&Value::List(vec![]), &Value::Int(0)),
            Err(EvaluationError::Index { .. })
        ));
        assert_eq!(
            slice(&items, Some(&Value::Int(1)), None, None)?,
            Value::from(vec![20, 30, 40])
        );
        assert_eq!(
            slice(&items, None, None, Some(&Value::Int(-1)))?,
            Value::from(vec![40, 30, 20, 10])
        );
        assert_eq!(
            slice(&items, None, None, Some(&Value::Int(2)))?,
            Value::from(vec![10, 30])
        );
        assert_eq!(
            slice(&Value::from("hello"), Some(&Value::Int(-3)), None, None)?,
            Value::from("llo")
        );
        assert!(slice(&items, None, None, Some(&Value::Int(0))).is_err());

        let dict = Value::dict([("a", Value::Int(1))]);
        assert_eq!(subscript(&dict, &Value::from("a"))?, Value::Int(1));
        assert!(matches!(
            subscript(&dict, &Value::from("b")),
            Err(EvaluationError::Key { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_unary() -> Result<(), EvaluationError> {
        assert_eq!(unary(UnaryOp::Negate, &Value::Int(5))?, Value::Int(-5));
        assert_eq!(unary(UnaryOp::Not, &Value::List(vec![]))?, Value::Bool(true));
        assert_eq!(unary(UnaryOp::Invert, &Value::Int(0))?, Value::Int(-1));
        assert!(unary(UnaryOp::Negate, &Value::from("a")).is_err());
        assert!(matches!(
            unary(UnaryOp::Negate, &Value::Int(i64::MIN)),
            Err(EvaluationError::NumericOverflow)
        ));
        Ok(())
    }
}
