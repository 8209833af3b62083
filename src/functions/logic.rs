//! Conditional and null-handling functions

use crate::value::{Value, ValueKind};

use super::{FunctionCategory, FunctionDefinition, FunctionError};

fn def<F>(name: &str, min: usize, max: Option<usize>, func: F) -> FunctionDefinition
where
    F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    FunctionDefinition::new(name, FunctionCategory::Logic, min, max, func)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::None => true,
        other => other.len() == Some(0),
    }
}

fn is_kind(
    kinds: &'static [ValueKind],
) -> impl Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static {
    move |args| Ok(Value::Bool(kinds.contains(&args[0].kind())))
}

fn ordered(a: &Value, b: &Value) -> Result<bool, FunctionError> {
    Ok(a.try_cmp(b)?.is_some_and(|ordering| ordering.is_le()))
}

/// Logic function definitions
#[must_use]
pub fn definitions() -> Vec<FunctionDefinition> {
    vec![
        def("is_none", 1, Some(1), |args| Ok(Value::Bool(args[0].is_none())))
            .alias("is_null")
            .signature("is_none(value) -> bool"),
        def("is_not_none", 1, Some(1), |args| Ok(Value::Bool(!args[0].is_none())))
            .alias("is_not_null")
            .signature("is_not_none(value) -> bool"),
        def("is_empty", 1, Some(1), |args| Ok(Value::Bool(is_empty(&args[0]))))
            .description("True for None and for empty strings and containers")
            .signature("is_empty(value) -> bool"),
        def("is_not_empty", 1, Some(1), |args| Ok(Value::Bool(!is_empty(&args[0]))))
            .signature("is_not_empty(value) -> bool"),
        def("is_blank", 1, Some(1), |args| {
            Ok(Value::Bool(match &args[0] {
                Value::None => true,
                Value::Str(s) => s.trim().is_empty(),
                _ => false,
            }))
        })
        .description("True for None and whitespace-only strings")
        .signature("is_blank(value) -> bool"),
        def("if_else", 3, Some(3), |args| {
            Ok(if args[0].is_truthy() {
                args[1].clone()
            } else {
                args[2].clone()
            })
        })
        .description("Second argument when the condition is truthy, else the third")
        .signature("if_else(condition, true_value, false_value) -> any")
        .example("if_else(score >= 60, \"pass\", \"fail\")"),
        def("default", 2, Some(2), |args| {
            Ok(if args[0].is_none() {
                args[1].clone()
            } else {
                args[0].clone()
            })
        })
        .alias("if_null")
        .alias("nvl")
        .description("The value, or the default when it is None")
        .signature("default(value, default) -> any"),
        def("if_empty", 2, Some(2), |args| {
            Ok(if is_empty(&args[0]) {
                args[1].clone()
            } else {
                args[0].clone()
            })
        })
        .signature("if_empty(value, default) -> any"),
        def("coalesce", 1, None, |args| {
            Ok(args
                .iter()
                .find(|value| !value.is_none())
                .cloned()
                .unwrap_or_default())
        })
        .description("First argument that is not None")
        .signature("coalesce(*values) -> any")
        .example("coalesce(None, \"\", \"x\") = \"\""),
        def("nullif", 2, Some(2), |args| {
            Ok(if args[0] == args[1] {
                Value::None
            } else {
                args[0].clone()
            })
        })
        .signature("nullif(value, other) -> any"),
        def("case", 1, None, |args| {
            let (subject, rest) = (&args[0], &args[1..]);
            let pairs = rest.chunks_exact(2);
            let default = pairs.remainder().first().cloned().unwrap_or_default();
            Ok(pairs
                .into_iter()
                .find(|pair| &pair[0] == subject)
                .map_or(default, |pair| pair[1].clone()))
        })
        .description("Result paired with the first matching value; an odd trailing argument is the default")
        .signature("case(value, match1, result1, ..., default=None) -> any")
        .example("case(2, 1, \"one\", 2, \"two\", \"many\") = \"two\""),
        def("switch", 2, Some(3), |args| {
            let Value::Dict(cases) = &args[1] else {
                return Err(FunctionError::invalid_argument("switch", "cases must be a dict"));
            };
            args[0].ensure_hashable()?;
            Ok(cases
                .get(&args[0])
                .or_else(|| args.get(2))
                .cloned()
                .unwrap_or_default())
        })
        .signature("switch(value, cases, default=None) -> any"),
        def("bool_not", 1, Some(1), |args| Ok(Value::Bool(!args[0].is_truthy())))
            .signature("bool_not(value) -> bool"),
        def("xor", 2, Some(2), |args| {
            Ok(Value::Bool(args[0].is_truthy() != args[1].is_truthy()))
        })
        .signature("xor(a, b) -> bool"),
        def("between", 3, Some(3), |args| {
            Ok(Value::Bool(
                ordered(&args[1], &args[0])? && ordered(&args[0], &args[2])?,
            ))
        })
        .description("Whether low <= value <= high")
        .signature("between(value, low, high) -> bool"),
        def("is_in", 2, None, |args| Ok(Value::Bool(args[1..].contains(&args[0]))))
            .signature("is_in(value, *items) -> bool"),
        def("is_bool", 1, Some(1), is_kind(&[ValueKind::Bool])).signature("is_bool(value) -> bool"),
        def("is_int", 1, Some(1), is_kind(&[ValueKind::Int])).signature("is_int(value) -> bool"),
        def("is_float", 1, Some(1), is_kind(&[ValueKind::Float]))
            .signature("is_float(value) -> bool"),
        def("is_number", 1, Some(1), is_kind(&[ValueKind::Int, ValueKind::Float]))
            .signature("is_number(value) -> bool"),
        def("is_string", 1, Some(1), is_kind(&[ValueKind::Str]))
            .signature("is_string(value) -> bool"),
        def("is_list", 1, Some(1), is_kind(&[ValueKind::List, ValueKind::Tuple]))
            .signature("is_list(value) -> bool"),
        def("is_dict", 1, Some(1), is_kind(&[ValueKind::Dict])).signature("is_dict(value) -> bool"),
    ]
}
