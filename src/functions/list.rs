//! List and collection functions
//!
//! Anything iterable is accepted where a list is expected; results are
//! always lists (or tuples for pairs).

use std::cmp::Ordering;

use indexmap::IndexSet;

use crate::value::Value;

use super::{
    FunctionCategory, FunctionDefinition, FunctionError, callable_arg, generated_len, int_arg,
    usize_to_value,
};

fn def<F>(name: &str, min: usize, max: Option<usize>, func: F) -> FunctionDefinition
where
    F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    FunctionDefinition::new(name, FunctionCategory::List, min, max, func)
}

fn count_arg(name: &str, value: &Value) -> Result<usize, FunctionError> {
    Ok(usize::try_from(int_arg(name, value)?).unwrap_or(0))
}

/// Stable merge sort with a fallible comparator
fn merge_sort<T>(
    items: &mut Vec<T>,
    cmp: &impl Fn(&T, &T) -> Result<Ordering, FunctionError>,
) -> Result<(), FunctionError> {
    if items.len() <= 1 {
        return Ok(());
    }
    let mut right = items.split_off(items.len() / 2);
    merge_sort(items, cmp)?;
    merge_sort(&mut right, cmp)?;

    let left = std::mem::take(items);
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        if cmp(b, a)?.is_lt() {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    *items = merged;
    Ok(())
}

/// Sort values, optionally by a key function and in descending order
pub(crate) fn sort_values(
    items: Vec<Value>,
    key: Option<&crate::value::Callable>,
    reverse: bool,
) -> Result<Vec<Value>, FunctionError> {
    let mut entries = items
        .into_iter()
        .map(|item| {
            let sort_key = match key {
                Some(key) => key.call(std::slice::from_ref(&item))?,
                None => item.clone(),
            };
            Ok((sort_key, item))
        })
        .collect::<Result<Vec<_>, FunctionError>>()?;

    merge_sort(&mut entries, &|a: &(Value, Value), b: &(Value, Value)| {
        let ordering = a.0.try_cmp(&b.0)?.unwrap_or(Ordering::Equal);
        Ok(if reverse { ordering.reverse() } else { ordering })
    })?;
    Ok(entries.into_iter().map(|(_, item)| item).collect())
}

fn range(args: &[Value]) -> Result<Value, FunctionError> {
    let ints = args
        .iter()
        .map(|arg| int_arg("range", arg))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(FunctionError::wrong_arity("range", 1, Some(3), args.len())),
    };
    if step == 0 {
        return Err(FunctionError::invalid_argument("range", "step must not be zero"));
    }
    let span = i128::from(stop) - i128::from(start);
    let step_wide = i128::from(step);
    let len = if (span > 0) == (step > 0) && span != 0 {
        (span.abs() + step_wide.abs() - 1) / step_wide.abs()
    } else {
        0
    };
    let len = generated_len("range", usize::try_from(len).unwrap_or(usize::MAX))?;
    Ok(Value::List(
        (0..len)
            .scan(i128::from(start), |current, _| {
                let value = *current;
                *current += step_wide;
                i64::try_from(value).ok().map(Value::Int)
            })
            .collect(),
    ))
}

fn flatten_into(value: &Value, depth: i64, out: &mut Vec<Value>) {
    match value {
        Value::List(items) | Value::Tuple(items) if depth != 0 => {
            for item in items {
                flatten_into(item, depth - 1, out);
            }
        }
        other => out.push(other.clone()),
    }
}

fn unique(items: Vec<Value>) -> Vec<Value> {
    let mut seen = IndexSet::new();
    let mut out = Vec::new();
    for item in items {
        if item.is_hashable() {
            if seen.insert(item.clone()) {
                out.push(item);
            }
        } else if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn zip(lists: &[Value]) -> Result<Value, FunctionError> {
    let lists = lists
        .iter()
        .map(Value::iterate)
        .collect::<Result<Vec<_>, _>>()?;
    let len = lists.iter().map(Vec::len).min().unwrap_or(0);
    Ok(Value::List(
        (0..len)
            .map(|i| Value::Tuple(lists.iter().map(|list| list[i].clone()).collect()))
            .collect(),
    ))
}

fn nth(items: &[Value], index: i64) -> Option<&Value> {
    let len = i64::try_from(items.len()).ok()?;
    let index = if index < 0 { index + len } else { index };
    usize::try_from(index).ok().and_then(|i| items.get(i))
}

/// List function definitions
#[must_use]
pub fn definitions() -> Vec<FunctionDefinition> {
    vec![
        def("len", 1, Some(1), |args| match &args[0] {
            Value::None => Ok(Value::Int(0)),
            value => value.len().map(usize_to_value).ok_or_else(|| {
                FunctionError::invalid_argument(
                    "len",
                    format!("object of type '{}' has no len()", value.type_name()),
                )
            }),
        })
        .alias("length")
        .description("Number of items in a string, list, set or dict")
        .signature("len(value) -> int")
        .example("len([1, 2, 3]) = 3"),
        def("range", 1, Some(3), range)
            .description("List of integers from start to stop by step")
            .signature("range(start=0, stop, step=1) -> list")
            .example("range(3) = [0, 1, 2]"),
        def("sorted", 1, Some(3), |args| {
            let mut key = None;
            let mut reverse = false;
            for arg in &args[1..] {
                match arg {
                    Value::Function(callable) => key = Some(callable),
                    other => reverse = other.is_truthy(),
                }
            }
            Ok(Value::List(sort_values(args[0].iterate()?, key, reverse)?))
        })
        .description("Sorted copy; optional key function and reverse flag")
        .signature("sorted(iterable, key=None, reverse=False) -> list")
        .example("sorted([3, 1, 2]) = [1, 2, 3]"),
        def("reversed", 1, Some(1), |args| {
            let mut items = args[0].iterate()?;
            items.reverse();
            Ok(Value::List(items))
        })
        .signature("reversed(iterable) -> list"),
        def("first", 1, Some(2), |args| {
            let items = args[0].iterate()?;
            Ok(items
                .into_iter()
                .next()
                .or_else(|| args.get(1).cloned())
                .unwrap_or_default())
        })
        .signature("first(iterable, default=None) -> any"),
        def("last", 1, Some(2), |args| {
            let items = args[0].iterate()?;
            Ok(items
                .into_iter()
                .last()
                .or_else(|| args.get(1).cloned())
                .unwrap_or_default())
        })
        .signature("last(iterable, default=None) -> any"),
        def("nth", 2, Some(3), |args| {
            let items = args[0].iterate()?;
            let index = int_arg("nth", &args[1])?;
            Ok(nth(&items, index)
                .or_else(|| args.get(2))
                .cloned()
                .unwrap_or_default())
        })
        .signature("nth(iterable, index, default=None) -> any"),
        def("take", 2, Some(2), |args| {
            let count = count_arg("take", &args[1])?;
            Ok(Value::List(args[0].iterate()?.into_iter().take(count).collect()))
        })
        .signature("take(iterable, count) -> list"),
        def("skip", 2, Some(2), |args| {
            let count = count_arg("skip", &args[1])?;
            Ok(Value::List(args[0].iterate()?.into_iter().skip(count).collect()))
        })
        .signature("skip(iterable, count) -> list"),
        def("chunk", 2, Some(2), |args| {
            let size = count_arg("chunk", &args[1])?;
            if size == 0 {
                return Err(FunctionError::invalid_argument("chunk", "size must be positive"));
            }
            Ok(Value::List(
                args[0]
                    .iterate()?
                    .chunks(size)
                    .map(|chunk| Value::List(chunk.to_vec()))
                    .collect(),
            ))
        })
        .signature("chunk(iterable, size) -> list"),
        def("unique", 1, Some(1), |args| Ok(Value::List(unique(args[0].iterate()?))))
            .description("Items with duplicates removed, first occurrence kept")
            .signature("unique(iterable) -> list"),
        def("flatten", 1, Some(2), |args| {
            let depth = match args.get(1) {
                Some(depth) => int_arg("flatten", depth)?,
                None => -1,
            };
            let mut out = Vec::new();
            for item in args[0].iterate()? {
                flatten_into(&item, depth, &mut out);
            }
            Ok(Value::List(out))
        })
        .description("Flatten nested lists; depth -1 flattens completely")
        .signature("flatten(iterable, depth=-1) -> list")
        .example("flatten([1, [2, [3]]]) = [1, 2, 3]"),
        def("count", 2, Some(2), |args| {
            let items = args[0].iterate()?;
            Ok(usize_to_value(items.iter().filter(|item| *item == &args[1]).count()))
        })
        .signature("count(iterable, item) -> int"),
        def("index_of", 2, Some(2), |args| {
            let items = args[0].iterate()?;
            Ok(items
                .iter()
                .position(|item| item == &args[1])
                .map_or(Value::Int(-1), usize_to_value))
        })
        .signature("index_of(iterable, item) -> int"),
        def("enumerate", 1, Some(2), |args| {
            let start = match args.get(1) {
                Some(start) => int_arg("enumerate", start)?,
                None => 0,
            };
            Ok(Value::List(
                args[0]
                    .iterate()?
                    .into_iter()
                    .zip(start..)
                    .map(|(item, i)| Value::Tuple(vec![Value::Int(i), item]))
                    .collect(),
            ))
        })
        .signature("enumerate(iterable, start=0) -> list"),
        def("zip", 1, None, zip).signature("zip(*iterables) -> list"),
        def("any", 1, Some(1), |args| {
            Ok(Value::Bool(args[0].iterate()?.iter().any(Value::is_truthy)))
        })
        .signature("any(iterable) -> bool"),
        def("all", 1, Some(1), |args| {
            Ok(Value::Bool(args[0].iterate()?.iter().all(Value::is_truthy)))
        })
        .signature("all(iterable) -> bool"),
        def("map", 2, None, |args| {
            let func = callable_arg("map", &args[0])?;
            let Value::List(rows) = zip(&args[1..])? else {
                return Ok(Value::List(Vec::new()));
            };
            let results = rows
                .into_iter()
                .map(|row| match row {
                    Value::Tuple(row_args) => func.call(&row_args),
                    other => func.call(std::slice::from_ref(&other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(results))
        })
        .description("Apply a function to every item")
        .signature("map(func, *iterables) -> list")
        .example("map(upper, [\"a\", \"b\"]) = [\"A\", \"B\"]"),
        def("filter", 2, Some(2), |args| {
            let items = args[1].iterate()?;
            let mut kept = Vec::new();
            for item in items {
                let keep = match &args[0] {
                    Value::None => item.is_truthy(),
                    func => callable_arg("filter", func)?
                        .call(std::slice::from_ref(&item))?
                        .is_truthy(),
                };
                if keep {
                    kept.push(item);
                }
            }
            Ok(Value::List(kept))
        })
        .description("Items for which the function returns a truthy value")
        .signature("filter(func, iterable) -> list"),
        def("reduce", 2, Some(3), |args| {
            let func = callable_arg("reduce", &args[1])?;
            let mut items = args[0].iterate()?.into_iter();
            let initial = match args.get(2) {
                Some(initial) => initial.clone(),
                None => items.next().ok_or_else(|| {
                    FunctionError::invalid_argument("reduce", "empty sequence with no initial value")
                })?,
            };
            items.try_fold(initial, |acc, item| func.call(&[acc, item]))
        })
        .signature("reduce(iterable, func, initial=None) -> any"),
        def("pluck", 2, Some(2), |args| {
            let items = args[0].iterate()?;
            Ok(Value::List(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Dict(map) => map.get(&args[1]).cloned().unwrap_or_default(),
                        _ => Value::None,
                    })
                    .collect(),
            ))
        })
        .description("Value of a key from every dict in a list")
        .signature("pluck(iterable, key) -> list"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        FunctionRegistry::with_builtins()
            .get(name)
            .ok_or_else(|| FunctionError::new(format!("Unknown function: {name}")))?
            .call(args)
    }

    fn ints(values: &[i64]) -> Value {
        Value::List(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn test_range() -> Result<(), FunctionError> {
        assert_eq!(call("range", &[Value::Int(5)])?, ints(&[0, 1, 2, 3, 4]));
        assert_eq!(call("range", &[Value::Int(2), Value::Int(5)])?, ints(&[2, 3, 4]));
        assert_eq!(
            call("range", &[Value::Int(10), Value::Int(0), Value::Int(-3)])?,
            ints(&[10, 7, 4, 1])
        );
        assert_eq!(call("range", &[Value::Int(-2)])?, ints(&[]));
        assert!(call("range", &[Value::Int(0), Value::Int(5), Value::Int(0)]).is_err());
        assert!(call("range", &[Value::Int(i64::MAX)]).is_err());
        Ok(())
    }

    #[test]
    fn test_sorting() -> Result<(), FunctionError> {
        assert_eq!(call("sorted", &[ints(&[3, 1, 2])])?, ints(&[1, 2, 3]));
        assert_eq!(
            call("sorted", &[ints(&[3, 1, 2]), Value::Bool(true)])?,
            ints(&[3, 2, 1])
        );
        let registry = FunctionRegistry::with_builtins();
        let abs = registry
            .get_callable("abs")
            .ok_or_else(|| FunctionError::new("abs missing"))?;
        assert_eq!(
            call("sorted", &[ints(&[-3, 1, -2]), Value::Function(abs)])?,
            ints(&[1, -2, -3])
        );
        assert!(call("sorted", &[Value::List(vec![Value::Int(1), Value::from("a")])]).is_err());
        Ok(())
    }

    #[test]
    fn test_higher_order() -> Result<(), FunctionError> {
        let registry = FunctionRegistry::with_builtins();
        let upper = registry
            .get_callable("upper")
            .ok_or_else(|| FunctionError::new("upper missing"))?;
        assert_eq!(
            call("map", &[Value::Function(upper.clone()), Value::from(vec!["a", "b"])])?,
            Value::from(vec!["A", "B"])
        );
        assert_eq!(
            call("filter", &[Value::None, ints(&[0, 1, 2])])?,
            ints(&[1, 2])
        );
        let add = registry
            .get_callable("concat")
            .ok_or_else(|| FunctionError::new("concat missing"))?;
        assert_eq!(
            call("reduce", &[Value::from(vec!["a", "b", "c"]), Value::Function(add)])?,
            Value::from("abc")
        );
        assert!(call("map", &[Value::Int(1), ints(&[1])]).is_err());
        Ok(())
    }

    #[test]
    fn test_shaping() -> Result<(), FunctionError> {
        let nested = Value::List(vec![Value::Int(1), Value::List(vec![Value::Int(2), ints(&[3])])]);
        assert_eq!(call("flatten", &[nested.clone()])?, ints(&[1, 2, 3]));
        assert_eq!(
            call("flatten", &[nested, Value::Int(1)])?,
            Value::List(vec![Value::Int(1), Value::Int(2), ints(&[3])])
        );
        assert_eq!(call("unique", &[ints(&[1, 2, 1, 3, 2])])?, ints(&[1, 2, 3]));
        assert_eq!(
            call("zip", &[ints(&[1, 2, 3]), Value::from(vec!["a", "b"])])?,
            Value::List(vec![
                Value::Tuple(vec![Value::Int(1), Value::from("a")]),
                Value::Tuple(vec![Value::Int(2), Value::from("b")]),
            ])
        );
        assert_eq!(call("first", &[ints(&[]), Value::Int(9)])?, Value::Int(9));
        assert_eq!(call("nth", &[ints(&[1, 2, 3]), Value::Int(-1)])?, Value::Int(3));
        assert_eq!(call("length", &[Value::from("abc")])?, Value::Int(3));
        assert_eq!(call("len", &[Value::None])?, Value::Int(0));
        assert!(call("len", &[Value::Int(3)]).is_err());
        Ok(())
    }
}
