//! Type conversion functions (`int`, `str`, `list`, ...)

use indexmap::{IndexMap, IndexSet};

use crate::value::{Value, float_as_integer};

use super::{FunctionCategory, FunctionDefinition, FunctionError, int_arg, str_arg};

fn def<F>(name: &str, min: usize, max: Option<usize>, func: F) -> FunctionDefinition
where
    F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    FunctionDefinition::new(name, FunctionCategory::Type, min, max, func)
}

fn parse_int(text: &str, base: u32) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let lowered = digits.to_ascii_lowercase();
    let digits = match base {
        16 => lowered.strip_prefix("0x").unwrap_or(&lowered),
        8 => lowered.strip_prefix("0o").unwrap_or(&lowered),
        2 => lowered.strip_prefix("0b").unwrap_or(&lowered),
        _ => &lowered,
    };
    if digits.is_empty()
        || digits.starts_with(['_', '+', '-'])
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return None;
    }
    let magnitude = i128::from_str_radix(&digits.replace('_', ""), base).ok()?;
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

fn to_int(value: &Value, base: Option<u32>) -> Result<Value, FunctionError> {
    let invalid = || {
        FunctionError::invalid_argument(
            "int",
            format!("invalid literal for int(): {}", value.repr()),
        )
    };
    match (value, base) {
        (Value::Str(s), base) => parse_int(s, base.unwrap_or(10)).map(Value::Int).ok_or_else(invalid),
        (_, Some(_)) => Err(FunctionError::invalid_argument(
            "int",
            "int() can't convert non-string with explicit base",
        )),
        (Value::Float(f), None) => float_as_integer(f.trunc()).map(Value::Int).ok_or_else(|| {
            FunctionError::invalid_argument("int", format!("cannot convert float {f} to integer"))
        }),
        (value, None) => value.as_int().map(Value::Int).ok_or_else(|| {
            FunctionError::invalid_argument(
                "int",
                format!(
                    "argument must be a string or a number, not '{}'",
                    value.type_name()
                ),
            )
        }),
    }
}

fn to_float(value: &Value) -> Result<Value, FunctionError> {
    match value {
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| {
                FunctionError::invalid_argument(
                    "float",
                    format!("could not convert string to float: {}", value.repr()),
                )
            }),
        other => other.as_float().map(Value::Float).ok_or_else(|| {
            FunctionError::invalid_argument(
                "float",
                format!(
                    "argument must be a string or a number, not '{}'",
                    other.type_name()
                ),
            )
        }),
    }
}

fn base_arg(value: &Value) -> Result<u32, FunctionError> {
    let base = int_arg("int", value)?;
    u32::try_from(base)
        .ok()
        .filter(|base| (2..=36).contains(base))
        .ok_or_else(|| FunctionError::invalid_argument("int", "base must be between 2 and 36"))
}

fn radix(prefix: &str, i: i64, render: fn(u64) -> String) -> Value {
    let sign = if i < 0 { "-" } else { "" };
    Value::Str(format!("{sign}{prefix}{}", render(i.unsigned_abs())))
}

fn to_dict(value: &Value) -> Result<Value, FunctionError> {
    if let Value::Dict(map) = value {
        return Ok(Value::Dict(map.clone()));
    }
    let mut map = IndexMap::new();
    for (position, entry) in value.iterate()?.into_iter().enumerate() {
        let pair = entry.iterate()?;
        let [key, item] = <[Value; 2]>::try_from(pair).map_err(|pair| {
            FunctionError::invalid_argument(
                "dict",
                format!(
                    "dictionary update sequence element #{position} has length {}; 2 is required",
                    pair.len()
                ),
            )
        })?;
        key.ensure_hashable()?;
        map.insert(key, item);
    }
    Ok(Value::Dict(map))
}

/// Conversion function definitions
#[must_use]
pub fn definitions() -> Vec<FunctionDefinition> {
    vec![
        def("int", 0, Some(2), |args| match args {
            [] => Ok(Value::Int(0)),
            [value] => to_int(value, None),
            [value, base] => to_int(value, Some(base_arg(base)?)),
            _ => Err(FunctionError::wrong_arity("int", 0, Some(2), args.len())),
        })
        .description("Convert to an integer, truncating floats")
        .signature("int(value=0, base=10) -> int")
        .example("int(\"42\") = 42"),
        def("float", 0, Some(1), |args| match args.first() {
            Some(value) => to_float(value),
            None => Ok(Value::Float(0.0)),
        })
        .signature("float(value=0.0) -> float"),
        def("str", 0, Some(1), |args| {
            Ok(Value::Str(args.first().map(ToString::to_string).unwrap_or_default()))
        })
        .signature("str(value='') -> str"),
        def("bool", 0, Some(1), |args| {
            Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
        })
        .signature("bool(value=False) -> bool"),
        def("list", 0, Some(1), |args| match args.first() {
            Some(value) => Ok(Value::List(value.iterate()?)),
            None => Ok(Value::List(Vec::new())),
        })
        .signature("list(iterable=()) -> list"),
        def("tuple", 0, Some(1), |args| match args.first() {
            Some(value) => Ok(Value::Tuple(value.iterate()?)),
            None => Ok(Value::Tuple(Vec::new())),
        })
        .signature("tuple(iterable=()) -> tuple"),
        def("set", 0, Some(1), |args| {
            let mut set = IndexSet::new();
            if let Some(value) = args.first() {
                for item in value.iterate()? {
                    item.ensure_hashable()?;
                    set.insert(item);
                }
            }
            Ok(Value::Set(set))
        })
        .signature("set(iterable=()) -> set"),
        def("dict", 0, Some(1), |args| match args.first() {
            Some(value) => to_dict(value),
            None => Ok(Value::Dict(IndexMap::new())),
        })
        .description("Copy a dict or build one from key/value pairs")
        .signature("dict(pairs=()) -> dict"),
        def("type_name", 1, Some(1), |args| Ok(Value::from(args[0].type_name())))
            .alias("type_of")
            .description("Python type name of the value")
            .signature("type_name(value) -> str")
            .example("type_name(1.5) = \"float\""),
        def("repr", 1, Some(1), |args| Ok(Value::Str(args[0].repr())))
            .signature("repr(value) -> str"),
        def("to_int", 1, Some(2), |args| {
            Ok(to_int(&args[0], None).unwrap_or_else(|_| {
                args.get(1).cloned().unwrap_or(Value::Int(0))
            }))
        })
        .description("Like int() but returns a default instead of failing")
        .signature("to_int(value, default=0) -> int"),
        def("to_float", 1, Some(2), |args| {
            Ok(to_float(&args[0]).unwrap_or_else(|_| {
                args.get(1).cloned().unwrap_or(Value::Float(0.0))
            }))
        })
        .signature("to_float(value, default=0.0) -> float"),
        def("bin", 1, Some(1), |args| {
            Ok(radix("0b", int_arg("bin", &args[0])?, |u| format!("{u:b}")))
        })
        .signature("bin(int) -> str"),
        def("oct", 1, Some(1), |args| {
            Ok(radix("0o", int_arg("oct", &args[0])?, |u| format!("{u:o}")))
        })
        .signature("oct(int) -> str"),
        def("hex", 1, Some(1), |args| {
            Ok(radix("0x", int_arg("hex", &args[0])?, |u| format!("{u:x}")))
        })
        .signature("hex(int) -> str"),
        def("ord", 1, Some(1), |args| {
            let text = str_arg("ord", &args[0])?;
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
                _ => Err(FunctionError::invalid_argument(
                    "ord",
                    format!("expected a character, but string of length {} found", text.chars().count()),
                )),
            }
        })
        .signature("ord(char) -> int"),
        def("chr", 1, Some(1), |args| {
            let code = int_arg("chr", &args[0])?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| FunctionError::invalid_argument("chr", "arg not in range(0x110000)"))
        })
        .signature("chr(int) -> str"),
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

    #[test]
    fn test_numeric_conversions() -> Result<(), FunctionError> {
        assert_eq!(call("int", &[Value::from(" 42 ")])?, Value::Int(42));
        assert_eq!(call("int", &[Value::from("-1_000")])?, Value::Int(-1000));
        assert_eq!(call("int", &[Value::Float(-3.9)])?, Value::Int(-3));
        assert_eq!(call("int", &[Value::from("ff"), Value::Int(16)])?, Value::Int(255));
        assert_eq!(call("int", &[Value::from("0x1F"), Value::Int(16)])?, Value::Int(31));
        assert!(call("int", &[Value::from("4.2")]).is_err());
        assert!(call("int", &[Value::Float(f64::INFINITY)]).is_err());
        assert_eq!(call("float", &[Value::from("2.5")])?, Value::Float(2.5));
        assert_eq!(call("to_int", &[Value::from("x"), Value::Int(-1)])?, Value::Int(-1));
        assert_eq!(call("bin", &[Value::Int(-5)])?, Value::from("-0b101"));
        assert_eq!(call("hex", &[Value::Int(255)])?, Value::from("0xff"));
        Ok(())
    }

    #[test]
    fn test_container_conversions() -> Result<(), FunctionError> {
        assert_eq!(call("list", &[Value::from("ab")])?, Value::from(vec!["a", "b"]));
        assert_eq!(
            call("set", &[Value::from(vec![1, 1, 2])])?,
            Value::Set([Value::Int(1), Value::Int(2)].into_iter().collect())
        );
        let pairs = Value::List(vec![Value::Tuple(vec![Value::from("a"), Value::Int(1)])]);
        assert_eq!(call("dict", &[pairs])?, Value::dict([("a", Value::Int(1))]));
        assert!(call("dict", &[Value::from(vec![1])]).is_err());
        assert!(call("set", &[Value::List(vec![Value::List(vec![])])]).is_err());
        Ok(())
    }

    #[test]
    fn test_text_conversions() -> Result<(), FunctionError> {
        assert_eq!(call("str", &[Value::Float(1.0)])?, Value::from("1.0"));
        assert_eq!(call("str", &[Value::None])?, Value::from("None"));
        assert_eq!(call("repr", &[Value::from("a")])?, Value::from("'a'"));
        assert_eq!(call("type_of", &[Value::Int(1)])?, Value::from("int"));
        assert_eq!(call("ord", &[Value::from("A")])?, Value::Int(65));
        assert_eq!(call("chr", &[Value::Int(97)])?, Value::from("a"));
        assert_eq!(call("bool", &[Value::from("")])?, Value::Bool(false));
        Ok(())
    }
}
