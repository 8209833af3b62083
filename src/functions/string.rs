//! String functions
//!
//! Arguments are coerced with `str()` rules (`None` becomes the empty
//! string), so `upper(42)` is `"42"`.

use regex::{Regex, RegexBuilder};

use crate::methods::{capitalize, pad, title_case};
use crate::value::Value;

use super::{
    FunctionCategory, FunctionDefinition, FunctionError, generated_len, int_arg, str_arg,
    text_arg, usize_to_value,
};

/// Compiled program size cap for user-supplied patterns
const REGEX_SIZE_LIMIT: usize = 1 << 20;

fn def<F>(name: &str, min: usize, max: Option<usize>, func: F) -> FunctionDefinition
where
    F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    FunctionDefinition::new(name, FunctionCategory::String, min, max, func)
}

fn map_text(
    op: fn(&str) -> String,
) -> impl Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static {
    move |args| Ok(Value::Str(op(&text_arg(&args[0]))))
}

fn test_text(
    op: fn(&str) -> bool,
) -> impl Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static {
    move |args| Ok(Value::Bool(op(&text_arg(&args[0]))))
}

fn regex(name: &str, pattern: &Value) -> Result<Regex, FunctionError> {
    RegexBuilder::new(str_arg(name, pattern)?)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|err| FunctionError::invalid_argument(name, format!("invalid pattern: {err}")))
}

/// Characters `start..end` with Python slice clamping of negative bounds
fn char_range(s: &str, start: i64, end: Option<i64>) -> String {
    let len = i64::try_from(s.chars().count()).unwrap_or(i64::MAX);
    let clamp = |bound: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        usize::try_from(bound.clamp(0, len)).unwrap_or(0)
    };
    let (start, end) = (clamp(start), clamp(end.unwrap_or(len)));
    if start >= end {
        return String::new();
    }
    s.chars().skip(start).take(end - start).collect()
}

fn padded(name: &'static str, align: char) -> impl Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static {
    move |args| {
        let text = text_arg(&args[0]);
        let width = generated_len(name, usize::try_from(int_arg(name, &args[1])?).unwrap_or(0))?;
        let fill = match args.get(2) {
            Some(value) => {
                let fill = str_arg(name, value)?;
                let mut chars = fill.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => {
                        return Err(FunctionError::invalid_argument(
                            name,
                            "fill must be a single character",
                        ));
                    }
                }
            }
            None => ' ',
        };
        Ok(Value::Str(pad(&text, width, fill, align)))
    }
}

/// String function definitions
#[must_use]
pub fn definitions() -> Vec<FunctionDefinition> {
    vec![
        def("upper", 1, Some(1), map_text(str::to_uppercase))
            .description("Convert to upper case")
            .signature("upper(value) -> str")
            .example("upper(\"hello\") = \"HELLO\""),
        def("lower", 1, Some(1), map_text(str::to_lowercase))
            .description("Convert to lower case")
            .signature("lower(value) -> str"),
        def("title", 1, Some(1), map_text(title_case))
            .description("Capitalize every word")
            .signature("title(value) -> str")
            .example("title(\"hello world\") = \"Hello World\""),
        def("capitalize", 1, Some(1), map_text(capitalize)).signature("capitalize(value) -> str"),
        def("trim", 1, Some(1), map_text(|s| s.trim().to_string()))
            .description("Remove surrounding whitespace")
            .signature("trim(value) -> str"),
        def("ltrim", 1, Some(1), map_text(|s| s.trim_start().to_string()))
            .signature("ltrim(value) -> str"),
        def("rtrim", 1, Some(1), map_text(|s| s.trim_end().to_string()))
            .signature("rtrim(value) -> str"),
        def("strip", 1, Some(2), |args| {
            let text = text_arg(&args[0]);
            Ok(Value::Str(match args.get(1) {
                None | Some(Value::None) => text.trim().to_string(),
                Some(chars) => {
                    let chars: Vec<char> = str_arg("strip", chars)?.chars().collect();
                    text.trim_matches(|c: char| chars.contains(&c)).to_string()
                }
            }))
        })
        .description("Remove surrounding whitespace or the given characters")
        .signature("strip(value, chars=None) -> str")
        .example("strip(\"##hello##\", \"#\") = \"hello\""),
        def("normalize_space", 1, Some(1), map_text(|s| {
            s.split_whitespace().collect::<Vec<_>>().join(" ")
        }))
        .signature("normalize_space(value) -> str"),
        def("concat", 1, None, |args| {
            Ok(Value::Str(args.iter().map(text_arg).collect()))
        })
        .description("Concatenate the string forms of all arguments")
        .signature("concat(*values) -> str")
        .example("concat(\"a\", 1, \"c\") = \"a1c\""),
        def("join", 1, Some(2), |args| {
            let separator = match args.get(1) {
                Some(value) => str_arg("join", value)?,
                None => "",
            };
            let parts: Vec<String> = args[0].iterate()?.iter().map(text_arg).collect();
            Ok(Value::Str(parts.join(separator)))
        })
        .description("Join the items of a list with a separator")
        .signature("join(values, separator='') -> str")
        .example("join([\"a\", \"b\"], \"-\") = \"a-b\""),
        def("split", 1, Some(2), |args| {
            let text = text_arg(&args[0]);
            let parts: Vec<Value> = match args.get(1) {
                None | Some(Value::None) => text.split_whitespace().map(Value::from).collect(),
                Some(separator) => {
                    let separator = str_arg("split", separator)?;
                    if separator.is_empty() {
                        return Err(FunctionError::invalid_argument("split", "empty separator"));
                    }
                    text.split(separator).map(Value::from).collect()
                }
            };
            Ok(Value::List(parts))
        })
        .signature("split(value, separator=None) -> list"),
        def("substring", 2, Some(3), |args| {
            let end = match args.get(2) {
                None | Some(Value::None) => None,
                Some(end) => Some(int_arg("substring", end)?),
            };
            Ok(Value::Str(char_range(
                &text_arg(&args[0]),
                int_arg("substring", &args[1])?,
                end,
            )))
        })
        .description("Characters from start up to (not including) end")
        .signature("substring(value, start, end=None) -> str")
        .example("substring(\"hello\", 1, 3) = \"el\""),
        def("left", 2, Some(2), |args| {
            let count = int_arg("left", &args[1])?.max(0);
            Ok(Value::Str(char_range(&text_arg(&args[0]), 0, Some(count))))
        })
        .signature("left(value, length) -> str"),
        def("right", 2, Some(2), |args| {
            let text = text_arg(&args[0]);
            let count = int_arg("right", &args[1])?.max(0);
            if count == 0 {
                return Ok(Value::Str(String::new()));
            }
            Ok(Value::Str(char_range(&text, -count, None)))
        })
        .signature("right(value, length) -> str"),
        def("replace", 3, Some(3), |args| {
            let text = text_arg(&args[0]);
            let old = str_arg("replace", &args[1])?;
            let new = str_arg("replace", &args[2])?;
            let grown = new.len().saturating_sub(old.len()) * text.matches(old).count();
            generated_len("replace", text.len() + grown)?;
            Ok(Value::Str(text.replace(old, new)))
        })
        .signature("replace(value, old, new) -> str"),
        def("repeat", 2, Some(2), |args| {
            let text = text_arg(&args[0]);
            let times = usize::try_from(int_arg("repeat", &args[1])?).unwrap_or(0);
            generated_len("repeat", text.chars().count().saturating_mul(times))?;
            Ok(Value::Str(text.repeat(times)))
        })
        .signature("repeat(value, times) -> str"),
        def("reverse", 1, Some(1), map_text(|s| s.chars().rev().collect()))
            .signature("reverse(value) -> str"),
        def("contains", 2, Some(2), |args| {
            Ok(Value::Bool(
                text_arg(&args[0]).contains(str_arg("contains", &args[1])?),
            ))
        })
        .signature("contains(value, substring) -> bool"),
        def("starts_with", 2, Some(2), |args| {
            Ok(Value::Bool(
                text_arg(&args[0]).starts_with(str_arg("starts_with", &args[1])?),
            ))
        })
        .signature("starts_with(value, prefix) -> bool"),
        def("ends_with", 2, Some(2), |args| {
            Ok(Value::Bool(
                text_arg(&args[0]).ends_with(str_arg("ends_with", &args[1])?),
            ))
        })
        .signature("ends_with(value, suffix) -> bool"),
        def("pad_left", 2, Some(3), padded("pad_left", '>'))
            .description("Right-align to width using a fill character")
            .signature("pad_left(value, width, char=' ') -> str")
            .example("pad_left(\"7\", 3, \"0\") = \"007\""),
        def("pad_right", 2, Some(3), padded("pad_right", '<'))
            .signature("pad_right(value, width, char=' ') -> str"),
        def("pad_center", 2, Some(3), padded("pad_center", '^'))
            .signature("pad_center(value, width, char=' ') -> str"),
        def("truncate", 2, Some(3), |args| {
            let text = text_arg(&args[0]);
            let length = usize::try_from(int_arg("truncate", &args[1])?).unwrap_or(0);
            let suffix = match args.get(2) {
                Some(value) => str_arg("truncate", value)?,
                None => "...",
            };
            if text.chars().count() <= length {
                return Ok(Value::Str(text));
            }
            let keep = length.saturating_sub(suffix.chars().count());
            Ok(Value::Str(format!(
                "{}{suffix}",
                text.chars().take(keep).collect::<String>()
            )))
        })
        .description("Shorten to at most length characters, ending with suffix")
        .signature("truncate(value, length, suffix='...') -> str"),
        def("is_alpha", 1, Some(1), test_text(|s| !s.is_empty() && s.chars().all(char::is_alphabetic)))
            .signature("is_alpha(value) -> bool"),
        def("is_digit", 1, Some(1), test_text(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())))
            .signature("is_digit(value) -> bool"),
        def("is_numeric", 1, Some(1), test_text(|s| s.trim().parse::<f64>().is_ok()))
            .description("Whether the value parses as a number")
            .signature("is_numeric(value) -> bool"),
        def("regex_match", 2, Some(2), |args| {
            let re = regex("regex_match", &args[1])?;
            Ok(Value::Bool(re.is_match(&text_arg(&args[0]))))
        })
        .alias("matches")
        .description("Whether the pattern matches anywhere in the value")
        .signature("regex_match(value, pattern) -> bool")
        .example("regex_match(\"abc123\", \"[0-9]+\") = True"),
        def("regex_find", 2, Some(2), |args| {
            let re = regex("regex_find", &args[1])?;
            Ok(re
                .find(&text_arg(&args[0]))
                .map_or(Value::None, |m| Value::from(m.as_str())))
        })
        .signature("regex_find(value, pattern) -> str | None"),
        def("regex_findall", 2, Some(2), |args| {
            let re = regex("regex_findall", &args[1])?;
            let text = text_arg(&args[0]);
            Ok(Value::List(re.find_iter(&text).map(|m| Value::from(m.as_str())).collect()))
        })
        .signature("regex_findall(value, pattern) -> list"),
        def("regex_replace", 3, Some(3), |args| {
            let re = regex("regex_replace", &args[1])?;
            let replacement = str_arg("regex_replace", &args[2])?;
            let text = text_arg(&args[0]);
            let replaced = re.replace_all(&text, replacement).into_owned();
            generated_len("regex_replace", replaced.len())?;
            Ok(Value::Str(replaced))
        })
        .description("Replace every match; $1 or ${name} refer to groups")
        .signature("regex_replace(value, pattern, replacement) -> str"),
        def("str_len", 1, Some(1), |args| {
            Ok(usize_to_value(text_arg(&args[0]).chars().count()))
        })
        .signature("str_len(value) -> int"),
    ]
}
