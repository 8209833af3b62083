//! Mathematical and aggregation functions

use crate::ast::BinaryOp;
use crate::operators::{self, Limits};
use crate::value::{Number, Value, float_as_integer};

use super::{FunctionCategory, FunctionDefinition, FunctionError, float_arg, int_arg, number_arg};

fn def<F>(name: &str, min: usize, max: Option<usize>, func: F) -> FunctionDefinition
where
    F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    FunctionDefinition::new(name, FunctionCategory::Math, min, max, func)
}

/// Wrap a float-to-float function, rejecting NaN results from finite input
fn unary_float(
    name: &'static str,
    op: fn(f64) -> f64,
) -> impl Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static {
    move |args| {
        let x = float_arg(name, &args[0])?;
        let result = op(x);
        if result.is_nan() && !x.is_nan() {
            return Err(FunctionError::invalid_argument(name, "math domain error"));
        }
        Ok(Value::Float(result))
    }
}

fn to_integer(name: &str, f: f64) -> Result<Value, FunctionError> {
    float_as_integer(f).map(Value::Int).ok_or_else(|| {
        FunctionError::invalid_argument(name, format!("cannot convert {f} to integer"))
    })
}

/// Values to aggregate: a single iterable argument or the arguments themselves
fn operands(args: &[Value]) -> Result<Vec<Value>, FunctionError> {
    match args {
        [single] if single.len().is_some() => {
            Ok(single.iterate()?)
        }
        _ => Ok(args.to_vec()),
    }
}

fn extreme(name: &'static str, args: &[Value], want_greater: bool) -> Result<Value, FunctionError> {
    let mut best: Option<Value> = None;
    for item in operands(args)? {
        best = Some(match best {
            None => item,
            Some(current) => {
                let replace = match item.try_cmp(&current)? {
                    Some(ordering) if want_greater => ordering.is_gt(),
                    Some(ordering) => ordering.is_lt(),
                    None => false,
                };
                if replace { item } else { current }
            }
        });
    }
    best.ok_or_else(|| FunctionError::invalid_argument(name, "arg is an empty sequence"))
}

fn add_all(items: &[Value], start: Value) -> Result<Value, FunctionError> {
    let limits = Limits::default();
    items.iter().try_fold(start, |total, item| {
        operators::binary(BinaryOp::Add, &total, item, &limits).map_err(FunctionError::from)
    })
}

fn round_half_even(x: f64, digits: i64) -> f64 {
    if digits == 0 {
        return x.round_ties_even();
    }
    let scale = 10f64.powi(i32::try_from(digits.clamp(-308, 308)).unwrap_or(0));
    (x * scale).round_ties_even() / scale
}

fn round(args: &[Value]) -> Result<Value, FunctionError> {
    let digits = match args.get(1) {
        None | Some(Value::None) => None,
        Some(value) => Some(int_arg("round", value)?),
    };
    match (number_arg("round", &args[0])?, digits) {
        (Number::Int(i), None) => Ok(Value::Int(i)),
        (Number::Int(i), Some(d)) if d >= 0 => Ok(Value::Int(i)),
        (Number::Int(i), Some(d)) => {
            #[allow(clippy::cast_precision_loss)]
            let rounded = round_half_even(i as f64, d);
            to_integer("round", rounded)
        }
        (Number::Float(f), None) => to_integer("round", f.round_ties_even()),
        (Number::Float(f), Some(d)) => Ok(Value::Float(round_half_even(f, d))),
    }
}

fn round_half_up(args: &[Value]) -> Result<Value, FunctionError> {
    let x = float_arg("round_half_up", &args[0])?;
    let digits = args.get(1).map_or(Ok(0), |d| int_arg("round_half_up", d))?;
    let scale = 10f64.powi(i32::try_from(digits.clamp(-308, 308)).unwrap_or(0));
    let rounded = (x * scale).round() / scale;
    if digits <= 0 {
        return to_integer("round_half_up", rounded);
    }
    Ok(Value::Float(rounded))
}

fn modular_pow(base: i64, exponent: i64, modulus: i64) -> Result<Value, FunctionError> {
    if modulus == 0 {
        return Err(FunctionError::invalid_argument("pow", "pow() 3rd argument cannot be 0"));
    }
    if exponent < 0 {
        return Err(FunctionError::invalid_argument(
            "pow",
            "negative exponent with a modulus is not supported",
        ));
    }
    let m = i128::from(modulus);
    let mut result: i128 = 1;
    let mut b = i128::from(base).rem_euclid(m);
    let mut e = exponent;
    while e > 0 {
        if e & 1 == 1 {
            result = result * b % m;
        }
        b = b * b % m;
        e >>= 1;
    }
    // Python takes the modulus' sign
    let mut result = result.rem_euclid(m.abs());
    if modulus < 0 && result != 0 {
        result += m;
    }
    i64::try_from(result)
        .map(Value::Int)
        .map_err(|_| FunctionError::new("Numeric overflow in operation"))
}

/// Math function definitions
#[must_use]
pub fn definitions() -> Vec<FunctionDefinition> {
    vec![
        def("abs", 1, Some(1), |args| match number_arg("abs", &args[0])? {
            Number::Int(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| FunctionError::new("Numeric overflow in operation")),
            Number::Float(f) => Ok(Value::Float(f.abs())),
        })
        .description("Absolute value")
        .signature("abs(x) -> number")
        .example("abs(-5) = 5"),
        def("round", 1, Some(2), round)
            .description("Round half to even, to an integer or to ndigits decimals")
            .signature("round(x, ndigits=None) -> number")
            .example("round(2.5) = 2")
            .example("round(3.14159, 2) = 3.14"),
        def("round_half_up", 1, Some(2), round_half_up)
            .description("Round with ties away from zero")
            .signature("round_half_up(x, digits=0) -> number")
            .example("round_half_up(2.5) = 3"),
        def("floor", 1, Some(1), |args| {
            to_integer("floor", float_arg("floor", &args[0])?.floor())
        })
        .signature("floor(x) -> int"),
        def("ceil", 1, Some(1), |args| {
            to_integer("ceil", float_arg("ceil", &args[0])?.ceil())
        })
        .signature("ceil(x) -> int"),
        def("trunc", 1, Some(1), |args| {
            to_integer("trunc", float_arg("trunc", &args[0])?.trunc())
        })
        .signature("trunc(x) -> int"),
        def("sqrt", 1, Some(1), unary_float("sqrt", f64::sqrt))
            .description("Square root")
            .signature("sqrt(x) -> float")
            .example("sqrt(16) = 4.0"),
        def("exp", 1, Some(1), unary_float("exp", f64::exp)).signature("exp(x) -> float"),
        def("log", 1, Some(2), |args| {
            let x = float_arg("log", &args[0])?;
            if x <= 0.0 {
                return Err(FunctionError::invalid_argument("log", "math domain error"));
            }
            match args.get(1) {
                Some(base) => {
                    let base = float_arg("log", base)?;
                    if base <= 0.0 || base == 1.0 {
                        return Err(FunctionError::invalid_argument("log", "math domain error"));
                    }
                    Ok(Value::Float(x.ln() / base.ln()))
                }
                None => Ok(Value::Float(x.ln())),
            }
        })
        .description("Natural logarithm, or logarithm to the given base")
        .signature("log(x, base=e) -> float"),
        def("log10", 1, Some(1), |args| {
            let x = float_arg("log10", &args[0])?;
            if x <= 0.0 {
                return Err(FunctionError::invalid_argument("log10", "math domain error"));
            }
            Ok(Value::Float(x.log10()))
        })
        .signature("log10(x) -> float"),
        def("sin", 1, Some(1), unary_float("sin", f64::sin)).signature("sin(x) -> float"),
        def("cos", 1, Some(1), unary_float("cos", f64::cos)).signature("cos(x) -> float"),
        def("tan", 1, Some(1), unary_float("tan", f64::tan)).signature("tan(x) -> float"),
        def("radians", 1, Some(1), unary_float("radians", f64::to_radians))
            .signature("radians(degrees) -> float"),
        def("degrees", 1, Some(1), unary_float("degrees", f64::to_degrees))
            .signature("degrees(radians) -> float"),
        def("pow", 2, Some(3), |args| match args.get(2) {
            Some(modulus) => modular_pow(
                int_arg("pow", &args[0])?,
                int_arg("pow", &args[1])?,
                int_arg("pow", modulus)?,
            ),
            None => Ok(operators::binary(
                BinaryOp::Power,
                &args[0],
                &args[1],
                &Limits::default(),
            )?),
        })
        .description("Exponentiation, optionally modulo a third argument")
        .signature("pow(base, exp, mod=None) -> number")
        .example("pow(2, 10) = 1024"),
        def("divmod", 2, Some(2), |args| {
            let limits = Limits::default();
            let quotient = operators::binary(BinaryOp::FloorDivide, &args[0], &args[1], &limits)?;
            let remainder = operators::binary(BinaryOp::Modulo, &args[0], &args[1], &limits)?;
            Ok(Value::Tuple(vec![quotient, remainder]))
        })
        .signature("divmod(a, b) -> tuple"),
        def("sign", 1, Some(1), |args| {
            let sign = match number_arg("sign", &args[0])? {
                Number::Int(i) => i.signum(),
                Number::Float(f) if f > 0.0 => 1,
                Number::Float(f) if f < 0.0 => -1,
                Number::Float(_) => 0,
            };
            Ok(Value::Int(sign))
        })
        .signature("sign(x) -> int"),
        def("clamp", 3, Some(3), |args| {
            let (value, low, high) = (&args[0], &args[1], &args[2]);
            if value.try_cmp(low)?.is_some_and(|o| o.is_lt()) {
                Ok(low.clone())
            } else if value.try_cmp(high)?.is_some_and(|o| o.is_gt()) {
                Ok(high.clone())
            } else {
                Ok(value.clone())
            }
        })
        .description("Limit a value to the range [low, high]")
        .signature("clamp(x, low, high) -> number"),
        def("min", 1, None, |args| extreme("min", args, false))
            .description("Smallest argument, or smallest item of a single iterable")
            .signature("min(*values) -> any")
            .example("min(3, 1, 2) = 1"),
        def("max", 1, None, |args| extreme("max", args, true))
            .description("Largest argument, or largest item of a single iterable")
            .signature("max(*values) -> any")
            .example("max([3, 1, 2]) = 3"),
        def("sum", 1, Some(2), |args| {
            let items = args[0].iterate()?;
            add_all(&items, args.get(1).cloned().unwrap_or(Value::Int(0)))
        })
        .description("Sum of an iterable plus an optional start value")
        .signature("sum(iterable, start=0) -> number")
        .example("sum([1, 2, 3]) = 6"),
        def("avg", 1, None, |args| {
            let items = operands(args)?;
            if items.is_empty() {
                return Err(FunctionError::invalid_argument("avg", "empty sequence"));
            }
            let total = add_all(&items, Value::Int(0))?;
            #[allow(clippy::cast_precision_loss)]
            let count = items.len() as f64;
            Ok(Value::Float(float_arg("avg", &total)? / count))
        })
        .alias("mean")
        .description("Arithmetic mean")
        .signature("avg(*values) -> float")
        .example("avg([1, 2, 3]) = 2.0"),
    ]
}
