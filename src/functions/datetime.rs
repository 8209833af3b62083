//! Date and time functions
//!
//! Dates travel through expressions as ISO-8601 strings. Inputs may also be
//! given in a handful of common layouts (`2024/01/31`, `31-01-2024`,
//! `20240131`, RFC 3339 with offset) or as Unix timestamps, which are read
//! as UTC. Results keep the shape of their input: date arithmetic on a plain
//! date yields a plain date, anything with a time of day yields
//! `YYYY-MM-DDTHH:MM:SS[.ffffff]`.

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{
    DateTime, Datelike, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike,
    Utc,
};

use crate::value::{Value, float_as_integer};

use super::{FunctionCategory, FunctionDefinition, FunctionError, int_arg, str_arg};

fn def<F>(name: &str, min: usize, max: Option<usize>, func: F) -> FunctionDefinition
where
    F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    FunctionDefinition::new(name, FunctionCategory::Datetime, min, max, func)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

/// A parsed point in time and whether it carried a time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Moment {
    at: NaiveDateTime,
    date_only: bool,
}

impl Moment {
    fn datetime(at: NaiveDateTime) -> Self {
        Self {
            at,
            date_only: false,
        }
    }

    fn date(date: NaiveDate) -> Self {
        Self {
            at: date.and_time(NaiveTime::MIN),
            date_only: true,
        }
    }

    fn with_at(self, at: NaiveDateTime) -> Self {
        Self { at, ..self }
    }

    fn render(self) -> Value {
        let text = if self.date_only {
            self.at.format("%Y-%m-%d").to_string()
        } else if self.at.nanosecond() == 0 {
            self.at.format("%Y-%m-%dT%H:%M:%S").to_string()
        } else {
            self.at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
        };
        Value::Str(text)
    }
}

fn parse_text(text: &str) -> Option<Moment> {
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(Moment::datetime(at.naive_local()));
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return parse_compact(text);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(Moment::datetime)
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .map(Moment::date)
        })
}

/// `YYYYMMDD` and `YYYYMMDDHHMMSS`
fn parse_compact(digits: &str) -> Option<Moment> {
    let field = |range: std::ops::Range<usize>| digits.get(range)?.parse::<u32>().ok();
    let year = i32::try_from(field(0..4)?).ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?;
    match digits.len() {
        8 => Some(Moment::date(date)),
        14 => date
            .and_hms_opt(field(8..10)?, field(10..12)?, field(12..14)?)
            .map(Moment::datetime),
        _ => None,
    }
}

fn from_timestamp(seconds: f64) -> Option<Moment> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round();
    let nanos = u32::try_from(float_as_integer(nanos)?).ok()?.min(999_999_999);
    DateTime::<Utc>::from_timestamp(float_as_integer(whole)?, nanos)
        .map(|at| Moment::datetime(at.naive_utc()))
}

fn moment_arg(name: &str, value: &Value) -> Result<Moment, FunctionError> {
    let moment = match value {
        Value::Str(text) => parse_text(text),
        Value::Int(_) | Value::Float(_) => value.as_float().and_then(from_timestamp),
        other => {
            return Err(FunctionError::invalid_argument(
                name,
                format!("cannot convert {} to a datetime", other.type_name()),
            ));
        }
    };
    moment.ok_or_else(|| {
        FunctionError::invalid_argument(name, format!("cannot parse datetime: {}", value.repr()))
    })
}

fn out_of_range(name: &str) -> FunctionError {
    FunctionError::invalid_argument(name, "date value out of range")
}

fn shift(
    name: &str,
    args: &[Value],
    delta: fn(i64) -> Option<TimeDelta>,
) -> Result<Moment, FunctionError> {
    let moment = moment_arg(name, &args[0])?;
    let at = delta(int_arg(name, &args[1])?)
        .and_then(|delta| moment.at.checked_add_signed(delta))
        .ok_or_else(|| out_of_range(name))?;
    Ok(moment.with_at(at))
}

/// Sub-day shifts always produce a datetime
fn shift_time(
    name: &str,
    args: &[Value],
    delta: fn(i64) -> Option<TimeDelta>,
) -> Result<Value, FunctionError> {
    Ok(Moment::datetime(shift(name, args, delta)?.at).render())
}

fn add_months(name: &str, moment: Moment, months: i64) -> Result<Value, FunctionError> {
    let magnitude = u32::try_from(months.unsigned_abs()).map_err(|_| out_of_range(name))?;
    let at = if months >= 0 {
        moment.at.checked_add_months(Months::new(magnitude))
    } else {
        moment.at.checked_sub_months(Months::new(magnitude))
    };
    Ok(moment.with_at(at.ok_or_else(|| out_of_range(name))?).render())
}

fn seconds_between(start: &Moment, end: &Moment) -> f64 {
    let delta = end.at - start.at;
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN)
}

/// Move to `date`, at the start or end of day unless the input was a plain date
fn boundary(moment: Moment, date: NaiveDate, end: bool) -> Value {
    let time = if end && !moment.date_only {
        end_of_day()
    } else {
        NaiveTime::MIN
    };
    moment.with_at(date.and_time(time)).render()
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

fn strftime(name: &str, moment: Moment, format: &str) -> Result<String, FunctionError> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(FunctionError::invalid_argument(
            name,
            format!("invalid format string: '{format}'"),
        ));
    }
    let mut rendered = String::new();
    write!(rendered, "{}", moment.at.format_with_items(items.iter()))
        .map_err(|_| FunctionError::invalid_argument(name, format!("cannot format with '{format}'")))?;
    Ok(rendered)
}

fn strptime(name: &str, text: &str, format: &str) -> Result<Moment, FunctionError> {
    NaiveDateTime::parse_from_str(text, format)
        .map(Moment::datetime)
        .or_else(|_| NaiveDate::parse_from_str(text, format).map(Moment::date))
        .map_err(|err| {
            FunctionError::invalid_argument(
                name,
                format!("'{text}' does not match format '{format}': {err}"),
            )
        })
}

fn component(name: &'static str, extract: fn(&NaiveDateTime) -> i64) -> FunctionDefinition {
    def(name, 1, Some(1), move |args| {
        Ok(Value::Int(extract(&moment_arg(name, &args[0])?.at)))
    })
    .signature(format!("{name}(value) -> int"))
}

fn predicate(name: &'static str, test: fn(&Moment, &Moment) -> bool) -> FunctionDefinition {
    def(name, 2, Some(2), move |args| {
        let left = moment_arg(name, &args[0])?;
        let right = moment_arg(name, &args[1])?;
        Ok(Value::Bool(test(&left, &right)))
    })
    .signature(format!("{name}(value, other) -> bool"))
}

/// Datetime function definitions
#[must_use]
pub fn definitions() -> Vec<FunctionDefinition> {
    vec![
        def("now", 0, Some(0), |_| Ok(Moment::datetime(Local::now().naive_local()).render()))
            .description("Current local date and time")
            .signature("now() -> str"),
        def("utc_now", 0, Some(0), |_| Ok(Moment::datetime(Utc::now().naive_utc()).render()))
            .signature("utc_now() -> str"),
        def("today", 0, Some(0), |_| Ok(Moment::date(Local::now().date_naive()).render()))
            .description("Current local date")
            .signature("today() -> str"),
        def("timestamp", 0, Some(0), |_| {
            let now = Utc::now();
            Ok(Value::Float(
                now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6,
            ))
        })
        .signature("timestamp() -> float"),
        def("date_format", 1, Some(2), |args| {
            let moment = moment_arg("date_format", &args[0])?;
            let format = match args.get(1) {
                Some(format) => str_arg("date_format", format)?,
                None => "%Y-%m-%d %H:%M:%S",
            };
            Ok(Value::Str(strftime("date_format", moment, format)?))
        })
        .description("Render a datetime with a strftime format")
        .signature("date_format(value, format='%Y-%m-%d %H:%M:%S') -> str")
        .example("date_format(\"2024-03-05\", \"%d.%m.%Y\") = \"05.03.2024\""),
        def("date_parse", 1, Some(2), |args| {
            let text = str_arg("date_parse", &args[0])?;
            let format = match args.get(1) {
                Some(format) => str_arg("date_parse", format)?,
                None => "%Y-%m-%d",
            };
            Ok(strptime("date_parse", text, format)?.render())
        })
        .description("Parse text with a strftime format into an ISO-8601 string")
        .signature("date_parse(text, format='%Y-%m-%d') -> str"),
        def("iso_format", 1, Some(1), |args| {
            Ok(Moment::datetime(moment_arg("iso_format", &args[0])?.at).render())
        })
        .signature("iso_format(value) -> str"),
        def("to_timestamp", 1, Some(1), |args| {
            let moment = moment_arg("to_timestamp", &args[0])?;
            let epoch = Moment::datetime(DateTime::<Utc>::UNIX_EPOCH.naive_utc());
            Ok(Value::Float(seconds_between(&epoch, &moment)))
        })
        .description("Seconds since the Unix epoch, reading the value as UTC")
        .signature("to_timestamp(value) -> float"),
        def("from_timestamp", 1, Some(1), |args| {
            let seconds = super::float_arg("from_timestamp", &args[0])?;
            from_timestamp(seconds)
                .map(Moment::render)
                .ok_or_else(|| out_of_range("from_timestamp"))
        })
        .signature("from_timestamp(seconds) -> str"),
        component("year", |at| i64::from(at.year())),
        component("month", |at| i64::from(at.month())),
        component("day", |at| i64::from(at.day())),
        component("hour", |at| i64::from(at.hour())),
        component("minute", |at| i64::from(at.minute())),
        component("second", |at| i64::from(at.second())),
        component("weekday", |at| i64::from(at.weekday().num_days_from_monday()))
            .description("Day of week, Monday = 0"),
        component("isoweekday", |at| i64::from(at.weekday().number_from_monday()))
            .description("Day of week, Monday = 1"),
        component("day_of_year", |at| i64::from(at.ordinal())),
        component("week_of_year", |at| i64::from(at.iso_week().week()))
            .description("ISO-8601 week number"),
        component("quarter", |at| i64::from((at.month() - 1) / 3 + 1)),
        def("add_days", 2, Some(2), |args| Ok(shift("add_days", args, TimeDelta::try_days)?.render()))
            .description("Shift by whole days")
            .signature("add_days(value, days) -> str")
            .example("add_days(\"2024-02-28\", 2) = \"2024-03-01\""),
        def("add_weeks", 2, Some(2), |args| Ok(shift("add_weeks", args, TimeDelta::try_weeks)?.render()))
            .signature("add_weeks(value, weeks) -> str"),
        def("add_hours", 2, Some(2), |args| {
            shift_time("add_hours", args, TimeDelta::try_hours)
        })
        .signature("add_hours(value, hours) -> str"),
        def("add_minutes", 2, Some(2), |args| {
            shift_time("add_minutes", args, TimeDelta::try_minutes)
        })
        .signature("add_minutes(value, minutes) -> str"),
        def("add_seconds", 2, Some(2), |args| {
            shift_time("add_seconds", args, TimeDelta::try_seconds)
        })
        .signature("add_seconds(value, seconds) -> str"),
        def("add_months", 2, Some(2), |args| {
            let moment = moment_arg("add_months", &args[0])?;
            add_months("add_months", moment, int_arg("add_months", &args[1])?)
        })
        .description("Shift by calendar months, clamping to the last day of the month")
        .signature("add_months(value, months) -> str")
        .example("add_months(\"2024-01-31\", 1) = \"2024-02-29\""),
        def("add_years", 2, Some(2), |args| {
            let moment = moment_arg("add_years", &args[0])?;
            let months = int_arg("add_years", &args[1])?
                .checked_mul(12)
                .ok_or_else(|| out_of_range("add_years"))?;
            add_months("add_years", moment, months)
        })
        .signature("add_years(value, years) -> str"),
        def("diff_days", 2, Some(2), |args| {
            let start = moment_arg("diff_days", &args[0])?;
            let end = moment_arg("diff_days", &args[1])?;
            Ok(Value::Int((end.at - start.at).num_days()))
        })
        .description("Whole days from start to end")
        .signature("diff_days(start, end) -> int"),
        def("diff_hours", 2, Some(2), |args| {
            let start = moment_arg("diff_hours", &args[0])?;
            let end = moment_arg("diff_hours", &args[1])?;
            Ok(Value::Float(seconds_between(&start, &end) / 3600.0))
        })
        .signature("diff_hours(start, end) -> float"),
        def("diff_seconds", 2, Some(2), |args| {
            let start = moment_arg("diff_seconds", &args[0])?;
            let end = moment_arg("diff_seconds", &args[1])?;
            Ok(Value::Float(seconds_between(&start, &end)))
        })
        .signature("diff_seconds(start, end) -> float"),
        def("start_of_day", 1, Some(1), |args| {
            let moment = moment_arg("start_of_day", &args[0])?;
            Ok(Moment::datetime(moment.at.date().and_time(NaiveTime::MIN)).render())
        })
        .signature("start_of_day(value) -> str"),
        def("end_of_day", 1, Some(1), |args| {
            let moment = moment_arg("end_of_day", &args[0])?;
            Ok(Moment::datetime(moment.at.date().and_time(end_of_day())).render())
        })
        .signature("end_of_day(value) -> str"),
        def("start_of_week", 1, Some(1), |args| {
            let moment = moment_arg("start_of_week", &args[0])?;
            let date = moment.at.date();
            let offset = TimeDelta::days(i64::from(date.weekday().num_days_from_monday()));
            let monday = date.checked_sub_signed(offset).ok_or_else(|| out_of_range("start_of_week"))?;
            Ok(boundary(moment, monday, false))
        })
        .signature("start_of_week(value) -> str"),
        def("end_of_week", 1, Some(1), |args| {
            let moment = moment_arg("end_of_week", &args[0])?;
            let date = moment.at.date();
            let offset = TimeDelta::days(i64::from(6 - date.weekday().num_days_from_monday()));
            let sunday = date.checked_add_signed(offset).ok_or_else(|| out_of_range("end_of_week"))?;
            Ok(boundary(moment, sunday, true))
        })
        .signature("end_of_week(value) -> str"),
        def("start_of_month", 1, Some(1), |args| {
            let moment = moment_arg("start_of_month", &args[0])?;
            let first = moment.at.date().with_day(1).ok_or_else(|| out_of_range("start_of_month"))?;
            Ok(boundary(moment, first, false))
        })
        .signature("start_of_month(value) -> str"),
        def("end_of_month", 1, Some(1), |args| {
            let moment = moment_arg("end_of_month", &args[0])?;
            let last = last_day_of_month(moment.at.date()).ok_or_else(|| out_of_range("end_of_month"))?;
            Ok(boundary(moment, last, true))
        })
        .signature("end_of_month(value) -> str"),
        def("start_of_year", 1, Some(1), |args| {
            let moment = moment_arg("start_of_year", &args[0])?;
            let first = NaiveDate::from_ymd_opt(moment.at.year(), 1, 1)
                .ok_or_else(|| out_of_range("start_of_year"))?;
            Ok(boundary(moment, first, false))
        })
        .signature("start_of_year(value) -> str"),
        def("end_of_year", 1, Some(1), |args| {
            let moment = moment_arg("end_of_year", &args[0])?;
            let last = NaiveDate::from_ymd_opt(moment.at.year(), 12, 31)
                .ok_or_else(|| out_of_range("end_of_year"))?;
            Ok(boundary(moment, last, true))
        })
        .signature("end_of_year(value) -> str"),
        predicate("is_before", |a, b| a.at < b.at),
        predicate("is_after", |a, b| a.at > b.at),
        predicate("is_same_day", |a, b| a.at.date() == b.at.date()),
        def("is_weekend", 1, Some(1), |args| {
            let moment = moment_arg("is_weekend", &args[0])?;
            Ok(Value::Bool(moment.at.weekday().num_days_from_monday() >= 5))
        })
        .signature("is_weekend(value) -> bool"),
        def("is_leap_year", 1, Some(1), |args| {
            let year = match &args[0] {
                Value::Int(year) => i32::try_from(*year).map_err(|_| out_of_range("is_leap_year"))?,
                other => moment_arg("is_leap_year", other)?.at.year(),
            };
            Ok(Value::Bool(NaiveDate::from_ymd_opt(year, 2, 29).is_some()))
        })
        .description("Whether the year (or the year of a date) is a leap year")
        .signature("is_leap_year(value) -> bool"),
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

    fn s(text: &str) -> Value {
        Value::from(text)
    }

    #[test]
    fn test_parse_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31).map(Moment::date);
        for text in ["2024-01-31", "2024/01/31", "31/01/2024", "31-01-2024", "20240131"] {
            assert_eq!(parse_text(text), expected, "{text}");
        }
        let with_time = parse_text("2024-01-31 08:30:00").map(|m| (m.at.hour(), m.date_only));
        assert_eq!(with_time, Some((8, false)));
        assert_eq!(
            parse_text("2024-01-31T10:00:00+02:00").map(|m| m.at.hour()),
            Some(10)
        );
        assert_eq!(parse_text("20240131083000").map(|m| m.at.minute()), Some(30));
        assert_eq!(parse_text("yesterday"), None);
    }

    #[test]
    fn test_components() -> Result<(), FunctionError> {
        assert_eq!(call("year", &[s("2024-03-05")])?, Value::Int(2024));
        assert_eq!(call("month", &[s("2024-03-05")])?, Value::Int(3));
        assert_eq!(call("day", &[s("2024-03-05")])?, Value::Int(5));
        assert_eq!(call("weekday", &[s("2024-03-04")])?, Value::Int(0));
        assert_eq!(call("quarter", &[s("2024-08-01")])?, Value::Int(3));
        assert_eq!(call("hour", &[Value::Int(3600)])?, Value::Int(1));
        assert!(call("year", &[s("not a date")]).is_err());
        Ok(())
    }

    #[test]
    fn test_arithmetic_keeps_shape() -> Result<(), FunctionError> {
        assert_eq!(call("add_days", &[s("2024-02-28"), Value::Int(2)])?, s("2024-03-01"));
        assert_eq!(
            call("add_days", &[s("2024-02-28T12:00:00"), Value::Int(-1)])?,
            s("2024-02-27T12:00:00")
        );
        assert_eq!(call("add_months", &[s("2024-01-31"), Value::Int(1)])?, s("2024-02-29"));
        assert_eq!(call("add_years", &[s("2024-02-29"), Value::Int(1)])?, s("2025-02-28"));
        assert_eq!(
            call("add_hours", &[s("2024-01-01"), Value::Int(25)])?,
            s("2024-01-02T01:00:00")
        );
        assert_eq!(call("diff_days", &[s("2024-01-01"), s("2024-03-01")])?, Value::Int(60));
        assert_eq!(
            call("diff_hours", &[s("2024-01-01"), s("2024-01-01T06:30:00")])?,
            Value::Float(6.5)
        );
        Ok(())
    }

    #[test]
    fn test_format_and_parse() -> Result<(), FunctionError> {
        assert_eq!(
            call("date_format", &[s("2024-03-05"), s("%d.%m.%Y")])?,
            s("05.03.2024")
        );
        assert_eq!(
            call("date_format", &[s("2024-03-05T07:08:09")])?,
            s("2024-03-05 07:08:09")
        );
        assert!(call("date_format", &[s("2024-03-05"), s("%Q")]).is_err());
        assert_eq!(call("date_parse", &[s("05.03.2024"), s("%d.%m.%Y")])?, s("2024-03-05"));
        assert_eq!(
            call("date_parse", &[s("2024-03-05 10:11"), s("%Y-%m-%d %H:%M")])?,
            s("2024-03-05T10:11:00")
        );
        assert!(call("date_parse", &[s("2024-03-05"), s("%d.%m.%Y")]).is_err());
        assert_eq!(call("from_timestamp", &[Value::Int(0)])?, s("1970-01-01T00:00:00"));
        assert_eq!(call("to_timestamp", &[s("1970-01-02")])?, Value::Float(86400.0));
        Ok(())
    }

    #[test]
    fn test_boundaries_and_predicates() -> Result<(), FunctionError> {
        assert_eq!(call("end_of_month", &[s("2023-02-10")])?, s("2023-02-28"));
        assert_eq!(
            call("end_of_month", &[s("2024-02-10T09:00:00")])?,
            s("2024-02-29T23:59:59.999999")
        );
        assert_eq!(call("start_of_week", &[s("2024-03-07")])?, s("2024-03-04"));
        assert_eq!(call("start_of_day", &[s("2024-03-07T18:00:00")])?, s("2024-03-07T00:00:00"));
        assert_eq!(call("is_before", &[s("2024-01-01"), s("2024-01-02")])?, Value::Bool(true));
        assert_eq!(
            call("is_same_day", &[s("2024-01-01T01:00:00"), s("2024-01-01")])?,
            Value::Bool(true)
        );
        assert_eq!(call("is_weekend", &[s("2024-03-09")])?, Value::Bool(true));
        assert_eq!(call("is_leap_year", &[Value::Int(1900)])?, Value::Bool(false));
        assert_eq!(call("is_leap_year", &[s("2000-06-01")])?, Value::Bool(true));
        Ok(())
    }

    #[test]
    fn test_clock_functions_return_parseable_values() -> Result<(), FunctionError> {
        for name in ["now", "utc_now", "today"] {
            let Value::Str(text) = call(name, &[])? else {
                return Err(FunctionError::new(format!("{name} did not return a string")));
            };
            assert!(parse_text(&text).is_some(), "{name} returned {text}");
        }
        Ok(())
    }
}
