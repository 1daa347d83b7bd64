//! DuckDB value conversion

use std::fmt::Write;

use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value, ValueRef};
use quack_ir::ScalarValue;
use serde_json::json;

use crate::ExecutionError;

/// Days from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub(crate) fn to_param(value: &ScalarValue) -> Value {
    match value {
        ScalarValue::Bool(b) => Value::Boolean(*b),
        ScalarValue::Int(i) => Value::BigInt(*i),
        ScalarValue::Float(f) => Value::Double(*f),
        ScalarValue::Text(s) => Value::Text(s.clone()),
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn text(value: String) -> serde_json::Value {
    serde_json::Value::String(value)
}

fn out_of_range(what: &str) -> ExecutionError {
    ExecutionError::UnsupportedValue(format!("{} out of range", what))
}

/// ISO-8601 duration, e.g. `P1Y2M3DT4H5M6.5S`
fn interval_to_iso(months: i32, days: i32, nanos: i64) -> String {
    const NANOS_PER_SECOND: i64 = 1_000_000_000;
    const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
    const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;

    let mut out = String::from("P");
    let (years, months) = (months / 12, months % 12);
    if years != 0 {
        let _ = write!(out, "{}Y", years);
    }
    if months != 0 {
        let _ = write!(out, "{}M", months);
    }
    if days != 0 {
        let _ = write!(out, "{}D", days);
    }

    let hours = nanos / NANOS_PER_HOUR;
    let minutes = (nanos % NANOS_PER_HOUR) / NANOS_PER_MINUTE;
    let seconds = (nanos % NANOS_PER_MINUTE) / NANOS_PER_SECOND;
    let fraction = nanos % NANOS_PER_SECOND;

    if nanos != 0 {
        out.push('T');
        if hours != 0 {
            let _ = write!(out, "{}H", hours);
        }
        if minutes != 0 {
            let _ = write!(out, "{}M", minutes);
        }
        if seconds != 0 || fraction != 0 {
            if fraction < 0 && seconds == 0 {
                out.push('-');
            }
            let _ = write!(out, "{}", seconds);
            if fraction != 0 {
                let digits = format!("{:09}", fraction.unsigned_abs());
                let _ = write!(out, ".{}", digits.trim_end_matches('0'));
            }
            out.push('S');
        }
    }

    if out == "P" {
        "PT0S".to_string()
    } else {
        out
    }
}

/// Convert one result cell to JSON
///
/// Integers that do not fit `i64` and decimals that do not parse as `f64` are
/// rendered as strings. Dates and timestamps become ISO-8601 strings, intervals
/// ISO-8601 durations. Lists, structs and maps convert element by element.
pub(crate) fn to_json(value: ValueRef<'_>) -> Result<serde_json::Value, ExecutionError> {
    match value {
        ValueRef::Text(bytes) => Ok(text(String::from_utf8_lossy(bytes).to_string())),
        ValueRef::Blob(b) => Ok(text(format!("<blob {} bytes>", b.len()))),
        other => from_value(Value::from(other)),
    }
}

fn from_value(value: Value) -> Result<serde_json::Value, ExecutionError> {
    let json = match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(b),
        Value::TinyInt(i) => json!(i),
        Value::SmallInt(i) => json!(i),
        Value::Int(i) => json!(i),
        Value::BigInt(i) => json!(i),
        Value::UTinyInt(i) => json!(i),
        Value::USmallInt(i) => json!(i),
        Value::UInt(i) => json!(i),
        Value::UBigInt(i) => json!(i),
        Value::HugeInt(i) => match i64::try_from(i) {
            Ok(small) => json!(small),
            Err(_) => text(i.to_string()),
        },
        Value::UHugeInt(i) => match u64::try_from(i) {
            Ok(small) => json!(small),
            Err(_) => text(i.to_string()),
        },
        Value::Float(f) => json!(f),
        Value::Double(f) => json!(f),
        Value::Decimal(d) => {
            let rendered = d.to_string();
            match rendered.parse::<f64>() {
                Ok(f) => json!(f),
                Err(_) => text(rendered),
            }
        }
        Value::Text(s) => text(s),
        Value::Blob(b) => text(format!("<blob {} bytes>", b.len())),
        Value::Date32(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(|d| text(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| out_of_range("date"))?,
        Value::Timestamp(unit, v) => DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|ts| text(ts.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .ok_or_else(|| out_of_range("timestamp"))?,
        Value::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            u32::try_from(micros / 1_000_000)
                .ok()
                .and_then(|secs| {
                    let nanos = u32::try_from((micros % 1_000_000) * 1_000).ok()?;
                    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                })
                .map(|t| text(t.format("%H:%M:%S%.f").to_string()))
                .ok_or_else(|| out_of_range("time"))?
        }
        Value::Interval { months, days, nanos } => text(interval_to_iso(months, days, nanos)),
        Value::Enum(label) => text(label),
        Value::List(items) | Value::Array(items) => serde_json::Value::Array(
            items.into_iter().map(from_value).collect::<Result<_, _>>()?,
        ),
        Value::Struct(fields) => {
            let mut object = serde_json::Map::new();
            for (name, field) in fields.iter() {
                object.insert(name.clone(), from_value(field.clone())?);
            }
            serde_json::Value::Object(object)
        }
        Value::Map(entries) => {
            let mut object = serde_json::Map::new();
            for (key, entry) in entries.iter() {
                let key = match from_value(key.clone())? {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                object.insert(key, from_value(entry.clone())?);
            }
            serde_json::Value::Object(object)
        }
        Value::Union(inner) => from_value(*inner)?,
        other => {
            return Err(ExecutionError::UnsupportedValue(format!(
                "no JSON form for {:?}",
                other.data_type()
            )))
        }
    };
    Ok(json)
}
