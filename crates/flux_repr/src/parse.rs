//! Text to value coercion for the annotated-CSV data kinds.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};

use crate::datatype::DataType;
use crate::error::{ReprError, Result};
use crate::value::Value;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Coerces a raw cell into a typed value.
///
/// An empty cell falls back to the column's `#default` value. If both are
/// empty the result is [`Value::Null`]. Total over [`DataType`]: every kind
/// either produces a value or fails with a coercion error, never panics.
pub fn coerce(raw: &str, datatype: DataType, default: &str) -> Result<Value> {
    let s = if raw.is_empty() { default } else { raw };
    if s.is_empty() {
        return Ok(Value::Null);
    }

    match datatype {
        DataType::String => Ok(Value::String(s.to_string())),
        DataType::Long => s
            .parse::<i64>()
            .map(Value::Long)
            .map_err(|e| coercion_error(s, datatype, e.to_string())),
        DataType::UnsignedLong => s
            .parse::<u64>()
            .map(Value::UnsignedLong)
            .map_err(|e| coercion_error(s, datatype, e.to_string())),
        DataType::Double => parse_double(s).map(Value::Double),
        DataType::Bool => match s {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(coercion_error(
                s,
                datatype,
                "expected literal 'true' or 'false'",
            )),
        },
        DataType::Time => parse_time(s).map(Value::Time),
        DataType::Duration => parse_duration_nanos(s).map(Value::Duration),
        DataType::Base64Binary => BASE64
            .decode(s)
            .map(Value::Bytes)
            .map_err(|e| coercion_error(s, datatype, e.to_string())),
    }
}

fn coercion_error(value: &str, datatype: DataType, reason: impl Into<String>) -> ReprError {
    ReprError::TypeCoercion {
        value: value.to_string(),
        datatype,
        reason: reason.into(),
    }
}

/// Parses a double, accepting the server's spellings for the
/// non-finite values.
fn parse_double(s: &str) -> Result<f64> {
    match s {
        "+Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => s
            .parse::<f64>()
            .map_err(|e| coercion_error(s, DataType::Double, e.to_string())),
    }
}

/// Parses an RFC 3339 timestamp, keeping nanosecond precision.
fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| coercion_error(s, DataType::Time, e.to_string()))
}

/// Parses a duration literal into signed nanoseconds.
///
/// A duration is an optional sign followed by one or more `<integer><unit>`
/// pairs, e.g. `1h30m`, `-2d12h`, `500ms`. Month and year units use fixed
/// 30-day and 365-day magnitudes. Checked arithmetic throughout; overflow is
/// a coercion failure.
pub fn parse_duration_nanos(s: &str) -> Result<i64> {
    let err = |reason: &str| coercion_error(s, DataType::Duration, reason);

    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    if rest.is_empty() {
        return Err(err("empty duration"));
    }

    let bytes = rest.as_bytes();
    let mut total: i64 = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let digits_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == digits_start {
            return Err(err("expected digits before unit"));
        }
        let quantity: i64 = rest[digits_start..idx]
            .parse()
            .map_err(|_| err("quantity out of range"))?;

        let unit_start = idx;
        while idx < bytes.len() && !bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        let unit = &rest[unit_start..idx];
        let unit_nanos = unit_nanos(unit).ok_or_else(|| err("unknown duration unit"))?;

        total = quantity
            .checked_mul(unit_nanos)
            .and_then(|n| total.checked_add(n))
            .ok_or_else(|| err("duration overflows i64 nanoseconds"))?;
    }

    Ok(if negative { -total } else { total })
}

fn unit_nanos(unit: &str) -> Option<i64> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SEC,
        "m" => 60 * NANOS_PER_SEC,
        "h" => 3_600 * NANOS_PER_SEC,
        "d" => 86_400 * NANOS_PER_SEC,
        "w" => 7 * 86_400 * NANOS_PER_SEC,
        "mo" => 30 * 86_400 * NANOS_PER_SEC,
        "y" => 365 * 86_400 * NANOS_PER_SEC,
        _ => return None,
    })
}
