//! Permissive numeric coercion for telemetry fields.
//!
//! The device firmware is not strict about types: counters sometimes arrive
//! as floats, flags as booleans and values as strings. Each helper returns
//! `None` when a value cannot be coerced so the caller can skip just that
//! field.

use serde_json::Value;

/// Coerce a JSON value to an integral gauge value.
///
/// Integers pass through, finite floats are truncated toward zero, booleans
/// become 0/1 and strings are parsed as base-10 integers after trimming.
/// Magnitudes beyond `i64` are kept at `f64` precision.
pub fn to_integer(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(f64::trunc),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => parse_integer(s.trim()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Coerce a JSON value to a float.
///
/// Any JSON number passes through, booleans become 0/1 and strings are parsed
/// as floats after trimming.
pub fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_integer(s: &str) -> Option<f64> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(i as f64);
    }
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok()
}
