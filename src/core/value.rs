//! Conversions between JSON document values and engine bind values.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use rusqlite::types::Value as SqlValue;
use serde_json::Value as JsonValue;

/// Fixed-width ISO-8601 layout. Every timestamp written by this crate uses it,
/// so stored dates compare correctly as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Renders a timestamp as fixed-width ISO-8601 text.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current time, truncated to the precision timestamps are stored with, so an
/// in-memory stamp equals the one read back.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Parses text written by [`format_timestamp`]. RFC 3339 input is accepted too.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// JSON operand for date predicates, e.g. `less_than("due", timestamp_value(now), false)`.
pub fn timestamp_value(at: DateTime<Utc>) -> JsonValue {
    JsonValue::String(format_timestamp(&at))
}

/// Converts a JSON operand into the value bound to a statement parameter.
///
/// Scalars map onto the engine's native types, matching what `json_extract`
/// yields for the same stored value. Arrays and objects bind as their compact
/// JSON text.
pub fn json_to_sql(value: &JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Text(n.to_string())
            }
        }
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Canonical text form used for structural equality of lists and maps.
pub fn canonical_json(value: &JsonValue) -> String {
    value.to_string()
}
