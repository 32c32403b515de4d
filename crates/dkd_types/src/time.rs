//! Wire timestamps are numeric seconds since the Unix epoch.
//!
//! Producers may write either integer or fractional seconds; both forms are
//! accepted on read. Writing always uses whole seconds.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Read a timestamp value, accepting integer or fractional seconds.
pub fn datetime_from_value(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(seconds) = value.as_i64() {
        return DateTime::from_timestamp(seconds, 0);
    }
    let seconds = value.as_f64()?;
    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
}

/// Encode a timestamp as whole seconds.
pub fn datetime_to_value(when: &DateTime<Utc>) -> Value {
    Value::from(when.timestamp())
}
