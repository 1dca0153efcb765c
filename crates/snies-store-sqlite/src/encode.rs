//! Conversions between [`snies_core::value::Value`] and SQLite values, plus
//! the timestamp format stored in `created_at`/`updated_at`.

use chrono::{DateTime, Utc};
use rusqlite::types::{Value as SqlValue, ValueRef};
use snies_core::value::Value;

/// `YYYY-MM-DD HH:MM:SS`, UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn encode_timestamp(dt: DateTime<Utc>) -> String { dt.format(TIMESTAMP_FORMAT).to_string() }

pub fn encode_value(v: &Value) -> SqlValue {
  match v {
    Value::Null => SqlValue::Null,
    Value::Integer(i) => SqlValue::Integer(*i),
    Value::Real(r) => SqlValue::Real(*r),
    Value::Text(t) => SqlValue::Text(t.clone()),
  }
}

/// Source cells are read as-is; blobs are decoded as lossy UTF-8 text.
pub fn decode_value(v: ValueRef<'_>) -> Value {
  match v {
    ValueRef::Null => Value::Null,
    ValueRef::Integer(i) => Value::Integer(i),
    ValueRef::Real(r) => Value::Real(r),
    ValueRef::Text(t) | ValueRef::Blob(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamp_has_no_offset() {
    let dt = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
    assert_eq!(encode_timestamp(dt), "2024-03-09 07:05:01");
  }

  #[test]
  fn blobs_become_text() {
    assert_eq!(decode_value(ValueRef::Blob(b"101")), Value::from("101"));
    assert_eq!(decode_value(ValueRef::Real(1.5)), Value::Real(1.5));
    assert_eq!(encode_value(&Value::Null), SqlValue::Null);
  }
}
