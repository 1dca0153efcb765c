//! Dynamically typed cells read from source relations, plus the lenient
//! conversions every extractor and resolver applies to them.
//!
//! Source extracts went through spreadsheets and CSV exports, so an integer
//! code may arrive as `101`, `101.0`, `"101"`, `" 101 "` or `"\u{feff}101"`,
//! and a missing value as `NULL`, `""`, `"nan"` or `"None"`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A single cell of a source relation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  #[default]
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
}

impl Value {
  /// `true` when the cell carries no usable value: SQL NULL, blank text, or
  /// one of the textual null markers left behind by dataframe exports.
  pub fn is_missing(&self) -> bool {
    match self {
      Self::Null => true,
      Self::Integer(_) => false,
      Self::Real(r) => r.is_nan(),
      Self::Text(t) => is_null_marker(t),
    }
  }

  /// Lenient integer conversion.
  ///
  /// Text is trimmed and stripped of byte-order marks, parsed as a float and
  /// truncated toward zero. Anything unparsable or outside the `i64` range
  /// yields `None`.
  pub fn as_int(&self) -> Option<i64> {
    match self {
      Self::Null => None,
      Self::Integer(i) => Some(*i),
      Self::Real(r) => real_to_int(*r),
      Self::Text(t) => {
        let cleaned = t.replace('\u{feff}', "");
        let cleaned = cleaned.trim();
        if is_null_marker(cleaned) {
          return None;
        }
        if let Ok(i) = cleaned.parse::<i64>() {
          return Some(i);
        }
        cleaned.parse::<f64>().ok().and_then(real_to_int)
      }
    }
  }

  /// Lenient text conversion: trimmed, with null markers mapped to `None`.
  pub fn as_text(&self) -> Option<String> {
    match self {
      Self::Null => None,
      Self::Integer(i) => Some(i.to_string()),
      Self::Real(r) if r.is_nan() => None,
      Self::Real(r) => Some(r.to_string()),
      Self::Text(t) => {
        let trimmed = t.trim();
        if is_null_marker(trimmed) {
          None
        } else {
          Some(trimmed.to_owned())
        }
      }
    }
  }
}

/// A total order over cells: `Null < Integer < Real < Text`, then by value.
/// Used only to break otherwise exact ties deterministically.
pub fn total_cmp(a: &Value, b: &Value) -> Ordering {
  fn rank(v: &Value) -> u8 {
    match v {
      Value::Null => 0,
      Value::Integer(_) => 1,
      Value::Real(_) => 2,
      Value::Text(_) => 3,
    }
  }
  match (a, b) {
    (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
    (Value::Real(x), Value::Real(y)) => x.total_cmp(y),
    (Value::Text(x), Value::Text(y)) => x.cmp(y),
    _ => rank(a).cmp(&rank(b)),
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self { Self::Text(v.to_owned()) }
}

impl From<String> for Value {
  fn from(v: String) -> Self { Self::Text(v) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self { v.map_or(Self::Null, Into::into) }
}

fn is_null_marker(text: &str) -> bool {
  let t = text.trim();
  t.is_empty() || t.eq_ignore_ascii_case("nan") || t.eq_ignore_ascii_case("none")
}

fn real_to_int(r: f64) -> Option<i64> {
  if !r.is_finite() {
    return None;
  }
  let truncated = r.trunc();
  // i64::MAX is not representable as f64; the cast below saturates, so reject
  // anything at or beyond 2^63 explicitly.
  if truncated < -9_223_372_036_854_775_808.0 || truncated >= 9_223_372_036_854_775_808.0 {
    return None;
  }
  Some(truncated as i64)
}

/// Title-case `text` when it is written entirely in upper case; otherwise
/// return it unchanged. Acronym-heavy mixed-case names are left alone.
pub fn title_case_if_upper(text: &str) -> String {
  let mut has_cased = false;
  let all_upper = text.chars().all(|c| {
    if c.is_lowercase() {
      return false;
    }
    if c.is_uppercase() {
      has_cased = true;
    }
    true
  });

  if has_cased && all_upper { title_case(text) } else { text.to_owned() }
}

/// Capitalise the first letter of every alphabetic run and lower-case the rest.
pub fn title_case(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut prev_alpha = false;
  for c in text.chars() {
    if c.is_alphabetic() {
      if prev_alpha {
        out.extend(c.to_lowercase());
      } else {
        out.extend(c.to_uppercase());
      }
      prev_alpha = true;
    } else {
      out.push(c);
      prev_alpha = false;
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn integers_from_messy_text() {
    assert_eq!(Value::from("101").as_int(), Some(101));
    assert_eq!(Value::from(" 101.0 ").as_int(), Some(101));
    assert_eq!(Value::from("\u{feff}7").as_int(), Some(7));
    assert_eq!(Value::from("-3.9").as_int(), Some(-3));
    assert_eq!(Value::Real(2.0).as_int(), Some(2));
  }

  #[test]
  fn null_markers_are_missing() {
    for raw in ["", "  ", "nan", "NaN", "None", "none"] {
      let v = Value::from(raw);
      assert!(v.is_missing(), "{raw:?} should be missing");
      assert_eq!(v.as_int(), None);
      assert_eq!(v.as_text(), None);
    }
    assert!(Value::Null.is_missing());
    assert!(Value::Real(f64::NAN).is_missing());
    assert!(!Value::Integer(0).is_missing());
  }

  #[test]
  fn unparsable_and_out_of_range_integers() {
    assert_eq!(Value::from("abc").as_int(), None);
    assert_eq!(Value::from("1e30").as_int(), None);
    assert_eq!(Value::Real(f64::INFINITY).as_int(), None);
  }

  #[test]
  fn text_is_trimmed() {
    assert_eq!(Value::from("  Bogotá ").as_text().as_deref(), Some("Bogotá"));
    assert_eq!(Value::Integer(5).as_text().as_deref(), Some("5"));
  }

  #[test]
  fn title_case_only_applies_to_all_caps() {
    assert_eq!(title_case_if_upper("UNIVERSIDAD DE ANTIOQUIA"), "Universidad De Antioquia");
    assert_eq!(title_case_if_upper("Universidad EAFIT"), "Universidad EAFIT");
    assert_eq!(title_case_if_upper("MAESTRÍA"), "Maestría");
    assert_eq!(title_case_if_upper("123"), "123");
  }

  #[test]
  fn title_case_restarts_after_punctuation() {
    assert_eq!(title_case("SAN JOSÉ-DEL GUAVIARE"), "San José-Del Guaviare");
    assert_eq!(title_case("DE 'A' B"), "De 'A' B");
  }
}
