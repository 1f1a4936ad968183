//! Dynamic field values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed value stored in an entity field.
///
/// Timestamps are a distinct variant so that date fields compare and sort
/// as instants rather than as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Explicit null.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Ordered list of values.
    List(Vec<FieldValue>),
    /// Nested object with named members.
    Object(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Returns the text if this is a `Text` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the instant if this is a `Timestamp` value.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Integer` value.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns true for `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Float(n)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(ts)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        let now = Utc::now();
        assert_eq!(FieldValue::from("A-12").as_str(), Some("A-12"));
        assert_eq!(FieldValue::from(now).as_timestamp(), Some(now));
        assert_eq!(FieldValue::from(7_i64).as_i64(), Some(7));
        assert_eq!(FieldValue::from(7_i64).as_str(), None);
        assert!(FieldValue::Null.is_null());
    }

    #[test]
    fn vec_converts_to_list() {
        let tags = FieldValue::from(vec!["raps", "linde"]);
        assert_eq!(
            tags,
            FieldValue::List(vec![FieldValue::from("raps"), FieldValue::from("linde")])
        );
    }
}
