//! Typed row values and their batch-file text encoding

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use pyxis_database::NULL_SENTINEL;
use std::borrow::Cow;
use uuid::Uuid;

/// One generated row, in the column order of its table
pub type Row = Vec<Value>;

/// Scalar value of a generated column
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(serde_json::Value),
    TextArray(Vec<String>),
}

impl Value {
    /// Text form understood by PostgreSQL `COPY ... FORMAT text`
    pub fn encode(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(NULL_SENTINEL),
            Value::Int(value) => Cow::Owned(value.to_string()),
            Value::Float(value) => Cow::Owned(value.to_string()),
            Value::Bool(true) => Cow::Borrowed("true"),
            Value::Bool(false) => Cow::Borrowed("false"),
            Value::Text(value) => Cow::Borrowed(value),
            Value::Uuid(value) => Cow::Owned(value.hyphenated().to_string()),
            Value::Timestamp(value) => {
                Cow::Owned(value.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            Value::Date(value) => Cow::Owned(value.format("%Y-%m-%d").to_string()),
            Value::Json(value) => Cow::Owned(value.to_string()),
            Value::TextArray(values) => Cow::Owned(format!(
                "{{{}}}",
                values
                    .iter()
                    .map(|value| format!("\"{value}\""))
                    .collect::<Vec<_>>()
                    .join(",")
            )),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Json(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Build a [`Row`] from anything convertible into [`Value`]
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::rows::Value::from($value)),*]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_scalar_encoding() {
        assert_eq!(Value::Null.encode(), "NULL");
        assert_eq!(Value::from(42u64).encode(), "42");
        assert_eq!(Value::from(false).encode(), "false");
        assert_eq!(Value::from("retailer_1").encode(), "retailer_1");
        assert_eq!(Value::from(None::<i64>).encode(), "NULL");
    }

    #[test]
    fn test_temporal_encoding() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(Value::from(at).encode(), "2024-03-01T12:30:00.000000Z");
        assert_eq!(Value::from(at.date_naive()).encode(), "2024-03-01");
    }

    #[test]
    fn test_structured_encoding() {
        assert_eq!(
            Value::from(json!({"validity_days": 90})).encode(),
            r#"{"validity_days":90}"#
        );
        assert_eq!(
            Value::TextArray(vec!["campaign_1".into(), "campaign_2".into()]).encode(),
            r#"{"campaign_1","campaign_2"}"#
        );
    }

    #[test]
    fn test_row_macro() {
        let row: Row = row![1u64, "slug", None::<String>, true];
        assert_eq!(
            row,
            vec![
                Value::Int(1),
                Value::Text("slug".into()),
                Value::Null,
                Value::Bool(true)
            ]
        );
    }
}
