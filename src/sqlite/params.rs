use rusqlite::types::Value as SqliteValue;

use crate::binder::{BoundParams, normalize};
use crate::types::Value;

/// Convert a single `Value` to a rusqlite `Value`.
#[must_use]
pub fn value_to_sqlite(value: &Value) -> SqliteValue {
    match normalize(value) {
        Value::Int(i) => SqliteValue::Integer(i),
        Value::Float(f) => SqliteValue::Real(f),
        Value::Text(s) => SqliteValue::Text(s),
        Value::Bool(b) => SqliteValue::Integer(i64::from(b)),
        Value::Timestamp(dt) => SqliteValue::Text(dt.format("%F %T%.f").to_string()),
        Value::TimestampTz(dt) => SqliteValue::Text(dt.naive_utc().format("%F %T%.f").to_string()),
        Value::Null => SqliteValue::Null,
        Value::Json(json) => SqliteValue::Text(json.to_string()),
        Value::Blob(bytes) => SqliteValue::Blob(bytes),
    }
}

/// `SQLite` parameters in statement order.
///
/// `SQLite` templates compile to `?` placeholders, so named parameters are bound by
/// position as well.
#[derive(Debug, Clone, PartialEq)]
pub struct Params(pub Vec<SqliteValue>);

impl Params {
    #[must_use]
    pub fn convert(params: &BoundParams) -> Self {
        Params(params.values().into_iter().map(value_to_sqlite).collect())
    }

    #[must_use]
    pub fn as_values(&self) -> &[SqliteValue] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn converts_values() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 3)
            .unwrap()
            .and_hms_milli_opt(4, 5, 6, 7)
            .unwrap();
        let bound = BoundParams::Named(vec![
            ("a".into(), Value::Bool(true)),
            ("b".into(), Value::Timestamp(ts)),
            ("c".into(), Value::Json(serde_json::json!({"k": 1}))),
        ]);
        assert_eq!(
            Params::convert(&bound).0,
            vec![
                SqliteValue::Integer(1),
                SqliteValue::Text("2024-02-03 04:05:06.007".into()),
                SqliteValue::Text(r#"{"k":1}"#.into()),
            ]
        );
    }
}
