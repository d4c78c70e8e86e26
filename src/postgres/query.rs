use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use tokio_postgres::Column;

use crate::error::SqlTemplateError;
use crate::results::ResultSet;
use crate::types::Value;

/// Extract a `Value` from a Postgres row.
///
/// # Errors
/// Returns `SqlTemplateError::PostgresError` if the column cannot be decoded.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<Value, SqlTemplateError> {
    let type_info = row.columns()[idx].type_();

    match type_info.name() {
        "int2" => {
            let val: Option<i16> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, |v| Value::Int(i64::from(v))))
        }
        "int4" => {
            let val: Option<i32> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, |v| Value::Int(i64::from(v))))
        }
        "int8" => {
            let val: Option<i64> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Int))
        }
        "float4" => {
            let val: Option<f32> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, |v| Value::Float(f64::from(v))))
        }
        "float8" => {
            let val: Option<f64> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Float))
        }
        "bool" => {
            let val: Option<bool> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Bool))
        }
        "timestamp" => {
            let val: Option<NaiveDateTime> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Timestamp))
        }
        "timestamptz" => {
            let val: Option<DateTime<Utc>> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, |v| Value::TimestampTz(v.fixed_offset())))
        }
        "json" | "jsonb" => {
            let val: Option<JsonValue> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Json))
        }
        "bytea" => {
            let val: Option<Vec<u8>> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Blob))
        }
        // text, varchar, bpchar, name and anything else readable as a string
        _ => {
            let val: Option<String> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Text))
        }
    }
}

/// Build a result set from raw Postgres rows.
///
/// Column names come from the prepared statement, so an empty result still has them.
///
/// # Errors
/// Returns errors from value extraction.
pub fn build_result_set_from_rows(
    columns: &[Column],
    rows: &[tokio_postgres::Row],
) -> Result<ResultSet, SqlTemplateError> {
    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(Arc::new(column_names(columns)));

    for row in rows {
        let col_count = row.columns().len();
        let mut values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            values.push(postgres_extract_value(row, i)?);
        }
        result_set.add_row_values(values);
    }

    Ok(result_set)
}

fn column_names(columns: &[Column]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}
