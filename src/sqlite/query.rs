use std::sync::Arc;

use rusqlite::types::Value as SqliteValue;
use rusqlite::{Connection, params_from_iter};

use crate::error::SqlTemplateError;
use crate::results::ResultSet;
use crate::types::Value;

/// Extract a `Value` from a `SQLite` row.
///
/// # Errors
/// Returns `SqlTemplateError::SqliteError` if the column cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<Value, SqlTemplateError> {
    let value: SqliteValue = row.get(idx)?;
    Ok(match value {
        SqliteValue::Null => Value::Null,
        SqliteValue::Integer(i) => Value::Int(i),
        SqliteValue::Real(f) => Value::Float(f),
        SqliteValue::Text(s) => Value::Text(s),
        SqliteValue::Blob(b) => Value::Blob(b),
    })
}

/// Run a statement and materialize its rows.
///
/// # Errors
/// Returns `SqlTemplateError::SqliteError` if preparing or stepping the statement fails.
pub fn query_statement(
    conn: &Connection,
    sql: &str,
    params: &[SqliteValue],
) -> Result<ResultSet, SqlTemplateError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            values.push(sqlite_extract_value(row, i)?);
        }
        result_set.add_row_values(values);
    }

    Ok(result_set)
}

/// Run a statement that returns no rows.
///
/// # Errors
/// Returns `SqlTemplateError::SqliteError` if execution fails.
pub fn execute_statement(
    conn: &Connection,
    sql: &str,
    params: &[SqliteValue],
) -> Result<usize, SqlTemplateError> {
    let mut stmt = conn.prepare_cached(sql)?;
    Ok(stmt.execute(params_from_iter(params.iter()))?)
}
