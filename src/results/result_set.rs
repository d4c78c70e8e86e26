use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use crate::types::Value;

use super::row::{Row, index_columns};

/// Rows returned by a query.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub results: Vec<Row>,
    /// Rows returned by a query, or rows changed by a DML statement.
    pub rows_affected: usize,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Set the column names shared by all rows added afterwards.
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Arc::new(index_columns(&column_names));
        self.column_names = column_names;
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn add_row_values(&mut self, values: Vec<Value>) {
        self.results.push(Row::with_index(
            Arc::clone(&self.column_names),
            Arc::clone(&self.column_index),
            values,
        ));
        self.rows_affected += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Take the first row, dropping the rest.
    #[must_use]
    pub fn into_first(self) -> Option<Row> {
        self.results.into_iter().next()
    }

    /// Render the rows as a padded text table for debugging.
    ///
    /// Every column is as wide as its name plus `padding`. Values longer than `padding`
    /// are cut with `...`, except in the last column.
    #[must_use]
    pub fn to_table_string(&self, padding: usize) -> String {
        let widths: Vec<usize> = self
            .column_names
            .iter()
            .map(|name| padding + name.chars().count())
            .collect();
        let rule = "-".repeat(widths.iter().sum());

        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        for (name, width) in self.column_names.iter().zip(&widths) {
            let _ = write!(out, "{name:<width$}");
        }
        let _ = writeln!(out, "\n{rule}");

        let last = widths.len().saturating_sub(1);
        for row in &self.results {
            for (i, width) in widths.iter().enumerate() {
                let text = row.get_by_index(i).map_or_else(String::new, display_value);
                let mut cell = format!("{text:<width$}");
                if i != last && text.chars().count() > padding {
                    cell = cell.chars().take(width.saturating_sub(3)).collect();
                    cell.push_str("...");
                }
                out.push_str(&cell);
            }
            out.push('\n');
        }

        let _ = write!(out, "{rule}\n({} rows)\n", self.results.len());
        out
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Timestamp(ts) => ts.to_string(),
        Value::TimestampTz(ts) => ts.to_rfc3339(),
        Value::Json(json) => json.to_string(),
        Value::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}
