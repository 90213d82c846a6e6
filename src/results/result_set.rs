use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::row::{ColumnIndex, Row, build_column_index};
use crate::types::RowValues;

/// Eagerly loaded outcome of one statement.
///
/// A query result carries column names and every fetched row. An update result
/// carries the affected row count and any generated keys; it has no columns.
#[derive(Debug, Clone, Default)]
pub struct SqlResult {
    column_names: Arc<Vec<String>>,
    column_index: Option<ColumnIndex>,
    rows: Vec<Row>,
    row_count: usize,
    ids: Vec<i64>,
    update: bool,
}

impl SqlResult {
    /// Empty query result with the given columns; rows are appended with
    /// [`SqlResult::add_row_values`].
    #[must_use]
    pub fn with_columns(column_names: Vec<String>, capacity: usize) -> Self {
        let column_index = build_column_index(&column_names);
        Self {
            column_names: Arc::new(column_names),
            column_index: Some(column_index),
            rows: Vec::with_capacity(capacity),
            row_count: 0,
            ids: Vec::new(),
            update: false,
        }
    }

    /// Update result: affected rows plus generated keys.
    #[must_use]
    pub fn for_update(rows_affected: usize, ids: Vec<i64>) -> Self {
        Self {
            row_count: rows_affected,
            ids,
            update: true,
            ..Self::default()
        }
    }

    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        let index = self
            .column_index
            .get_or_insert_with(|| build_column_index(&self.column_names))
            .clone();
        self.rows
            .push(Row::from_shared(Arc::clone(&self.column_names), index, values));
        self.row_count += 1;
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Fetched rows for a query, affected rows for an update.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    #[must_use]
    pub fn is_update(&self) -> bool {
        self.update
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// First row, if any.
    #[must_use]
    pub fn row(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// First generated key, or 0 when none was produced.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.ids.first().copied().unwrap_or(0)
    }

    #[must_use]
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Rows as a JSON array of objects; update results render as
    /// `{"rows_affected": n, "ids": [...]}`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        if self.update {
            serde_json::json!({
                "rows_affected": self.row_count,
                "ids": self.ids,
            })
        } else {
            JsonValue::Array(self.rows.iter().map(Row::to_json).collect())
        }
    }
}

impl<'a> IntoIterator for &'a SqlResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl IntoIterator for SqlResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
