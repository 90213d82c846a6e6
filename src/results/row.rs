use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::types::RowValues;

/// Case-insensitive column name → position lookup shared by every row of a result.
pub(crate) type ColumnIndex = Arc<HashMap<String, usize>>;

pub(crate) fn build_column_index(column_names: &[String]) -> ColumnIndex {
    let mut index = HashMap::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        // First occurrence wins for duplicate names (e.g. joined tables).
        index.entry(name.to_ascii_lowercase()).or_insert(i);
    }
    Arc::new(index)
}

/// One fetched row.
///
/// Values are positioned 0-based in select-list order. Name lookups ignore ASCII
/// case. Typed getters return `None` for missing columns, NULLs, and values that
/// cannot be converted.
#[derive(Debug, Clone)]
pub struct Row {
    column_names: Arc<Vec<String>>,
    values: Vec<RowValues>,
    column_index: ColumnIndex,
}

impl Row {
    /// Build a standalone row. Result sets share the column metadata across rows
    /// instead; this is for tests and hand-built rows.
    #[must_use]
    pub fn new(column_names: Vec<String>, values: Vec<RowValues>) -> Self {
        let column_index = build_column_index(&column_names);
        Self {
            column_names: Arc::new(column_names),
            values,
            column_index,
        }
    }

    pub(crate) fn from_shared(
        column_names: Arc<Vec<String>>,
        column_index: ColumnIndex,
        values: Vec<RowValues>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of a column, ignoring ASCII case.
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index.get(column_name) {
            return Some(idx);
        }
        self.column_index
            .get(&column_name.to_ascii_lowercase())
            .copied()
    }

    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Value at a 0-based position.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    /// True when the column is NULL or does not exist.
    #[must_use]
    pub fn is_null(&self, column_name: &str) -> bool {
        self.get(column_name).is_none_or(RowValues::is_null)
    }

    #[must_use]
    pub fn is_null_at(&self, index: usize) -> bool {
        self.get_by_index(index).is_none_or(RowValues::is_null)
    }

    #[must_use]
    pub fn get_bool(&self, column_name: &str) -> Option<bool> {
        self.get(column_name).and_then(RowValues::as_bool)
    }

    #[must_use]
    pub fn get_bool_at(&self, index: usize) -> Option<bool> {
        self.get_by_index(index).and_then(RowValues::as_bool)
    }

    #[must_use]
    pub fn get_i64(&self, column_name: &str) -> Option<i64> {
        self.get(column_name).and_then(to_i64)
    }

    #[must_use]
    pub fn get_i64_at(&self, index: usize) -> Option<i64> {
        self.get_by_index(index).and_then(to_i64)
    }

    /// Narrowing read; `None` if the stored integer does not fit.
    #[must_use]
    pub fn get_i32(&self, column_name: &str) -> Option<i32> {
        self.get_i64(column_name).and_then(|v| i32::try_from(v).ok())
    }

    #[must_use]
    pub fn get_i32_at(&self, index: usize) -> Option<i32> {
        self.get_i64_at(index).and_then(|v| i32::try_from(v).ok())
    }

    #[must_use]
    pub fn get_f64(&self, column_name: &str) -> Option<f64> {
        self.get(column_name).and_then(to_f64)
    }

    #[must_use]
    pub fn get_f64_at(&self, index: usize) -> Option<f64> {
        self.get_by_index(index).and_then(to_f64)
    }

    #[must_use]
    pub fn get_string(&self, column_name: &str) -> Option<String> {
        self.get(column_name).and_then(to_string)
    }

    #[must_use]
    pub fn get_string_at(&self, index: usize) -> Option<String> {
        self.get_by_index(index).and_then(to_string)
    }

    /// Blob contents, or the UTF-8 bytes of a text value.
    #[must_use]
    pub fn get_bytes(&self, column_name: &str) -> Option<Vec<u8>> {
        self.get(column_name).and_then(to_bytes)
    }

    #[must_use]
    pub fn get_bytes_at(&self, index: usize) -> Option<Vec<u8>> {
        self.get_by_index(index).and_then(to_bytes)
    }

    #[must_use]
    pub fn get_timestamp(&self, column_name: &str) -> Option<NaiveDateTime> {
        self.get(column_name).and_then(RowValues::as_timestamp)
    }

    #[must_use]
    pub fn get_timestamp_at(&self, index: usize) -> Option<NaiveDateTime> {
        self.get_by_index(index).and_then(RowValues::as_timestamp)
    }

    /// Stored JSON, or text parsed as JSON.
    #[must_use]
    pub fn get_json(&self, column_name: &str) -> Option<JsonValue> {
        self.get(column_name).and_then(to_json)
    }

    /// The row as a JSON object keyed by column name.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .column_names
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        JsonValue::Object(map)
    }
}

fn to_i64(value: &RowValues) -> Option<i64> {
    match value {
        RowValues::Int(i) => Some(*i),
        RowValues::Bool(b) => Some(i64::from(*b)),
        #[allow(clippy::cast_possible_truncation)]
        RowValues::Float(f) => Some(*f as i64),
        RowValues::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_f64(value: &RowValues) -> Option<f64> {
    match value {
        RowValues::Float(f) => Some(*f),
        #[allow(clippy::cast_precision_loss)]
        RowValues::Int(i) => Some(*i as f64),
        RowValues::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        RowValues::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_string(value: &RowValues) -> Option<String> {
    match value {
        RowValues::Null => None,
        RowValues::Text(s) => Some(s.clone()),
        RowValues::Int(i) => Some(i.to_string()),
        RowValues::Float(f) => Some(f.to_string()),
        RowValues::Bool(b) => Some(b.to_string()),
        RowValues::Timestamp(dt) => Some(dt.format("%F %T%.f").to_string()),
        RowValues::JSON(v) => Some(v.to_string()),
        RowValues::Blob(bytes) => String::from_utf8(bytes.clone()).ok(),
    }
}

fn to_bytes(value: &RowValues) -> Option<Vec<u8>> {
    match value {
        RowValues::Blob(bytes) => Some(bytes.clone()),
        RowValues::Text(s) => Some(s.as_bytes().to_vec()),
        _ => None,
    }
}

fn to_json(value: &RowValues) -> Option<JsonValue> {
    match value {
        RowValues::JSON(v) => Some(v.clone()),
        RowValues::Text(s) => serde_json::from_str(s).ok(),
        RowValues::Null => None,
        other => Some(other.to_json()),
    }
}
