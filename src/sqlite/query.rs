use rusqlite::types::Value;
use rusqlite::{Connection, Statement};

use super::params::sqlite_value_to_row_value;
use crate::error::SqlConduitError;
use crate::results::SqlResult;

/// Run a prepared query and load every row into a `SqlResult`.
///
/// # Errors
/// Returns `SqlConduitError::DataAccess` if binding, stepping or reading a column fails.
pub fn build_result_set(
    stmt: &mut Statement<'_>,
    params: &[Value],
) -> Result<SqlResult, SqlConduitError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut result_set = SqlResult::with_columns(column_names, 10);
    let mut rows_iter = stmt.query(rusqlite::params_from_iter(params.iter()))?;

    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let value: Value = row.get(i)?;
            row_values.push(sqlite_value_to_row_value(value));
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Whether `query` starts with `INSERT` or `REPLACE`, ignoring case and
/// leading whitespace.
pub(crate) fn inserts_rows(query: &str) -> bool {
    let keyword: String = query
        .trim_start()
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    keyword.eq_ignore_ascii_case("insert") || keyword.eq_ignore_ascii_case("replace")
}

/// Execute a prepared DML statement and capture its generated key.
///
/// SQLite reports generated keys through `last_insert_rowid`, shared by every
/// table on the connection; it is recorded for inserting statements that
/// changed at least one row.
///
/// # Errors
/// Returns `SqlConduitError::DataAccess` if execution fails.
pub fn build_update_result(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    params: &[Value],
    inserts: bool,
) -> Result<SqlResult, SqlConduitError> {
    let affected = stmt.execute(rusqlite::params_from_iter(params.iter()))?;
    let ids = if inserts && affected > 0 {
        vec![conn.last_insert_rowid()]
    } else {
        Vec::new()
    };
    Ok(SqlResult::for_update(affected, ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_keyword_decides_insert() {
        assert!(inserts_rows("INSERT INTO t VALUES (1)"));
        assert!(inserts_rows("  \n insert or ignore into t values (1)"));
        assert!(inserts_rows("Replace INTO t VALUES (1)"));
        assert!(!inserts_rows("UPDATE t SET a = 1"));
        assert!(!inserts_rows("DELETE FROM inserts"));
        assert!(!inserts_rows("INSERTED"));
    }
}
