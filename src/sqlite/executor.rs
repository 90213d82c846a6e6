use rusqlite::Connection;

use super::params::Params;
use super::query::{build_result_set, build_update_result, inserts_rows};
use crate::error::SqlConduitError;
use crate::results::SqlResult;
use crate::types::RowValues;

const BATCH_SAVEPOINT: &str = "sql_conduit_batch";

/// Run a query and load every row.
///
/// # Errors
/// Returns `SqlConduitError::DataAccess` if preparation or execution fails.
pub fn select(
    conn: &Connection,
    query: &str,
    params: &[RowValues],
) -> Result<SqlResult, SqlConduitError> {
    let params = Params::convert(params);
    let mut stmt = conn.prepare_cached(query)?;
    build_result_set(&mut stmt, params.as_values())
}

/// Run one DML statement and report affected rows and generated key.
///
/// # Errors
/// Returns `SqlConduitError::DataAccess` if preparation or execution fails.
pub fn update(
    conn: &Connection,
    query: &str,
    params: &[RowValues],
) -> Result<SqlResult, SqlConduitError> {
    let params = Params::convert(params);
    let mut stmt = conn.prepare_cached(query)?;
    build_update_result(conn, &mut stmt, params.as_values(), inserts_rows(query))
}

/// Run one DML statement once per parameter set on a single prepared statement,
/// returning one update result per set.
///
/// # Errors
/// Returns `SqlConduitError::DataAccess` on the first failing set; earlier sets
/// stay applied.
pub fn update_each(
    conn: &Connection,
    query: &str,
    param_sets: &[Vec<RowValues>],
) -> Result<Vec<SqlResult>, SqlConduitError> {
    let inserts = inserts_rows(query);
    let mut stmt = conn.prepare_cached(query)?;
    let mut results = Vec::with_capacity(param_sets.len());
    for params in param_sets {
        let params = Params::convert(params);
        results.push(build_update_result(conn, &mut stmt, params.as_values(), inserts)?);
    }
    Ok(results)
}

/// Run a batched update in sub-batches of `batch_size` parameter sets.
///
/// Each sub-batch runs inside its own savepoint, so it is applied entirely or
/// not at all. Per-row counts are returned in input order.
///
/// # Errors
/// Returns `SqlConduitError::Config` for a zero batch size and
/// `SqlConduitError::Batch` when a sub-batch fails; `completed` then holds the
/// counts of the sub-batches applied before it.
pub fn update_batch(
    conn: &Connection,
    query: &str,
    param_sets: &[Vec<RowValues>],
    batch_size: usize,
) -> Result<Vec<u64>, SqlConduitError> {
    if batch_size == 0 {
        return Err(SqlConduitError::Config(
            "batch size must be at least 1".into(),
        ));
    }

    let mut counts = Vec::with_capacity(param_sets.len());
    for (index, chunk) in param_sets.chunks(batch_size).enumerate() {
        tracing::trace!(sub_batch = index, rows = chunk.len(), "running sub-batch");

        if let Err(source) = conn.execute_batch(&format!("SAVEPOINT {BATCH_SAVEPOINT}")) {
            return Err(SqlConduitError::Batch {
                completed: counts,
                source,
            });
        }

        let outcome = run_sub_batch(conn, query, chunk).and_then(|chunk_counts| {
            conn.execute_batch(&format!("RELEASE SAVEPOINT {BATCH_SAVEPOINT}"))?;
            Ok(chunk_counts)
        });

        match outcome {
            Ok(chunk_counts) => counts.extend(chunk_counts),
            Err(source) => {
                let undo = format!(
                    "ROLLBACK TO SAVEPOINT {BATCH_SAVEPOINT}; RELEASE SAVEPOINT {BATCH_SAVEPOINT};"
                );
                if let Err(undo_err) = conn.execute_batch(&undo) {
                    tracing::warn!(sub_batch = index, error = %undo_err, "failed to undo sub-batch");
                }
                return Err(SqlConduitError::Batch {
                    completed: counts,
                    source,
                });
            }
        }
    }
    Ok(counts)
}

fn run_sub_batch(
    conn: &Connection,
    query: &str,
    chunk: &[Vec<RowValues>],
) -> rusqlite::Result<Vec<u64>> {
    let mut stmt = conn.prepare_cached(query)?;
    let mut counts = Vec::with_capacity(chunk.len());
    for params in chunk {
        let params = Params::convert(params);
        let affected = stmt.execute(rusqlite::params_from_iter(params.as_values().iter()))?;
        counts.push(affected as u64);
    }
    Ok(counts)
}

/// Run a multi-statement script without parameters.
///
/// # Errors
/// Returns `SqlConduitError::DataAccess` if any statement fails.
pub fn execute_script(conn: &Connection, script: &str) -> Result<(), SqlConduitError> {
    conn.execute_batch(script)?;
    Ok(())
}
