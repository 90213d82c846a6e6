use crate::error::{Result, SqlConduitError};
use crate::mapping::FromRow;
use crate::results::{Row, SqlResult};
use crate::sqlite::executor;
use crate::types::RowValues;

/// Sub-batch size used when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Statement operations shared by a bare [`Connection`](crate::Connection)
/// (auto-commit) and an open [`Transaction`](crate::Transaction).
///
/// Implementors only decide whether a statement may run right now and which
/// driver connection it runs on; every operation is provided on top of that.
pub trait SqlCallable {
    /// Run `f` on the driver connection if statements are currently allowed.
    ///
    /// # Errors
    /// Returns `SqlConduitError::InvalidState` when the caller is closed,
    /// finished, or shadowed by an open transaction, plus whatever `f` returns.
    fn with_driver<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T>;

    /// Default sub-batch size for the batch operations.
    fn batch_size(&self) -> usize;

    /// Run a query and return every row.
    ///
    /// # Errors
    /// `InvalidState` if statements cannot run, `DataAccess` if the query fails.
    fn get_result(&self, query: &str, params: &[RowValues]) -> Result<SqlResult> {
        self.with_driver(|conn| executor::select(conn, query, params))
    }

    /// Run a query and return its first row, or `None` when it returned nothing.
    ///
    /// # Errors
    /// As [`SqlCallable::get_result`].
    fn get_row(&self, query: &str, params: &[RowValues]) -> Result<Option<Row>> {
        Ok(self.get_result(query, params)?.into_rows().into_iter().next())
    }

    /// # Errors
    /// As [`SqlCallable::get_result`], plus `Mapping` from `T::from_row`.
    fn get_row_as<T: FromRow>(&self, query: &str, params: &[RowValues]) -> Result<Option<T>> {
        self.get_row(query, params)?
            .map(|row| T::from_row(&row))
            .transpose()
    }

    /// # Errors
    /// As [`SqlCallable::get_result`], plus `Mapping` from `T::from_row`.
    fn get_result_as<T: FromRow>(&self, query: &str, params: &[RowValues]) -> Result<Vec<T>> {
        self.get_result(query, params)?
            .iter()
            .map(T::from_row)
            .collect()
    }

    /// # Errors
    /// As [`SqlCallable::get_result`], plus whatever `map` returns.
    fn get_row_with<T, F>(&self, query: &str, params: &[RowValues], map: F) -> Result<Option<T>>
    where
        F: FnOnce(&Row) -> Result<T>,
    {
        self.get_row(query, params)?.map(|row| map(&row)).transpose()
    }

    /// # Errors
    /// As [`SqlCallable::get_result`], plus whatever `map` returns.
    fn get_result_with<T, F>(&self, query: &str, params: &[RowValues], map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row) -> Result<T>,
    {
        self.get_result(query, params)?.iter().map(map).collect()
    }

    /// Run an INSERT/UPDATE/DELETE (or other row-less statement); the result
    /// carries the affected row count and any generated key.
    ///
    /// # Errors
    /// `InvalidState` if statements cannot run, `DataAccess` if execution fails.
    fn get_update_result(&self, query: &str, params: &[RowValues]) -> Result<SqlResult> {
        self.with_driver(|conn| executor::update(conn, query, params))
    }

    /// Batched update in sub-batches of [`SqlCallable::batch_size`].
    ///
    /// # Errors
    /// As [`SqlCallable::get_update_large_batch_with_size`].
    fn get_update_batch(&self, query: &str, param_sets: &[Vec<RowValues>]) -> Result<Vec<usize>> {
        self.get_update_batch_with_size(query, self.batch_size(), param_sets)
    }

    /// # Errors
    /// As [`SqlCallable::get_update_large_batch_with_size`].
    fn get_update_batch_with_size(
        &self,
        query: &str,
        batch_size: usize,
        param_sets: &[Vec<RowValues>],
    ) -> Result<Vec<usize>> {
        let counts = self.get_update_large_batch_with_size(query, batch_size, param_sets)?;
        Ok(counts
            .into_iter()
            .map(|count| usize::try_from(count).unwrap_or(usize::MAX))
            .collect())
    }

    /// # Errors
    /// As [`SqlCallable::get_update_large_batch_with_size`].
    fn get_update_large_batch(&self, query: &str, param_sets: &[Vec<RowValues>]) -> Result<Vec<u64>> {
        self.get_update_large_batch_with_size(query, self.batch_size(), param_sets)
    }

    /// Run `query` once per parameter set, `batch_size` sets at a time.
    ///
    /// Every sub-batch is applied atomically; the returned counts line up with
    /// `param_sets` regardless of the sub-batch size.
    ///
    /// # Errors
    /// `Config` for a zero `batch_size`; `Batch` when a sub-batch fails, carrying
    /// the counts of the sub-batches already applied.
    fn get_update_large_batch_with_size(
        &self,
        query: &str,
        batch_size: usize,
        param_sets: &[Vec<RowValues>],
    ) -> Result<Vec<u64>> {
        if batch_size == 0 {
            return Err(SqlConduitError::Config(
                "batch size must be at least 1".into(),
            ));
        }
        self.with_driver(|conn| executor::update_batch(conn, query, param_sets, batch_size))
    }

    /// Run `query` once per parameter set on one prepared statement and keep
    /// each update result, generated keys included.
    ///
    /// # Errors
    /// `DataAccess` on the first failing set.
    fn get_update_batch_result(
        &self,
        query: &str,
        param_sets: &[Vec<RowValues>],
    ) -> Result<Vec<SqlResult>> {
        self.with_driver(|conn| executor::update_each(conn, query, param_sets))
    }
}
