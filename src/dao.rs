use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::time::Duration;

use crate::connection::Transaction;
use crate::error::{Result, SqlConduitError};
use crate::pool::{Pool, PooledConnection};
use crate::results::{Row, SqlResult};
use crate::types::IsolationLevel;

/// Base for data-access objects built on a [`Pool`].
///
/// Every helper acquires a connection, runs the handler, and releases the
/// connection before returning. An acquire that runs out of time surfaces as
/// `SqlConduitError::Timeout`; everything else propagates unchanged.
#[derive(Debug, Clone)]
pub struct Dao {
    pool: Pool,
    acquire_timeout: Option<Duration>,
}

impl Dao {
    /// A DAO that waits as long as the pool's own acquire timeout allows.
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            acquire_timeout: None,
        }
    }

    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    pub fn set_acquire_timeout(&mut self, timeout: Option<Duration>) {
        self.acquire_timeout = timeout;
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Run `handler` on a pooled connection.
    ///
    /// # Errors
    /// `Timeout` when no connection frees up in time, otherwise whatever the
    /// acquire or `handler` fails with.
    pub fn call<T, F>(&self, handler: F) -> Result<T>
    where
        F: FnOnce(&PooledConnection) -> Result<T>,
    {
        let acquired = match self.acquire_timeout {
            Some(timeout) => self.pool.get_available_connection_timeout(timeout),
            None => self.pool.get_available_connection(),
        };
        let conn = acquired.map_err(|err| match err {
            SqlConduitError::PoolTimeout { waited } => SqlConduitError::Timeout(format!(
                "fetching an available connection timed out after {waited:?}"
            )),
            other => other,
        })?;
        handler(&conn)
    }

    /// Run `handler` in a transaction at `level`; unfinished work is rolled back.
    ///
    /// # Errors
    /// As [`Dao::call`], plus begin failures.
    pub fn transaction<T, F>(&self, level: IsolationLevel, handler: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        self.call(|conn| conn.start_transaction_and(level, handler))
    }

    /// # Errors
    /// As [`Dao::call`].
    pub fn row_count<F>(&self, handler: F) -> Result<usize>
    where
        F: FnOnce(&PooledConnection) -> Result<SqlResult>,
    {
        Ok(self.call(handler)?.row_count())
    }

    /// True when exactly one row was affected.
    ///
    /// # Errors
    /// As [`Dao::call`].
    pub fn updated<F>(&self, handler: F) -> Result<bool>
    where
        F: FnOnce(&PooledConnection) -> Result<SqlResult>,
    {
        Ok(self.row_count(handler)? == 1)
    }

    /// The generated key, when exactly one row was affected.
    ///
    /// # Errors
    /// As [`Dao::call`].
    pub fn id<F>(&self, handler: F) -> Result<Option<i64>>
    where
        F: FnOnce(&PooledConnection) -> Result<SqlResult>,
    {
        let result = self.call(handler)?;
        Ok((result.row_count() == 1 && !result.ids().is_empty()).then(|| result.id()))
    }

    /// # Errors
    /// As [`Dao::call`].
    pub fn ids<F>(&self, handler: F) -> Result<Vec<i64>>
    where
        F: FnOnce(&PooledConnection) -> Result<SqlResult>,
    {
        Ok(self.call(handler)?.ids().to_vec())
    }

    /// Extract a value from the row `handler` returns, if any.
    ///
    /// # Errors
    /// As [`Dao::call`], plus whatever `extract` returns.
    pub fn value<T, F, X>(&self, handler: F, extract: X) -> Result<Option<T>>
    where
        F: FnOnce(&PooledConnection) -> Result<Option<Row>>,
        X: FnOnce(&Row) -> Result<T>,
    {
        self.call(handler)?.map(|row| extract(&row)).transpose()
    }

    /// # Errors
    /// As [`Dao::value`].
    pub fn value_list<T, F, X>(&self, handler: F, extract: X) -> Result<Vec<T>>
    where
        F: FnOnce(&PooledConnection) -> Result<SqlResult>,
        X: FnMut(&Row) -> Result<T>,
    {
        self.call(handler)?.iter().map(extract).collect()
    }

    /// # Errors
    /// As [`Dao::value`].
    pub fn value_set<T, F, X>(&self, handler: F, extract: X) -> Result<HashSet<T>>
    where
        T: Eq + Hash,
        F: FnOnce(&PooledConnection) -> Result<SqlResult>,
        X: FnMut(&Row) -> Result<T>,
    {
        self.call(handler)?.iter().map(extract).collect()
    }

    /// # Errors
    /// As [`Dao::value`].
    pub fn value_sorted_set<T, F, X>(&self, handler: F, extract: X) -> Result<BTreeSet<T>>
    where
        T: Ord,
        F: FnOnce(&PooledConnection) -> Result<SqlResult>,
        X: FnMut(&Row) -> Result<T>,
    {
        self.call(handler)?.iter().map(extract).collect()
    }

    /// Build a map from one `(key, value)` pair per row; later rows overwrite
    /// earlier ones with the same key.
    ///
    /// # Errors
    /// As [`Dao::value`].
    pub fn value_map<K, V, F, X>(&self, handler: F, extract: X) -> Result<HashMap<K, V>>
    where
        K: Eq + Hash,
        F: FnOnce(&PooledConnection) -> Result<SqlResult>,
        X: FnMut(&Row) -> Result<(K, V)>,
    {
        self.call(handler)?.iter().map(extract).collect()
    }

    /// # Errors
    /// As [`Dao::value`].
    pub fn value_sorted_map<K, V, F, X>(&self, handler: F, extract: X) -> Result<BTreeMap<K, V>>
    where
        K: Ord,
        F: FnOnce(&PooledConnection) -> Result<SqlResult>,
        X: FnMut(&Row) -> Result<(K, V)>,
    {
        self.call(handler)?.iter().map(extract).collect()
    }
}
