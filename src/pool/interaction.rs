use std::time::Duration;

use super::{Pool, PooledConnection};
use crate::connection::Transaction;
use crate::error::SqlConduitError;
use crate::types::IsolationLevel;

impl Pool {
    /// Acquire a connection (default wait), run `f`, and release the connection
    /// whatever `f` returns.
    ///
    /// # Errors
    /// The acquire failure, or whatever `f` returns.
    pub fn get_connection_and<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&PooledConnection) -> Result<T, E>,
        E: From<SqlConduitError>,
    {
        let conn = self.get_available_connection()?;
        f(&conn)
    }

    /// As [`Pool::get_connection_and`], waiting at most `timeout` for a slot.
    ///
    /// # Errors
    /// The acquire failure, or whatever `f` returns.
    pub fn get_connection_and_timeout<T, E, F>(&self, timeout: Duration, f: F) -> Result<T, E>
    where
        F: FnOnce(&PooledConnection) -> Result<T, E>,
        E: From<SqlConduitError>,
    {
        let conn = self.get_available_connection_timeout(timeout)?;
        f(&conn)
    }

    /// Acquire a connection, open a transaction at `level`, and run `f` in it.
    /// Work `f` leaves unfinished is rolled back before the connection is
    /// released.
    ///
    /// # Errors
    /// The acquire or begin failure, or whatever `f` returns.
    pub fn start_transaction_and<T, E, F>(&self, level: IsolationLevel, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<SqlConduitError>,
    {
        let conn = self.get_available_connection()?;
        conn.start_transaction_and(level, f)
    }
}
