use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::callable::SqlCallable;
use crate::error::{Result, SqlConduitError};
use crate::sqlite::executor;
use crate::types::IsolationLevel;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// One physical database connection.
///
/// Statements issued directly on the connection auto-commit. While a
/// [`Transaction`](super::Transaction) is open they are refused, so work
/// cannot slip outside the transaction by accident.
///
/// A connection is `Send` but not `Sync`: it can move between threads (the pool
/// does this) but only one borrower uses it at a time.
pub struct Connection {
    id: u64,
    raw: RefCell<Option<rusqlite::Connection>>,
    in_transaction: Cell<bool>,
    isolation: Cell<IsolationLevel>,
    prior_read_uncommitted: Cell<bool>,
    batch_size: Cell<usize>,
}

impl Connection {
    pub(crate) fn new(raw: rusqlite::Connection, batch_size: usize) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            raw: RefCell::new(Some(raw)),
            in_transaction: Cell::new(false),
            isolation: Cell::new(IsolationLevel::default()),
            prior_read_uncommitted: Cell::new(false),
            batch_size: Cell::new(batch_size),
        }
    }

    /// Process-unique id, used in log events.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.raw.borrow().is_none()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction.get()
    }

    /// Isolation level of the open transaction, or of the last one started.
    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation.get()
    }

    /// Change the default sub-batch size for batch operations.
    ///
    /// # Errors
    /// Returns `SqlConduitError::Config` for zero.
    pub fn set_batch_size(&self, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(SqlConduitError::Config(
                "batch size must be at least 1".into(),
            ));
        }
        self.batch_size.set(batch_size);
        Ok(())
    }

    /// Run a multi-statement script (DDL, pragmas) outside any transaction.
    ///
    /// # Errors
    /// `InvalidState` if the connection is closed or a transaction is open,
    /// `DataAccess` if a statement fails.
    pub fn execute_batch(&self, script: &str) -> Result<()> {
        self.with_driver(|conn| executor::execute_script(conn, script))
    }

    /// Roll back any open transaction and close the physical connection.
    ///
    /// Closing twice is a no-op. Failures are logged, not returned: there is
    /// nothing left for the caller to do with a connection being discarded.
    pub fn close(&self) {
        self.settle();
        let Some(raw) = self.raw.borrow_mut().take() else {
            return;
        };
        if let Err((_, err)) = raw.close() {
            tracing::warn!(connection = self.id, error = %err, "failed to close connection");
        } else {
            tracing::debug!(connection = self.id, "closed connection");
        }
    }

    /// Run `f` on the driver connection regardless of transaction state.
    pub(crate) fn with_raw<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T>,
    {
        let guard = self.raw.borrow();
        let conn = guard.as_ref().ok_or_else(SqlConduitError::closed)?;
        f(conn)
    }

    /// Open a transaction at `level`. Records the session's read-uncommitted
    /// flag so it can be restored once the transaction ends.
    pub(crate) fn begin(&self, level: IsolationLevel) -> Result<()> {
        if self.in_transaction.get() {
            return Err(SqlConduitError::InvalidState(
                "a transaction is already open on this connection".into(),
            ));
        }
        self.with_raw(|conn| {
            let prior: i64 = conn.query_row("PRAGMA read_uncommitted", [], |row| row.get(0))?;
            let prior = prior != 0;
            if prior != level.read_uncommitted() {
                set_read_uncommitted(conn, level.read_uncommitted())?;
            }
            if let Err(err) = conn.execute_batch(level.begin_statement()) {
                if prior != level.read_uncommitted() {
                    if let Err(restore) = set_read_uncommitted(conn, prior) {
                        tracing::warn!(
                            connection = self.id(),
                            error = %restore,
                            "failed to restore read_uncommitted after BEGIN failed"
                        );
                    }
                }
                return Err(err.into());
            }
            self.prior_read_uncommitted.set(prior);
            Ok(())
        })?;
        self.in_transaction.set(true);
        self.isolation.set(level);
        tracing::debug!(connection = self.id, ?level, "transaction started");
        Ok(())
    }

    /// Commit or roll back the open transaction.
    ///
    /// The connection leaves transactional mode only when the statement
    /// succeeds; a rejected commit leaves the transaction open. A rollback of a
    /// transaction SQLite already rolled back on its own is a no-op.
    pub(crate) fn finish(&self, commit: bool) -> Result<()> {
        self.with_raw(|conn| {
            if commit {
                conn.execute_batch("COMMIT")?;
            } else if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK")?;
            }
            if let Err(err) = set_read_uncommitted(conn, self.prior_read_uncommitted.get()) {
                tracing::warn!(connection = self.id, error = %err, "failed to restore read_uncommitted");
            }
            Ok(())
        })?;
        self.in_transaction.set(false);
        Ok(())
    }

    /// Roll back whatever transaction is open, including one SQLite started
    /// implicitly. Used before a connection is parked or closed.
    pub(crate) fn settle(&self) {
        if self.is_closed() {
            self.in_transaction.set(false);
            return;
        }
        let in_transaction = self.in_transaction.get();
        let outcome = self.with_raw(|conn| {
            if !in_transaction && conn.is_autocommit() {
                return Ok(());
            }
            if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK")?;
            }
            set_read_uncommitted(conn, self.prior_read_uncommitted.get())?;
            Ok(())
        });
        match outcome {
            Ok(()) => {
                if self.in_transaction.replace(false) {
                    tracing::debug!(connection = self.id, "rolled back unfinished transaction");
                }
            }
            Err(err) => {
                tracing::warn!(connection = self.id, error = %err, "failed to settle connection");
                // an unusable session must not be handed out again
                self.in_transaction.set(false);
                if let Some(raw) = self.raw.borrow_mut().take() {
                    drop(raw);
                }
            }
        }
    }
}

fn set_read_uncommitted(conn: &rusqlite::Connection, on: bool) -> rusqlite::Result<()> {
    conn.execute_batch(if on {
        "PRAGMA read_uncommitted = 1"
    } else {
        "PRAGMA read_uncommitted = 0"
    })
}

impl SqlCallable for Connection {
    fn with_driver<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T>,
    {
        if self.in_transaction.get() {
            return Err(SqlConduitError::InvalidState(
                "transaction in progress; run statements through the transaction".into(),
            ));
        }
        self.with_raw(f)
    }

    fn batch_size(&self) -> usize {
        self.batch_size.get()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("in_transaction", &self.in_transaction.get())
            .field("isolation", &self.isolation.get())
            .field("batch_size", &self.batch_size.get())
            .finish()
    }
}
