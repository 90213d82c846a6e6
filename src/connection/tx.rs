use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Connection;
use crate::callable::SqlCallable;
use crate::error::{Result, SqlConduitError};
use crate::sqlite::executor;
use crate::types::IsolationLevel;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a [`Transaction`]. Every state but `Open` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
    /// Rolled back forcefully, by [`Transaction::abort`] or on drop.
    Aborted,
}

impl TransactionState {
    #[must_use]
    pub fn is_finished(self) -> bool {
        !matches!(self, TransactionState::Open)
    }
}

/// Handle to a savepoint set inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Savepoint {
    transaction: u64,
    name: String,
}

impl Savepoint {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An open transaction on a borrowed [`Connection`].
///
/// Statements run through the transaction (it implements [`SqlCallable`]) until
/// it is committed, rolled back or aborted; after that every call fails with
/// `InvalidState`. Dropping a transaction that is still open aborts it.
pub struct Transaction<'c> {
    conn: &'c Connection,
    id: u64,
    level: IsolationLevel,
    state: TransactionState,
    savepoints: Vec<String>,
    next_savepoint: usize,
}

impl Connection {
    /// Begin a transaction at `level`.
    ///
    /// # Errors
    /// `InvalidState` if the connection is closed or already has a transaction
    /// open, `DataAccess` if `BEGIN` fails.
    pub fn start_transaction(&self, level: IsolationLevel) -> Result<Transaction<'_>> {
        self.begin(level)?;
        Ok(Transaction {
            conn: self,
            id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
            level,
            state: TransactionState::Open,
            savepoints: Vec::new(),
            next_savepoint: 1,
        })
    }

    /// Run `f` inside a transaction. Work `f` leaves unfinished (neither
    /// committed nor rolled back) is rolled back when it returns.
    ///
    /// # Errors
    /// The begin failure, or whatever `f` returns.
    pub fn start_transaction_and<T, E, F>(&self, level: IsolationLevel, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<SqlConduitError>,
    {
        let mut tx = self.start_transaction(level)?;
        let outcome = f(&mut tx);
        if !tx.is_finished() {
            if let Err(err) = tx.rollback() {
                tracing::warn!(connection = self.id(), error = %err, "scoped rollback failed");
            }
        }
        outcome
    }
}

impl Transaction<'_> {
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.level
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_finished() {
            Err(SqlConduitError::finished())
        } else {
            Ok(())
        }
    }

    /// Set an automatically named savepoint.
    ///
    /// # Errors
    /// `InvalidState` if finished, `DataAccess` if the savepoint is rejected.
    pub fn set_savepoint(&mut self) -> Result<Savepoint> {
        let name = format!("sp_{}_{}", self.id, self.next_savepoint);
        self.next_savepoint += 1;
        self.push_savepoint(name)
    }

    /// Set a savepoint under a caller-chosen name.
    ///
    /// # Errors
    /// `InvalidState` if finished or `name` is empty, `DataAccess` if the
    /// savepoint is rejected.
    pub fn set_savepoint_named(&mut self, name: &str) -> Result<Savepoint> {
        if name.is_empty() {
            return Err(SqlConduitError::InvalidState(
                "savepoint name must not be empty".into(),
            ));
        }
        self.push_savepoint(name.to_owned())
    }

    fn push_savepoint(&mut self, name: String) -> Result<Savepoint> {
        self.ensure_open()?;
        self.conn
            .with_raw(|conn| Ok(conn.execute_batch(&format!("SAVEPOINT {}", quote(&name)))?))?;
        self.savepoints.push(name.clone());
        Ok(Savepoint {
            transaction: self.id,
            name,
        })
    }

    fn position_of(&self, savepoint: &Savepoint) -> Result<usize> {
        if savepoint.transaction != self.id {
            return Err(SqlConduitError::InvalidState(format!(
                "savepoint '{}' belongs to another transaction",
                savepoint.name
            )));
        }
        self.savepoints
            .iter()
            .rposition(|name| *name == savepoint.name)
            .ok_or_else(|| {
                SqlConduitError::InvalidState(format!("unknown savepoint '{}'", savepoint.name))
            })
    }

    /// Undo everything done since `savepoint`. The transaction stays open and
    /// `savepoint` stays usable; savepoints set after it are discarded.
    ///
    /// # Errors
    /// `InvalidState` if finished or the savepoint is unknown, `DataAccess` if
    /// the rollback is rejected.
    pub fn rollback_to(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.ensure_open()?;
        let position = self.position_of(savepoint)?;
        self.conn.with_raw(|conn| {
            Ok(conn.execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {}",
                quote(&savepoint.name)
            ))?)
        })?;
        self.savepoints.truncate(position + 1);
        Ok(())
    }

    /// Forget `savepoint` and every savepoint set after it, keeping their work.
    ///
    /// # Errors
    /// As [`Transaction::rollback_to`].
    pub fn release_savepoint(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.ensure_open()?;
        let position = self.position_of(savepoint)?;
        self.conn.with_raw(|conn| {
            Ok(conn.execute_batch(&format!("RELEASE SAVEPOINT {}", quote(&savepoint.name)))?)
        })?;
        self.savepoints.truncate(position);
        Ok(())
    }

    /// # Errors
    /// `InvalidState` if finished. If the database rejects the commit the
    /// error is returned and the transaction stays open.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.conn.finish(true)?;
        self.end(TransactionState::Committed);
        Ok(())
    }

    /// # Errors
    /// `InvalidState` if finished, `DataAccess` if the rollback is rejected.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.conn.finish(false)?;
        self.end(TransactionState::RolledBack);
        Ok(())
    }

    /// Roll back unconditionally. The transaction ends `Aborted` even if the
    /// rollback statement fails; that failure is still returned.
    ///
    /// # Errors
    /// `InvalidState` if finished, `DataAccess` if the rollback is rejected.
    pub fn abort(&mut self) -> Result<()> {
        self.ensure_open()?;
        let outcome = self.conn.finish(false);
        if outcome.is_err() {
            self.conn.settle();
        }
        self.end(TransactionState::Aborted);
        outcome
    }

    /// Finish the transaction by committing it.
    ///
    /// # Errors
    /// As [`Transaction::commit`].
    pub fn complete(&mut self) -> Result<()> {
        self.commit()
    }

    /// Run a parameterless script inside the transaction.
    ///
    /// # Errors
    /// `InvalidState` if finished, `DataAccess` if a statement fails.
    pub fn execute_batch(&self, script: &str) -> Result<()> {
        self.with_driver(|conn| executor::execute_script(conn, script))
    }

    fn end(&mut self, state: TransactionState) {
        self.state = state;
        self.savepoints.clear();
        tracing::debug!(connection = self.conn.id(), transaction = self.id, ?state, "transaction finished");
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SqlCallable for Transaction<'_> {
    fn with_driver<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T>,
    {
        self.ensure_open()?;
        self.conn.with_raw(f)
    }

    fn batch_size(&self) -> usize {
        self.conn.batch_size()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Open {
            tracing::warn!(
                connection = self.conn.id(),
                transaction = self.id,
                "transaction dropped while open; aborting"
            );
            if let Err(err) = self.abort() {
                tracing::warn!(
                    connection = self.conn.id(),
                    transaction = self.id,
                    error = %err,
                    "abort on drop failed"
                );
            }
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("connection", &self.conn.id())
            .field("level", &self.level)
            .field("state", &self.state)
            .field("savepoints", &self.savepoints)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Connector;
    use crate::sqlite::SqliteDriver;
    use crate::types::RowValues;

    fn open() -> Connection {
        let conn = Connector::new(SqliteDriver::new(), ":memory:")
            .get_connection()
            .unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER NOT NULL);").unwrap();
        conn
    }

    fn count(conn: &impl SqlCallable) -> i64 {
        conn.get_row_as::<i64>("SELECT count(*) FROM t", &[])
            .unwrap()
            .unwrap()
    }

    #[test]
    fn direct_statements_are_refused_while_open() {
        let conn = open();
        let mut tx = conn.start_transaction(IsolationLevel::ReadCommitted).unwrap();
        assert!(conn.in_transaction());
        let err = conn.get_row("SELECT 1", &[]).unwrap_err();
        assert!(matches!(err, SqlConduitError::InvalidState(_)));
        tx.commit().unwrap();
        assert!(!conn.in_transaction());
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn savepoints_nest_and_discard() {
        let conn = open();
        let mut tx = conn.start_transaction(IsolationLevel::Serializable).unwrap();
        let outer = tx.set_savepoint().unwrap();
        tx.get_update_result("INSERT INTO t VALUES (?1)", &[RowValues::Int(1)])
            .unwrap();
        let inner = tx.set_savepoint_named("inner \"quoted\"").unwrap();
        tx.get_update_result("INSERT INTO t VALUES (?1)", &[RowValues::Int(2)])
            .unwrap();

        tx.rollback_to(&outer).unwrap();
        assert_eq!(count(&tx), 0);
        let err = tx.rollback_to(&inner).unwrap_err();
        assert!(matches!(err, SqlConduitError::InvalidState(msg) if msg.contains("unknown")));

        tx.release_savepoint(&outer).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn savepoint_from_other_transaction_is_rejected() {
        let conn = open();
        let foreign = {
            let mut tx = conn.start_transaction(IsolationLevel::ReadCommitted).unwrap();
            let sp = tx.set_savepoint().unwrap();
            tx.rollback().unwrap();
            sp
        };
        let mut tx = conn.start_transaction(IsolationLevel::ReadCommitted).unwrap();
        assert!(tx.rollback_to(&foreign).is_err());
        tx.rollback().unwrap();
    }

    #[test]
    fn abort_and_drop_end_the_transaction() {
        let conn = open();
        {
            let mut tx = conn.start_transaction(IsolationLevel::ReadCommitted).unwrap();
            tx.get_update_result("INSERT INTO t VALUES (1)", &[]).unwrap();
            tx.abort().unwrap();
            assert_eq!(tx.state(), TransactionState::Aborted);
            assert!(tx.abort().is_err());
        }
        {
            let tx = conn.start_transaction(IsolationLevel::ReadCommitted).unwrap();
            tx.get_update_result("INSERT INTO t VALUES (2)", &[]).unwrap();
        }
        assert!(!conn.in_transaction());
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn read_uncommitted_is_restored() {
        let conn = open();
        let read_flag = |conn: &Connection| {
            conn.with_raw(|raw| {
                Ok(raw.query_row("PRAGMA read_uncommitted", [], |row| row.get::<_, i64>(0))?)
            })
            .unwrap()
        };
        let mut tx = conn.start_transaction(IsolationLevel::ReadUncommitted).unwrap();
        assert_eq!(read_flag(&conn), 1);
        tx.complete().unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(read_flag(&conn), 0);
        assert_eq!(conn.isolation_level(), IsolationLevel::ReadUncommitted);
    }
}
