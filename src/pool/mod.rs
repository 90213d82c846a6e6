pub mod connection;
pub mod interaction;
pub mod types;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub use connection::PooledConnection;
pub use types::PoolStats;

use crate::config::PoolOptions;
use crate::connection::Connection;
use crate::connector::Connector;
use crate::error::SqlConduitError;
use types::{PoolInner, PoolShared};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Fixed-size, blocking connection pool.
///
/// All connections are opened up front. Acquirers that find no free slot queue
/// up and are served strictly in arrival order. Cloning a `Pool` is cheap and
/// every clone shares the same slots.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<PoolShared>,
}

impl Pool {
    /// Open `options.size` connections through `connector`.
    ///
    /// # Errors
    /// `Config` for invalid options, `Connection` if any connection cannot be
    /// opened; connections opened before the failure are closed again.
    pub fn new(connector: Connector, options: PoolOptions) -> Result<Self, SqlConduitError> {
        options.validate()?;
        let connector = match options.batch_size {
            Some(batch_size) => connector.with_batch_size(batch_size),
            None => connector,
        };

        let mut idle = VecDeque::with_capacity(options.size);
        for _ in 0..options.size {
            // already opened connections close on drop if this fails
            idle.push_back(connector.get_connection()?);
        }

        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(pool = id, size = options.size, url = connector.url(), "pool created");
        Ok(Self {
            shared: Arc::new(PoolShared {
                id,
                connector,
                acquire_timeout: options.acquire_timeout(),
                inner: Mutex::new(PoolInner::new(idle)),
            }),
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    #[must_use]
    pub fn connector(&self) -> &Connector {
        &self.shared.connector
    }

    /// Acquire wait used by [`Pool::get_available_connection`].
    #[must_use]
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.shared.acquire_timeout
    }

    /// Acquire a connection, waiting as long as the pool's configured acquire
    /// timeout allows (indefinitely when none is configured).
    ///
    /// # Errors
    /// As [`Pool::get_available_connection_timeout`].
    pub fn get_available_connection(&self) -> Result<PooledConnection, SqlConduitError> {
        self.acquire(self.shared.acquire_timeout)
    }

    /// Acquire a connection, waiting at most `timeout`. `Duration::ZERO` makes
    /// a single attempt without blocking.
    ///
    /// # Errors
    /// `PoolTimeout` if no slot frees up in time, `PoolClosed` if the pool is or
    /// becomes closed, `Connection` if a closed slot cannot be reopened.
    pub fn get_available_connection_timeout(
        &self,
        timeout: Duration,
    ) -> Result<PooledConnection, SqlConduitError> {
        self.acquire(Some(timeout))
    }

    fn acquire(&self, timeout: Option<Duration>) -> Result<PooledConnection, SqlConduitError> {
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);
        let shared = &self.shared;

        let mut inner = shared.lock();
        if inner.closed {
            return Err(SqlConduitError::PoolClosed);
        }

        let conn = if inner.waiters.is_empty() && !inner.idle.is_empty() {
            inner.lend()
        } else if timeout == Some(Duration::ZERO) {
            inner.timeouts += 1;
            return Err(SqlConduitError::PoolTimeout {
                waited: Duration::ZERO,
            });
        } else {
            let (ticket, wake) = inner.take_ticket();
            loop {
                if inner.closed {
                    inner.drop_ticket(ticket);
                    return Err(SqlConduitError::PoolClosed);
                }
                if inner.is_turn_of(ticket) {
                    inner.waiters.pop_front();
                    let conn = inner.lend();
                    inner.wake_head();
                    break conn;
                }
                match deadline {
                    None => {
                        inner = wake.wait(inner).unwrap_or_else(PoisonError::into_inner);
                    }
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            inner.drop_ticket(ticket);
                            inner.timeouts += 1;
                            // the next waiter may now be at the head
                            inner.wake_head();
                            let waited = now.duration_since(started);
                            tracing::debug!(pool = shared.id, ?waited, "acquire timed out");
                            return Err(SqlConduitError::PoolTimeout { waited });
                        }
                        inner = wake
                            .wait_timeout(inner, deadline - now)
                            .unwrap_or_else(PoisonError::into_inner)
                            .0;
                    }
                }
            }
        };
        drop(inner);

        let Some(conn) = conn else {
            return Err(SqlConduitError::InvalidState(
                "pool slot accounting out of sync".into(),
            ));
        };
        let conn = if conn.is_closed() {
            self.reopen(conn)?
        } else {
            conn
        };
        tracing::debug!(pool = shared.id, connection = conn.id(), "connection acquired");
        Ok(PooledConnection::new(conn, Arc::clone(shared)))
    }

    /// Replace a slot whose connection a borrower closed. On failure the dead
    /// connection goes back to the slot so the pool keeps its size.
    fn reopen(&self, dead: Connection) -> Result<Connection, SqlConduitError> {
        match self.shared.connector.get_connection() {
            Ok(fresh) => {
                tracing::debug!(
                    pool = self.shared.id,
                    old = dead.id(),
                    new = fresh.id(),
                    "reopened closed pool slot"
                );
                Ok(fresh)
            }
            Err(err) => {
                self.shared.put_back(dead);
                Err(err)
            }
        }
    }

    /// Return a connection to the pool before its guard goes out of scope.
    ///
    /// # Errors
    /// `InvalidState` if `conn` was lent by a different pool; it is still
    /// returned to the pool that owns it.
    pub fn release_connection(&self, conn: PooledConnection) -> Result<(), SqlConduitError> {
        if Arc::ptr_eq(&conn.pool, &self.shared) {
            drop(conn);
            Ok(())
        } else {
            let owner = conn.pool_id();
            tracing::warn!(pool = self.shared.id, owner, "release of a connection from another pool");
            drop(conn);
            Err(SqlConduitError::InvalidState(format!(
                "connection belongs to pool {owner}, not pool {}",
                self.shared.id
            )))
        }
    }

    #[must_use]
    pub fn get_available_connection_count(&self) -> usize {
        self.shared.lock().idle.len()
    }

    #[must_use]
    pub fn get_used_connection_count(&self) -> usize {
        self.shared.lock().used
    }

    #[must_use]
    pub fn get_total_connection_count(&self) -> usize {
        self.shared.lock().total
    }

    /// All counters read under one lock acquisition.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared.lock().stats()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Close every parked connection and refuse further acquires. Connections
    /// still lent out are closed as they come back. Blocked acquirers wake up
    /// and fail with `PoolClosed`. Calling it again does nothing.
    pub fn close(&self) {
        let parked = {
            let mut inner = self.shared.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            let parked: Vec<_> = inner.idle.drain(..).collect();
            inner.total -= parked.len();
            inner.wake_all();
            parked
        };
        tracing::debug!(pool = self.shared.id, closed = parked.len(), "pool closed");
        for conn in parked {
            conn.close();
        }
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.shared.id)
            .field("url", &self.shared.connector.url())
            .field("stats", &self.stats())
            .finish()
    }
}
