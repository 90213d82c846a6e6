use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::types::PoolShared;
use crate::connection::Connection;

/// A connection lent out by a [`Pool`](super::Pool).
///
/// Dereferences to [`Connection`]. Dropping the guard returns the connection
/// to its pool, rolling back any transaction it left open.
pub struct PooledConnection {
    conn: Option<Connection>,
    pub(crate) pool: Arc<PoolShared>,
}

impl PooledConnection {
    pub(crate) fn new(conn: Connection, pool: Arc<PoolShared>) -> Self {
        Self {
            conn: Some(conn),
            pool,
        }
    }

    /// Id of the pool this connection belongs to.
    #[must_use]
    pub fn pool_id(&self) -> u64 {
        self.pool.id
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        match &self.conn {
            Some(conn) => conn,
            // only taken in Drop
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool", &self.pool.id)
            .field("conn", &self.conn)
            .finish()
    }
}
