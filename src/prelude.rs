//! Convenient imports for common functionality.
//!
//! Bringing the prelude into scope also brings [`SqlCallable`], which the
//! statement methods on connections and transactions come from.

pub use crate::callable::{DEFAULT_BATCH_SIZE, SqlCallable};
pub use crate::config::{ConduitConfig, ConnectorOptions, PoolOptions};
pub use crate::connection::{Connection, Savepoint, Transaction, TransactionState};
pub use crate::connector::{ConnectionProperties, Connector, Driver};
pub use crate::dao::Dao;
pub use crate::error::SqlConduitError;
pub use crate::mapping::FromRow;
pub use crate::pool::{Pool, PoolStats, PooledConnection};
pub use crate::results::{Row, SqlResult};
pub use crate::sqlite::SqliteDriver;
pub use crate::types::{IsolationLevel, RowValues};
