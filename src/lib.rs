//! Blocking SQL access helpers over SQLite: a fixed-size connection pool, a
//! connection factory, transactions with savepoints and isolation levels,
//! chunked batch updates, eagerly loaded row snapshots and a small DAO layer.
//!
//! ```no_run
//! use sql_conduit::prelude::*;
//!
//! # fn main() -> Result<(), SqlConduitError> {
//! let connector = Connector::new(SqliteDriver::new(), "sqlite:app.db");
//! let pool = Pool::new(connector, PoolOptions::new(4))?;
//!
//! pool.get_connection_and(|conn| {
//!     conn.execute_batch("CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!     let inserted = conn.get_update_result("INSERT INTO users (name) VALUES (?1)", &["ada".into()])?;
//!     println!("new id {}", inserted.id());
//!     Ok::<_, SqlConduitError>(())
//! })?;
//!
//! pool.start_transaction_and(IsolationLevel::Serializable, |tx| {
//!     tx.get_update_result("UPDATE users SET name = ?1 WHERE id = ?2", &["grace".into(), 1.into()])?;
//!     tx.commit()
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod callable;
pub mod config;
pub mod connection;
pub mod connector;
pub mod dao;
pub mod error;
pub mod mapping;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod sqlite;
pub mod types;

pub use callable::{DEFAULT_BATCH_SIZE, SqlCallable};
pub use config::{ConduitConfig, ConnectorOptions, ConnectorOptionsBuilder, PoolOptions};
pub use connection::{Connection, Savepoint, Transaction, TransactionState};
pub use connector::{ConnectionProperties, Connector, Driver};
pub use dao::Dao;
pub use error::{Result, SqlConduitError};
pub use mapping::FromRow;
pub use pool::{Pool, PoolStats, PooledConnection};
pub use results::{Row, SqlResult};
pub use sqlite::SqliteDriver;
pub use types::{IsolationLevel, RowValues};
