mod core;
mod tx;

pub use core::Connection;
pub use tx::{Savepoint, Transaction, TransactionState};
