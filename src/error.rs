use std::time::Duration;

use thiserror::Error;

/// Every failure surfaced by this crate.
///
/// Driver failures keep the original `rusqlite` error as their source so callers
/// can still match on SQLite result codes.
#[derive(Debug, Error)]
pub enum SqlConduitError {
    /// The database could not be opened or reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No pool slot became free within the requested wait.
    #[error("no available connections after waiting {waited:?}")]
    PoolTimeout { waited: Duration },

    /// Acquire attempted on a closed pool.
    #[error("connection pool is closed")]
    PoolClosed,

    /// Operation on a closed connection, a finished transaction, or a connection
    /// that already has a transaction open.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Statement execution failed in the driver.
    #[error(transparent)]
    DataAccess(#[from] rusqlite::Error),

    /// A sub-batch failed. `completed` holds the per-row counts of every
    /// sub-batch that was applied before the failing one.
    #[error("batch failed after {} applied rows: {source}", completed.len())]
    Batch {
        completed: Vec<u64>,
        #[source]
        source: rusqlite::Error,
    },

    /// A configured acquire timeout elapsed inside a higher-level call.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A row could not be converted into the requested type.
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = SqlConduitError> = std::result::Result<T, E>;

impl SqlConduitError {
    pub(crate) fn finished() -> Self {
        SqlConduitError::InvalidState("transaction already finished".into())
    }

    pub(crate) fn closed() -> Self {
        SqlConduitError::InvalidState("connection is closed".into())
    }

    /// True for the two acquire-wait failures (`PoolTimeout` and DAO `Timeout`).
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SqlConduitError::PoolTimeout { .. } | SqlConduitError::Timeout(_)
        )
    }

    /// The SQLite result code behind a driver failure, if any.
    #[must_use]
    pub fn sqlite_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            SqlConduitError::DataAccess(err) | SqlConduitError::Batch { source: err, .. } => {
                err.sqlite_error_code()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_classification() {
        let waited = SqlConduitError::PoolTimeout {
            waited: Duration::from_millis(5),
        };
        assert!(waited.is_timeout());
        assert!(SqlConduitError::Timeout("dao".into()).is_timeout());
        assert!(!SqlConduitError::PoolClosed.is_timeout());
    }

    #[test]
    fn batch_error_reports_applied_rows() {
        let err = SqlConduitError::Batch {
            completed: vec![1, 1, 1],
            source: rusqlite::Error::QueryReturnedNoRows,
        };
        assert!(err.to_string().starts_with("batch failed after 3 applied rows"));
        assert!(err.sqlite_code().is_none());
    }
}
