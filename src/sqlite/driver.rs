use std::time::Duration;

use rusqlite::OpenFlags;

use crate::connector::{ConnectionProperties, Driver};
use crate::error::SqlConduitError;

/// Busy timeout applied to every opened connection unless overridden.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// [`Driver`] backed by `rusqlite`.
///
/// Accepts `:memory:`, plain paths, `file:` URIs and the prefixed forms
/// `sqlite:<path>`, `sqlite://<path>` and `jdbc:sqlite:<path>`.
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    busy_timeout: Duration,
    wal: bool,
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            wal: false,
        }
    }
}

impl SqliteDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Switch every opened connection to `journal_mode = WAL`.
    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }
}

/// Strip the URL scheme down to what `sqlite3_open_v2` understands.
pub(crate) fn database_path(url: &str) -> &str {
    let url = url.trim();
    for prefix in ["jdbc:sqlite:", "sqlite://", "sqlite:"] {
        if let Some(rest) = url.strip_prefix(prefix) {
            return rest;
        }
    }
    url
}

fn open_flags(properties: &ConnectionProperties) -> Result<OpenFlags, SqlConduitError> {
    let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    match properties.get("open_mode") {
        None | Some("read_write_create") => Ok(base
            | OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE),
        Some("read_write") => Ok(base | OpenFlags::SQLITE_OPEN_READ_WRITE),
        Some("read_only") => Ok(base | OpenFlags::SQLITE_OPEN_READ_ONLY),
        Some(other) => Err(SqlConduitError::Config(format!(
            "unknown open_mode '{other}' (expected read_only, read_write or read_write_create)"
        ))),
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn connect(
        &self,
        url: &str,
        properties: &ConnectionProperties,
    ) -> Result<rusqlite::Connection, SqlConduitError> {
        let path = database_path(url);
        if path.is_empty() {
            return Err(SqlConduitError::Config(format!(
                "no database path in url '{url}'"
            )));
        }
        let flags = open_flags(properties)?;

        let conn = rusqlite::Connection::open_with_flags(path, flags).map_err(|e| {
            SqlConduitError::Connection(format!("failed to open SQLite database '{url}': {e}"))
        })?;
        conn.busy_timeout(self.busy_timeout).map_err(|e| {
            SqlConduitError::Connection(format!("failed to set busy timeout on '{url}': {e}"))
        })?;

        if self.wal {
            // journal_mode reports the resulting mode as a row
            let mode: String = conn
                .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
                .map_err(SqlConduitError::DataAccess)?;
            tracing::debug!(url, mode = %mode, "applied journal_mode");
        }

        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_prefixes_are_stripped() {
        assert_eq!(database_path("jdbc:sqlite:./test.db"), "./test.db");
        assert_eq!(database_path("sqlite://data/app.db"), "data/app.db");
        assert_eq!(database_path("sqlite::memory:"), ":memory:");
        assert_eq!(database_path("file::memory:?cache=shared"), "file::memory:?cache=shared");
    }

    #[test]
    fn unknown_open_mode_is_config_error() {
        let props = ConnectionProperties::default().with_property("open_mode", "sideways");
        let err = SqliteDriver::new().connect(":memory:", &props).unwrap_err();
        assert!(matches!(err, SqlConduitError::Config(_)));
    }

    #[test]
    fn read_only_missing_file_fails_to_connect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let props = ConnectionProperties::default().with_property("open_mode", "read_only");
        let err = SqliteDriver::new()
            .connect(path.to_str().unwrap(), &props)
            .unwrap_err();
        assert!(matches!(err, SqlConduitError::Connection(_)));
    }
}
