use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::callable::DEFAULT_BATCH_SIZE;
use crate::connector::{ConnectionProperties, Connector};
use crate::error::SqlConduitError;
use crate::pool::Pool;
use crate::sqlite::{DEFAULT_BUSY_TIMEOUT, SqliteDriver};

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Where and how to open SQLite connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorOptions {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub busy_timeout_ms: u64,
    pub wal: bool,
    pub batch_size: usize,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            url: ":memory:".into(),
            user: None,
            password: None,
            properties: BTreeMap::new(),
            busy_timeout_ms: u64::try_from(DEFAULT_BUSY_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            wal: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ConnectorOptions {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn builder(url: impl Into<String>) -> ConnectorOptionsBuilder {
        ConnectorOptionsBuilder::new(url)
    }

    /// Build a [`Connector`] backed by [`SqliteDriver`].
    ///
    /// # Errors
    /// Returns `SqlConduitError::Config` for an empty URL or a zero batch size.
    pub fn to_connector(&self) -> Result<Connector, SqlConduitError> {
        if self.url.trim().is_empty() {
            return Err(SqlConduitError::Config("connector url is empty".into()));
        }
        if self.batch_size == 0 {
            return Err(SqlConduitError::Config(
                "batch_size must be at least 1".into(),
            ));
        }
        let driver = SqliteDriver::new()
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .with_wal(self.wal);
        let properties = ConnectionProperties {
            user: self.user.clone(),
            password: self.password.clone(),
            properties: self.properties.clone(),
        };
        Ok(Connector::new(driver, self.url.clone())
            .with_properties(properties)
            .with_batch_size(self.batch_size))
    }
}

/// Fluent builder for [`ConnectorOptions`].
#[derive(Debug, Clone)]
pub struct ConnectorOptionsBuilder {
    opts: ConnectorOptions,
}

impl ConnectorOptionsBuilder {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            opts: ConnectorOptions::new(url),
        }
    }

    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.opts.user = Some(user.into());
        self.opts.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.opts.busy_timeout_ms = u64::try_from(busy_timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.opts.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectorOptions {
        self.opts
    }

    /// # Errors
    /// As [`ConnectorOptions::to_connector`].
    pub fn build(self) -> Result<Connector, SqlConduitError> {
        self.opts.to_connector()
    }
}

/// Pool sizing and acquire behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    pub size: usize,
    /// Default acquire wait in milliseconds; `None` waits indefinitely.
    pub acquire_timeout_ms: Option<u64>,
    /// Overrides the connector's sub-batch size for pooled connections.
    pub batch_size: Option<usize>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            acquire_timeout_ms: None,
            batch_size: None,
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }

    /// # Errors
    /// Returns `SqlConduitError::Config` for a zero size or zero batch size.
    pub fn validate(&self) -> Result<(), SqlConduitError> {
        if self.size == 0 {
            return Err(SqlConduitError::Config(
                "pool size must be at least 1".into(),
            ));
        }
        if self.batch_size == Some(0) {
            return Err(SqlConduitError::Config(
                "batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Connector and pool settings loaded together, typically from a JSON file:
///
/// ```json
/// {
///   "connector": { "url": "sqlite:app.db", "wal": true },
///   "pool": { "size": 4, "acquire_timeout_ms": 500 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    pub connector: ConnectorOptions,
    pub pool: PoolOptions,
}

impl ConduitConfig {
    /// # Errors
    /// Returns `SqlConduitError::Serialization` for malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self, SqlConduitError> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// Returns `SqlConduitError::Io` if the file cannot be read and
    /// `SqlConduitError::Serialization` if it is not valid config JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SqlConduitError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Open a pool as configured.
    ///
    /// # Errors
    /// `Config` for invalid settings, `Connection` if the pool cannot be filled.
    pub fn build_pool(&self) -> Result<Pool, SqlConduitError> {
        Pool::new(self.connector.to_connector()?, self.pool.clone())
    }
}
