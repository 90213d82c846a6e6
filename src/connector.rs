use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::error::SqlConduitError;

/// Opens physical connections. Passed to a [`Connector`] explicitly, so nothing
/// has to be registered process-wide before connecting.
pub trait Driver: Send + Sync + Debug {
    /// Open a new physical connection to `url`.
    ///
    /// # Errors
    /// Returns `SqlConduitError::Connection` when the target cannot be opened and
    /// `SqlConduitError::Config` for properties the driver does not accept.
    fn connect(
        &self,
        url: &str,
        properties: &ConnectionProperties,
    ) -> Result<rusqlite::Connection, SqlConduitError>;

    fn name(&self) -> &str;
}

/// Credentials and driver-specific key/value settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionProperties {
    pub user: Option<String>,
    pub password: Option<String>,
    pub properties: BTreeMap<String, String>,
}

impl ConnectionProperties {
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

// keep passwords out of logs
impl Debug for ConnectionProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProperties")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("properties", &self.properties)
            .finish()
    }
}

/// Immutable connection factory: a driver, a URL and connection properties.
///
/// Every call to [`Connector::get_connection`] opens a new physical connection.
#[derive(Debug, Clone)]
pub struct Connector {
    driver: Arc<dyn Driver>,
    url: String,
    properties: ConnectionProperties,
    batch_size: usize,
}

impl Connector {
    pub fn new(driver: impl Driver + 'static, url: impl Into<String>) -> Self {
        Self {
            driver: Arc::new(driver),
            url: url.into(),
            properties: ConnectionProperties::default(),
            batch_size: crate::callable::DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.properties = self.properties.with_credentials(user, password);
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Default sub-batch size of connections opened by this connector.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn properties(&self) -> &ConnectionProperties {
        &self.properties
    }

    #[must_use]
    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Open a new connection.
    ///
    /// # Errors
    /// Returns `SqlConduitError::Connection` if the database cannot be opened.
    pub fn get_connection(&self) -> Result<Connection, SqlConduitError> {
        let raw = self.driver.connect(&self.url, &self.properties)?;
        tracing::debug!(driver = self.driver.name(), url = %self.url, "opened connection");
        Ok(Connection::new(raw, self.batch_size))
    }

    /// Open a connection, hand it to `f`, and close it however `f` exits.
    ///
    /// The handler's own error type is returned unchanged; it only needs to
    /// absorb `SqlConduitError` for the open step.
    ///
    /// # Errors
    /// Returns the open failure or whatever `f` returns.
    pub fn get_connection_and<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<SqlConduitError>,
    {
        let conn = self.get_connection()?;
        let outcome = f(&conn);
        // dropping on unwind closes it as well
        conn.close();
        outcome
    }
}
