//! Opening connections from user connection strings.

use std::sync::Arc;

use mssql_connstr::{CanonicalConnectionString, DriverIdentity, resolve_with};

use crate::config::ConnectOptions;
use crate::connection::Connection;
use crate::error::{ConnectionError, PoolError};
use crate::manager::PoolManager;

/// Resolves connection strings and opens connections through a
/// [`PoolManager`].
///
/// ```rust,ignore
/// let connector = Connector::new(manager);
/// let mut conn = connector.open(
///     "Server=localhost;UID=sa;PWD=secret",
///     [("Database", "master")],
///     &ConnectOptions::new(),
/// )?;
/// conn.commit()?;
/// conn.close()?;
/// ```
#[derive(Debug, Clone)]
pub struct Connector {
    manager: Arc<PoolManager>,
    identity: DriverIdentity,
}

impl Connector {
    /// Create a connector using the default driver identity.
    #[must_use]
    pub fn new(manager: Arc<PoolManager>) -> Self {
        Self {
            manager,
            identity: DriverIdentity::default(),
        }
    }

    /// Create a connector over the process-wide manager.
    #[must_use]
    pub fn global() -> Option<Self> {
        PoolManager::global().map(|manager| Self::new(Arc::clone(manager)))
    }

    /// Set the values written for the reserved `Driver` and `APP` keywords.
    #[must_use]
    pub fn identity(mut self, identity: DriverIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// The manager connections are pooled in.
    #[must_use]
    pub fn manager(&self) -> &Arc<PoolManager> {
        &self.manager
    }

    /// Open a connection.
    ///
    /// `raw` and `overrides` are resolved into a canonical connection string
    /// first; nothing reaches the driver if they are rejected. Pooling is
    /// enabled with defaults on first use unless it was set explicitly.
    pub fn open<I, K, V>(
        &self,
        raw: &str,
        overrides: I,
        options: &ConnectOptions,
    ) -> Result<ConnectionHandle, PoolError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let key = resolve_with(raw, overrides, &self.identity)?;

        self.manager.ensure_initialized();
        if self.manager.is_enabled() {
            let connection = self.manager.acquire_connection(&key, options)?;
            Ok(ConnectionHandle {
                connection: Some(connection),
                origin: Origin::Pooled(Arc::clone(&self.manager)),
                key,
            })
        } else {
            let connection = Connection::open(&**self.manager.driver(), key.to_shared(), options)?;
            Ok(ConnectionHandle {
                connection: Some(connection),
                origin: Origin::Dedicated,
                key,
            })
        }
    }
}

#[derive(Debug)]
enum Origin {
    Pooled(Arc<PoolManager>),
    Dedicated,
}

/// A connection opened by a [`Connector`].
///
/// Closing or dropping a pooled handle rolls back any open transaction and
/// returns the connection to its pool. A dedicated handle disconnects.
#[derive(Debug)]
pub struct ConnectionHandle {
    connection: Option<Connection>,
    origin: Origin,
    key: CanonicalConnectionString,
}

impl ConnectionHandle {
    /// The canonical connection string.
    #[must_use]
    pub fn connection_string(&self) -> &CanonicalConnectionString {
        &self.key
    }

    /// Whether the connection came from a pool.
    #[must_use]
    pub fn is_pooled(&self) -> bool {
        matches!(self.origin, Origin::Pooled(_))
    }

    /// The underlying connection.
    pub fn connection(&self) -> Result<&Connection, ConnectionError> {
        self.connection.as_ref().ok_or(ConnectionError::NotConnected)
    }

    /// The underlying connection, mutably.
    pub fn connection_mut(&mut self) -> Result<&mut Connection, ConnectionError> {
        self.connection.as_mut().ok_or(ConnectionError::NotConnected)
    }

    /// Commit the current transaction.
    pub fn commit(&mut self) -> Result<(), ConnectionError> {
        self.connection_mut()?.commit()
    }

    /// Roll back the current transaction.
    pub fn rollback(&mut self) -> Result<(), ConnectionError> {
        self.connection_mut()?.rollback()
    }

    /// Switch autocommit mode.
    pub fn set_autocommit(&mut self, enabled: bool) -> Result<(), ConnectionError> {
        self.connection_mut()?.set_autocommit(enabled)
    }

    /// Current autocommit mode.
    pub fn autocommit(&self) -> Result<bool, ConnectionError> {
        Ok(self.connection()?.autocommit())
    }

    /// Close the handle.
    ///
    /// Errors from a dedicated connection's disconnect are returned. Pooled
    /// connections are handed back to the pool, which logs its own failures.
    pub fn close(mut self) -> Result<(), ConnectionError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), ConnectionError> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        match &self.origin {
            Origin::Pooled(manager) => {
                if connection.is_connected() && !connection.autocommit() {
                    if let Err(e) = connection.rollback() {
                        tracing::warn!(
                            connection_id = connection.id(),
                            error = %e,
                            "rollback before returning connection failed"
                        );
                    }
                }
                manager.return_connection(&self.key, connection);
                Ok(())
            }
            Origin::Dedicated => connection.disconnect(),
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!(error = %e, "failed to close connection");
        }
    }
}
