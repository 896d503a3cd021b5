//! A single native connection.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::config::ConnectOptions;
use crate::error::ConnectionError;
use crate::lifecycle::{Completion, ConnectionState, Driver, NativeHandle};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Owns one native connection handle.
///
/// A `Connection` is used by one caller at a time: it is either idle in a
/// pool or checked out, never both. Dropping a connected `Connection`
/// disconnects it.
pub struct Connection {
    id: u64,
    pool_id: Option<u64>,
    connection_string: Arc<str>,
    handle: Box<dyn NativeHandle>,
    state: ConnectionState,
    autocommit: bool,
    created_at: Instant,
    last_used: Instant,
}

impl Connection {
    /// Allocate an unconnected handle for `connection_string`.
    pub fn new(
        driver: &dyn Driver,
        connection_string: impl Into<Arc<str>>,
    ) -> Result<Self, ConnectionError> {
        let handle = driver
            .allocate()
            .map_err(ConnectionError::native("SQLAllocHandle"))?;
        let now = Instant::now();

        Ok(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            pool_id: None,
            connection_string: connection_string.into(),
            handle,
            state: ConnectionState::Allocated,
            autocommit: false,
            created_at: now,
            last_used: now,
        })
    }

    /// Allocate and connect in one step.
    pub fn open(
        driver: &dyn Driver,
        connection_string: impl Into<Arc<str>>,
        options: &ConnectOptions,
    ) -> Result<Self, ConnectionError> {
        let mut connection = Self::new(driver, connection_string)?;
        connection.connect(options)?;
        Ok(connection)
    }

    /// Open the session.
    ///
    /// Pre-connect attributes are applied in order, then the handle connects
    /// and autocommit is set from `options`.
    pub fn connect(&mut self, options: &ConnectOptions) -> Result<(), ConnectionError> {
        if !self.state.can_connect() {
            return Err(ConnectionError::AlreadyConnected);
        }

        for (attribute, value) in &options.attrs_before {
            self.handle
                .set_attribute(*attribute, value)
                .map_err(ConnectionError::native("SQLSetConnectAttr"))?;
        }

        self.handle
            .connect(&self.connection_string)
            .map_err(ConnectionError::native("SQLDriverConnect"))?;
        self.state = ConnectionState::Connected;

        if let Err(e) = self.set_autocommit(options.autocommit) {
            self.teardown();
            return Err(e);
        }

        self.touch();
        tracing::debug!(connection_id = self.id, "connection opened");
        Ok(())
    }

    /// Close the session. Calling this on a closed connection does nothing.
    pub fn disconnect(&mut self) -> Result<(), ConnectionError> {
        if !self.state.is_connected() {
            return Ok(());
        }
        self.state = ConnectionState::Disconnected;
        self.handle
            .disconnect()
            .map_err(ConnectionError::native("SQLDisconnect"))?;
        tracing::debug!(connection_id = self.id, "connection closed");
        Ok(())
    }

    /// Commit the current transaction.
    pub fn commit(&mut self) -> Result<(), ConnectionError> {
        self.end_transaction(Completion::Commit)
    }

    /// Roll back the current transaction.
    pub fn rollback(&mut self) -> Result<(), ConnectionError> {
        self.end_transaction(Completion::Rollback)
    }

    fn end_transaction(&mut self, completion: Completion) -> Result<(), ConnectionError> {
        self.ensure_connected()?;
        self.handle
            .end_transaction(completion)
            .map_err(ConnectionError::native("SQLEndTran"))?;
        self.touch();
        Ok(())
    }

    /// Switch autocommit mode.
    pub fn set_autocommit(&mut self, enabled: bool) -> Result<(), ConnectionError> {
        self.ensure_connected()?;
        self.handle
            .set_autocommit(enabled)
            .map_err(ConnectionError::native("SQLSetConnectAttr"))?;
        self.autocommit = enabled;
        Ok(())
    }

    /// Current autocommit mode.
    #[must_use]
    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    /// Clear transaction and session state so the connection can be reused.
    pub fn reset(&mut self) -> Result<(), ConnectionError> {
        self.ensure_connected()?;
        self.handle
            .reset()
            .map_err(ConnectionError::native("SQLSetConnectAttr(RESET_CONNECTION)"))?;
        Ok(())
    }

    /// Whether the session is open and the server still answers.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state.is_connected() && self.handle.is_alive()
    }

    /// Whether `connect` succeeded and `disconnect` has not been called.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Process-unique connection id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the pool that opened this connection. `None` for dedicated
    /// connections.
    #[must_use]
    pub fn pool_id(&self) -> Option<u64> {
        self.pool_id
    }

    pub(crate) fn assign_pool(&mut self, pool_id: u64) {
        self.pool_id = Some(pool_id);
    }

    /// The connection string the handle connects with.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// When the connection was allocated.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When the connection was last used or returned to a pool.
    #[must_use]
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Time since [`Connection::last_used`].
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    fn ensure_connected(&self) -> Result<(), ConnectionError> {
        if self.state.is_connected() {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected)
        }
    }

    fn teardown(&mut self) {
        if let Err(e) = self.disconnect() {
            tracing::warn!(connection_id = self.id, error = %e, "disconnect failed");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.state.is_connected() {
            self.teardown();
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("pool_id", &self.pool_id)
            .field("state", &self.state)
            .field("autocommit", &self.autocommit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::stub::{StubDriver, StubState};

    const CONN_STR: &str = "Driver={ODBC Driver 18 for SQL Server};APP=mssql-odbc;Server=localhost";

    #[test]
    fn test_open_applies_attributes_then_connects() {
        let driver = StubDriver::new();
        let options = ConnectOptions::new()
            .attribute(1256, vec![0u8; 4])
            .attribute(113, 15i64)
            .autocommit(true);

        let conn = Connection::open(&driver, CONN_STR, &options).unwrap();

        assert!(conn.is_connected());
        assert!(conn.is_alive());
        assert!(conn.autocommit());
        assert_eq!(*driver.state.attributes.lock(), vec![1256, 113]);
        assert_eq!(driver.state.connection_strings.lock()[0], CONN_STR);
    }

    #[test]
    fn test_connect_twice_fails() {
        let driver = StubDriver::new();
        let mut conn = Connection::open(&driver, CONN_STR, &ConnectOptions::new()).unwrap();
        assert!(matches!(
            conn.connect(&ConnectOptions::new()),
            Err(ConnectionError::AlreadyConnected)
        ));
    }

    #[test]
    fn test_connect_failure_propagates() {
        let driver = StubDriver::new();
        driver.state.fail_connect.store(true, Ordering::SeqCst);

        let err = Connection::open(&driver, CONN_STR, &ConnectOptions::new()).unwrap_err();
        match err {
            ConnectionError::Native { operation, source } => {
                assert_eq!(operation, "SQLDriverConnect");
                assert_eq!(source.sqlstate, "08001");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let driver = StubDriver::new();
        let mut conn = Connection::open(&driver, CONN_STR, &ConnectOptions::new()).unwrap();

        conn.disconnect().unwrap();
        conn.disconnect().unwrap();
        drop(conn);

        assert_eq!(StubState::count(&driver.state.disconnects), 1);
    }

    #[test]
    fn test_drop_disconnects() {
        let driver = StubDriver::new();
        let conn = Connection::open(&driver, CONN_STR, &ConnectOptions::new()).unwrap();
        drop(conn);
        assert_eq!(StubState::count(&driver.state.disconnects), 1);
    }

    #[test]
    fn test_operations_require_connection() {
        let driver = StubDriver::new();
        let mut conn = Connection::new(&driver, CONN_STR).unwrap();

        assert!(!conn.is_alive());
        assert!(matches!(conn.commit(), Err(ConnectionError::NotConnected)));
        assert!(matches!(conn.rollback(), Err(ConnectionError::NotConnected)));
        assert!(matches!(conn.reset(), Err(ConnectionError::NotConnected)));
        assert!(matches!(
            conn.set_autocommit(true),
            Err(ConnectionError::NotConnected)
        ));
    }

    #[test]
    fn test_transactions_touch_last_used() {
        let driver = StubDriver::new();
        let mut conn = Connection::open(&driver, CONN_STR, &ConnectOptions::new()).unwrap();
        let before = conn.last_used();

        std::thread::sleep(Duration::from_millis(5));
        conn.commit().unwrap();
        assert!(conn.last_used() > before);

        conn.rollback().unwrap();
        assert_eq!(StubState::count(&driver.state.rollbacks), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let driver = StubDriver::new();
        let a = Connection::new(&driver, CONN_STR).unwrap();
        let b = Connection::new(&driver, CONN_STR).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_reconnect_after_disconnect() {
        let driver = StubDriver::new();
        let mut conn = Connection::open(&driver, CONN_STR, &ConnectOptions::new()).unwrap();
        conn.disconnect().unwrap();
        conn.connect(&ConnectOptions::new()).unwrap();
        assert!(conn.is_alive());
        assert_eq!(StubState::count(&driver.state.connects), 2);
    }
}
