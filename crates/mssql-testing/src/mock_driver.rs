//! Mock native driver for pool tests.
//!
//! [`MockDriver`] hands out in-memory handles that behave like ODBC
//! connection handles. Failures and latency are scripted at runtime from the
//! test thread, and every native call is counted.
//!
//! ## Example
//!
//! ```rust
//! use mssql_odbc_pool::{ConnectOptions, Connection};
//! use mssql_testing::MockDriver;
//!
//! let driver = MockDriver::new();
//! let conn = Connection::open(&driver, "Server=mock", &ConnectOptions::new()).unwrap();
//! assert!(conn.is_alive());
//!
//! driver.kill_all();
//! assert!(!conn.is_alive());
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use mssql_odbc_pool::{AttributeValue, Completion, Driver, NativeError, NativeHandle};
use parking_lot::Mutex;

/// Native call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCounters {
    /// Handles allocated.
    pub allocated: usize,
    /// Successful connects.
    pub connects: usize,
    /// Connect attempts that were made to fail.
    pub failed_connects: usize,
    /// Disconnect calls.
    pub disconnects: usize,
    /// Liveness checks.
    pub liveness_checks: usize,
    /// Successful resets.
    pub resets: usize,
    /// Commits.
    pub commits: usize,
    /// Rollbacks.
    pub rollbacks: usize,
}

#[derive(Default)]
struct MockState {
    allocated: AtomicUsize,
    connects: AtomicUsize,
    failed_connects: AtomicUsize,
    disconnects: AtomicUsize,
    liveness_checks: AtomicUsize,
    resets: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,

    open: AtomicUsize,
    next_handle: AtomicU64,
    // Handles connected at or before this generation report dead.
    killed_through: AtomicU64,

    fail_connects: AtomicUsize,
    fail_all_connects: AtomicBool,
    fail_resets: AtomicBool,
    fail_disconnects: AtomicBool,
    latency: Mutex<Duration>,

    connection_strings: Mutex<Vec<String>>,
    attributes: Mutex<Vec<(i32, AttributeValue)>>,
}

impl MockState {
    fn pause(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
    }
}

/// A scriptable in-memory native driver.
///
/// Clones share state, so a test keeps one clone for scripting and hands
/// another to the pool.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl MockDriver {
    /// Create a driver whose calls all succeed instantly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The driver as a shared trait object.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn Driver> {
        Arc::new(self.clone())
    }

    /// Fail the next `count` connect attempts with SQLSTATE `08001`.
    pub fn fail_next_connects(&self, count: usize) {
        self.state.fail_connects.store(count, Ordering::SeqCst);
    }

    /// Fail every connect attempt until turned off.
    pub fn fail_connects(&self, enabled: bool) {
        self.state.fail_all_connects.store(enabled, Ordering::SeqCst);
    }

    /// Fail every reset until turned off.
    pub fn fail_resets(&self, enabled: bool) {
        self.state.fail_resets.store(enabled, Ordering::SeqCst);
    }

    /// Fail every disconnect until turned off. The handle still closes.
    pub fn fail_disconnects(&self, enabled: bool) {
        self.state.fail_disconnects.store(enabled, Ordering::SeqCst);
    }

    /// Make every handle connected so far report dead.
    pub fn kill_all(&self) {
        let newest = self.state.next_handle.load(Ordering::SeqCst);
        self.state.killed_through.store(newest, Ordering::SeqCst);
    }

    /// Sleep this long inside connect, disconnect, liveness check and reset.
    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock() = latency;
    }

    /// Snapshot of the call counters.
    #[must_use]
    pub fn counters(&self) -> MockCounters {
        let s = &self.state;
        MockCounters {
            allocated: s.allocated.load(Ordering::SeqCst),
            connects: s.connects.load(Ordering::SeqCst),
            failed_connects: s.failed_connects.load(Ordering::SeqCst),
            disconnects: s.disconnects.load(Ordering::SeqCst),
            liveness_checks: s.liveness_checks.load(Ordering::SeqCst),
            resets: s.resets.load(Ordering::SeqCst),
            commits: s.commits.load(Ordering::SeqCst),
            rollbacks: s.rollbacks.load(Ordering::SeqCst),
        }
    }

    /// Number of sessions currently open.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Connection strings passed to connect, in order.
    #[must_use]
    pub fn connection_strings(&self) -> Vec<String> {
        self.state.connection_strings.lock().clone()
    }

    /// Pre-connect attributes set on any handle, in order.
    #[must_use]
    pub fn attributes(&self) -> Vec<(i32, AttributeValue)> {
        self.state.attributes.lock().clone()
    }
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDriver")
            .field("counters", &self.counters())
            .field("open_sessions", &self.open_sessions())
            .finish()
    }
}

impl Driver for MockDriver {
    fn allocate(&self) -> Result<Box<dyn NativeHandle>, NativeError> {
        self.state.allocated.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockHandle {
            state: Arc::clone(&self.state),
            generation: 0,
            connected: false,
        }))
    }
}

struct MockHandle {
    state: Arc<MockState>,
    generation: u64,
    connected: bool,
}

impl MockHandle {
    fn take_connect_failure(&self) -> bool {
        if self.state.fail_all_connects.load(Ordering::SeqCst) {
            return true;
        }
        self.state
            .fail_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn require_session(&self) -> Result<(), NativeError> {
        if self.connected {
            Ok(())
        } else {
            Err(NativeError::new("08003", "Connection not open"))
        }
    }
}

impl NativeHandle for MockHandle {
    fn set_attribute(&mut self, attribute: i32, value: &AttributeValue) -> Result<(), NativeError> {
        self.state.attributes.lock().push((attribute, value.clone()));
        Ok(())
    }

    fn connect(&mut self, connection_string: &str) -> Result<(), NativeError> {
        self.state.pause();
        if self.take_connect_failure() {
            self.state.failed_connects.fetch_add(1, Ordering::SeqCst);
            return Err(NativeError::new(
                "08001",
                "Client unable to establish connection",
            ));
        }

        self.generation = self.state.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        self.connected = true;
        self.state.open.fetch_add(1, Ordering::SeqCst);
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state
            .connection_strings
            .lock()
            .push(connection_string.to_string());
        tracing::trace!(handle = self.generation, "mock connect");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), NativeError> {
        self.state.pause();
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.connected {
            self.connected = false;
            self.state.open.fetch_sub(1, Ordering::SeqCst);
        }
        if self.state.fail_disconnects.load(Ordering::SeqCst) {
            return Err(NativeError::new("HY000", "Disconnect failed"));
        }
        Ok(())
    }

    fn end_transaction(&mut self, completion: Completion) -> Result<(), NativeError> {
        self.require_session()?;
        let counter = match completion {
            Completion::Commit => &self.state.commits,
            Completion::Rollback => &self.state.rollbacks,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_autocommit(&mut self, _enabled: bool) -> Result<(), NativeError> {
        self.require_session()
    }

    fn is_alive(&self) -> bool {
        self.state.pause();
        self.state.liveness_checks.fetch_add(1, Ordering::SeqCst);
        self.connected && self.generation > self.state.killed_through.load(Ordering::SeqCst)
    }

    fn reset(&mut self) -> Result<(), NativeError> {
        self.state.pause();
        self.require_session()?;
        if self.state.fail_resets.load(Ordering::SeqCst) {
            return Err(NativeError::new("HY000", "Reset failed"));
        }
        self.state.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
