//! Connection pool implementation.
//!
//! A [`ConnectionPool`] holds the idle connections for one canonical
//! connection string. The pool lock guards only the idle queue and the size
//! counter. Every native call (connect, disconnect, liveness check, reset)
//! runs after the guard is dropped: the locked sections compute a plan and
//! the blocking work happens outside.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use mssql_connstr::CanonicalConnectionString;
use parking_lot::Mutex;

use crate::config::{ConnectOptions, PoolConfig};
use crate::connection::Connection;
use crate::error::PoolError;
use crate::lifecycle::Driver;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A bounded pool of connections sharing one canonical connection string.
///
/// `current_size` counts idle plus checked-out connections and never
/// exceeds `max_size`. Idle connections older than `idle_timeout` are
/// evicted lazily by the next [`ConnectionPool::acquire`].
pub struct ConnectionPool {
    id: u64,
    key: CanonicalConnectionString,
    driver: Arc<dyn Driver>,
    max_size: usize,
    idle_timeout: Duration,
    state: Mutex<PoolState>,
    metrics: Mutex<PoolMetricsInner>,
    created_at: Instant,
}

struct PoolState {
    idle: VecDeque<Connection>,
    current_size: usize,
    closed: bool,
}

impl PoolState {
    /// Move idle entries past `idle_timeout` into `stale`.
    fn prune(&mut self, idle_timeout: Duration, stale: &mut Vec<Connection>) -> usize {
        let before = self.idle.len();
        let mut kept = VecDeque::with_capacity(before);
        for conn in self.idle.drain(..) {
            if conn.idle_for() > idle_timeout {
                stale.push(conn);
            } else {
                kept.push_back(conn);
            }
        }
        self.idle = kept;

        let pruned = before - self.idle.len();
        self.current_size = self.current_size.saturating_sub(pruned);
        pruned
    }
}

/// What an acquire attempt decided while holding the lock.
enum Checkout {
    Reuse(Connection),
    Create,
    Exhausted,
    Closed,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    connections_created: u64,
    connections_reused: u64,
    connections_discarded: u64,
    connections_closed: u64,
    checkouts_exhausted: u64,
}

impl ConnectionPool {
    /// Create an empty pool. No connection is opened until the first acquire.
    pub fn new(key: CanonicalConnectionString, driver: Arc<dyn Driver>, config: &PoolConfig) -> Self {
        tracing::debug!(
            pool = key.redacted(),
            max_size = config.max_size,
            idle_timeout_secs = config.idle_timeout.as_secs(),
            "connection pool created"
        );

        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            key,
            driver,
            max_size: config.max_size,
            idle_timeout: config.idle_timeout,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                current_size: 0,
                closed: false,
            }),
            metrics: Mutex::new(PoolMetricsInner::default()),
            created_at: Instant::now(),
        }
    }

    /// Get a live connection.
    ///
    /// Stale idle connections are evicted first. Idle connections are then
    /// tried in order; one that fails the liveness check or the reset is
    /// discarded and the next is tried. With no reusable connection a new
    /// one is opened if the pool has room, otherwise this fails with
    /// [`PoolError::Exhausted`]. A failed new connect is returned to the
    /// caller.
    pub fn acquire(&self, options: &ConnectOptions) -> Result<Connection, PoolError> {
        let mut to_disconnect = Vec::new();
        let result = self.checkout(options, &mut to_disconnect);
        self.disconnect_all(to_disconnect);
        result
    }

    fn checkout(
        &self,
        options: &ConnectOptions,
        to_disconnect: &mut Vec<Connection>,
    ) -> Result<Connection, PoolError> {
        loop {
            let plan = {
                let mut state = self.state.lock();
                if state.closed {
                    Checkout::Closed
                } else {
                    let pruned = state.prune(self.idle_timeout, to_disconnect);
                    if pruned > 0 {
                        self.metrics.lock().connections_discarded += pruned as u64;
                        tracing::debug!(pool = self.key.redacted(), pruned, "evicted idle connections");
                    }

                    if let Some(conn) = state.idle.pop_front() {
                        Checkout::Reuse(conn)
                    } else if state.current_size < self.max_size {
                        state.current_size += 1;
                        Checkout::Create
                    } else {
                        Checkout::Exhausted
                    }
                }
            };

            match plan {
                Checkout::Reuse(mut conn) => {
                    if !conn.is_alive() {
                        tracing::warn!(connection_id = conn.id(), "discarding dead idle connection");
                        self.discard(conn, to_disconnect);
                        continue;
                    }
                    if let Err(e) = conn.reset() {
                        tracing::warn!(
                            connection_id = conn.id(),
                            error = %e,
                            "discarding idle connection after failed reset"
                        );
                        self.discard(conn, to_disconnect);
                        continue;
                    }

                    conn.touch();
                    self.metrics.lock().connections_reused += 1;
                    tracing::trace!(connection_id = conn.id(), "reusing pooled connection");
                    return Ok(conn);
                }
                Checkout::Create => {
                    return match Connection::open(&*self.driver, self.key.to_shared(), options) {
                        Ok(mut conn) => {
                            conn.assign_pool(self.id);
                            self.metrics.lock().connections_created += 1;
                            tracing::debug!(
                                pool = self.key.redacted(),
                                connection_id = conn.id(),
                                "opened new pooled connection"
                            );
                            Ok(conn)
                        }
                        Err(e) => {
                            self.release_slot();
                            Err(e.into())
                        }
                    };
                }
                Checkout::Exhausted => {
                    self.metrics.lock().checkouts_exhausted += 1;
                    return Err(PoolError::Exhausted { max: self.max_size });
                }
                Checkout::Closed => return Err(PoolError::PoolClosed),
            }
        }
    }

    /// Return a checked-out connection.
    ///
    /// The connection is queued as idle when the queue has room. It is
    /// disconnected instead when the queue is full, when the connection is
    /// no longer open, when this pool did not open it, or when this pool
    /// has been closed. A connection from another pool never touches this
    /// pool's size counter, even if both pools serve the same key.
    pub fn release(&self, mut conn: Connection) {
        if conn.pool_id() != Some(self.id) {
            tracing::warn!(
                connection_id = conn.id(),
                pool_id = self.id,
                owner = ?conn.pool_id(),
                "connection released to a pool that did not open it"
            );
            self.disconnect_all(vec![conn]);
            return;
        }

        let rejected = {
            let mut state = self.state.lock();
            if state.closed {
                Some(conn)
            } else if !conn.is_connected() || state.idle.len() >= self.max_size {
                state.current_size = state.current_size.saturating_sub(1);
                Some(conn)
            } else {
                conn.touch();
                tracing::trace!(connection_id = conn.id(), "connection returned to pool");
                state.idle.push_back(conn);
                None
            }
        };

        if let Some(conn) = rejected {
            self.disconnect_all(vec![conn]);
        }
    }

    /// Close the pool.
    ///
    /// Idle connections are disconnected. Checked-out connections are
    /// disconnected as they are released. Later acquires fail with
    /// [`PoolError::PoolClosed`].
    pub fn close(&self) {
        let drained: Vec<Connection> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.current_size = 0;
            state.idle.drain(..).collect()
        };

        tracing::debug!(
            pool = self.key.redacted(),
            idle = drained.len(),
            "connection pool closed"
        );
        self.disconnect_all(drained);
    }

    /// Whether [`ConnectionPool::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        let idle = state.idle.len();
        PoolStatus {
            idle,
            in_use: state.current_size.saturating_sub(idle),
            total: state.current_size,
            max: self.max_size,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.metrics.lock();
        PoolMetrics {
            connections_created: inner.connections_created,
            connections_reused: inner.connections_reused,
            connections_discarded: inner.connections_discarded,
            connections_closed: inner.connections_closed,
            checkouts_exhausted: inner.checkouts_exhausted,
            uptime: self.created_at.elapsed(),
        }
    }

    /// Process-unique pool id, stamped on every connection the pool opens.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The canonical connection string this pool serves.
    #[must_use]
    pub fn key(&self) -> &CanonicalConnectionString {
        &self.key
    }

    /// Maximum number of connections.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Idle timeout.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn discard(&self, conn: Connection, to_disconnect: &mut Vec<Connection>) {
        self.release_slot();
        self.metrics.lock().connections_discarded += 1;
        to_disconnect.push(conn);
    }

    fn release_slot(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.current_size = state.current_size.saturating_sub(1);
        }
    }

    fn disconnect_all(&self, connections: Vec<Connection>) {
        if connections.is_empty() {
            return;
        }
        self.metrics.lock().connections_closed += connections.len() as u64;

        for mut conn in connections {
            if let Err(e) = conn.disconnect() {
                tracing::warn!(
                    connection_id = conn.id(),
                    error = %e,
                    "failed to disconnect pooled connection"
                );
            }
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub idle: usize,
    /// Number of connections currently checked out.
    pub in_use: usize,
    /// Idle plus checked out.
    pub total: usize,
    /// Maximum allowed connections.
    pub max: usize,
}

impl PoolStatus {
    /// Check if the pool is at capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total >= self.max
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Connections opened by the pool.
    pub connections_created: u64,
    /// Acquires served by an idle connection.
    pub connections_reused: u64,
    /// Idle connections dropped for being stale, dead or failing reset.
    pub connections_discarded: u64,
    /// Connections the pool disconnected, for any reason.
    pub connections_closed: u64,
    /// Acquires that failed with [`PoolError::Exhausted`].
    pub checkouts_exhausted: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}
