//! Registry of connection pools.
//!
//! [`PoolManager`] maps canonical connection strings to pools. The map has
//! its own lock, held only for lookups and inserts; pool operations run on
//! a cloned `Arc` after the map lock is released, so a slow pool never
//! delays another key beyond the lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mssql_connstr::CanonicalConnectionString;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::config::{ConnectOptions, PoolConfig};
use crate::connection::Connection;
use crate::error::PoolError;
use crate::lifecycle::Driver;
use crate::pool::ConnectionPool;

static GLOBAL: OnceCell<Arc<PoolManager>> = OnceCell::new();

/// Whether connections opened through the manager are pooled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolingMode {
    /// Neither [`PoolManager::enable`] nor [`PoolManager::disable`] was called.
    Uninitialized,
    /// Connections are pooled.
    Enabled,
    /// Connections bypass the pools.
    Disabled,
}

#[derive(Debug)]
struct Settings {
    defaults: PoolConfig,
    mode: PoolingMode,
}

/// Registry of [`ConnectionPool`]s keyed by canonical connection string.
///
/// Pools are created lazily on the first acquire for a key, using the
/// defaults current at that moment.
pub struct PoolManager {
    driver: Arc<dyn Driver>,
    settings: Mutex<Settings>,
    pools: Mutex<HashMap<CanonicalConnectionString, Arc<ConnectionPool>>>,
}

impl PoolManager {
    /// Create a manager with default pool settings and pooling not yet
    /// initialized.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self::with_config(driver, PoolConfig::default())
    }

    /// Create a manager with the given pool defaults.
    pub fn with_config(driver: Arc<dyn Driver>, defaults: PoolConfig) -> Self {
        Self {
            driver,
            settings: Mutex::new(Settings {
                defaults,
                mode: PoolingMode::Uninitialized,
            }),
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Install the process-wide manager.
    ///
    /// Returns the argument back if a manager is already installed.
    pub fn install_global(manager: Arc<PoolManager>) -> Result<(), Arc<PoolManager>> {
        GLOBAL.set(manager)
    }

    /// The process-wide manager, if one was installed.
    #[must_use]
    pub fn global() -> Option<&'static Arc<PoolManager>> {
        GLOBAL.get()
    }

    /// The driver new connections are allocated from.
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Turn pooling on with `config` as the defaults for new pools.
    ///
    /// Does nothing when pooling is already enabled.
    pub fn enable(&self, config: PoolConfig) -> Result<(), PoolError> {
        config.validate()?;

        let mut settings = self.settings.lock();
        if settings.mode == PoolingMode::Enabled {
            return Ok(());
        }
        tracing::info!(
            max_size = config.max_size,
            idle_timeout_secs = config.idle_timeout.as_secs(),
            "connection pooling enabled"
        );
        settings.defaults = config;
        settings.mode = PoolingMode::Enabled;
        Ok(())
    }

    /// Turn pooling off. Existing pools stay until [`PoolManager::close_pools`].
    pub fn disable(&self) {
        self.settings.lock().mode = PoolingMode::Disabled;
        tracing::info!("connection pooling disabled");
    }

    /// Whether connections are pooled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.settings.lock().mode == PoolingMode::Enabled
    }

    /// Current pooling mode.
    #[must_use]
    pub fn mode(&self) -> PoolingMode {
        self.settings.lock().mode
    }

    /// Enable pooling with the current defaults unless it was explicitly
    /// enabled or disabled before.
    pub fn ensure_initialized(&self) {
        let mut settings = self.settings.lock();
        if settings.mode == PoolingMode::Uninitialized {
            settings.mode = PoolingMode::Enabled;
            tracing::debug!("connection pooling enabled with defaults");
        }
    }

    /// Change the defaults used for pools created afterwards.
    pub fn configure(&self, max_size: usize, idle_timeout: Duration) -> Result<(), PoolError> {
        let config = PoolConfig::new().max_size(max_size).idle_timeout(idle_timeout);
        config.validate()?;

        tracing::info!(
            max_size,
            idle_timeout_secs = idle_timeout.as_secs(),
            "pool defaults changed"
        );
        self.settings.lock().defaults = config;
        Ok(())
    }

    /// Defaults used for new pools.
    #[must_use]
    pub fn defaults(&self) -> PoolConfig {
        self.settings.lock().defaults.clone()
    }

    /// Acquire a connection from the pool for `key`, creating the pool on
    /// first use.
    ///
    /// A pool closed by a concurrent [`PoolManager::close_pools`] after the
    /// lookup has already left the map, so the acquire is retried once
    /// against a fresh pool.
    pub fn acquire_connection(
        &self,
        key: &CanonicalConnectionString,
        options: &ConnectOptions,
    ) -> Result<Connection, PoolError> {
        match self.pool_or_create(key).acquire(options) {
            Err(PoolError::PoolClosed) => {
                tracing::debug!(pool = key.redacted(), "pool closed during acquire, retrying");
                self.pool_or_create(key).acquire(options)
            }
            result => result,
        }
    }

    /// Return a connection to the pool for `key`.
    ///
    /// When no pool exists for `key`, for example after
    /// [`PoolManager::close_pools`], the connection is disconnected.
    pub fn return_connection(&self, key: &CanonicalConnectionString, mut conn: Connection) {
        match self.pool(key) {
            Some(pool) => pool.release(conn),
            None => {
                tracing::debug!(
                    connection_id = conn.id(),
                    "no pool for returned connection, disconnecting"
                );
                if let Err(e) = conn.disconnect() {
                    tracing::warn!(connection_id = conn.id(), error = %e, "disconnect failed");
                }
            }
        }
    }

    /// The pool for `key`, if it exists.
    #[must_use]
    pub fn pool(&self, key: &CanonicalConnectionString) -> Option<Arc<ConnectionPool>> {
        self.pools.lock().get(key).cloned()
    }

    /// Number of pools.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.lock().len()
    }

    /// Close and remove every pool.
    pub fn close_pools(&self) {
        let pools: Vec<Arc<ConnectionPool>> =
            self.pools.lock().drain().map(|(_, pool)| pool).collect();

        tracing::info!(pools = pools.len(), "closing connection pools");
        for pool in pools {
            pool.close();
        }
    }

    fn pool_or_create(&self, key: &CanonicalConnectionString) -> Arc<ConnectionPool> {
        if let Some(pool) = self.pool(key) {
            return pool;
        }

        let defaults = self.defaults();
        let mut pools = self.pools.lock();
        Arc::clone(pools.entry(key.clone()).or_insert_with(|| {
            Arc::new(ConnectionPool::new(
                key.clone(),
                Arc::clone(&self.driver),
                &defaults,
            ))
        }))
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("settings", &*self.settings.lock())
            .field("pools", &self.pool_count())
            .finish_non_exhaustive()
    }
}
