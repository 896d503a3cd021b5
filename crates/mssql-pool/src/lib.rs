//! # mssql-odbc-pool
//!
//! Connection pooling for native SQL Server ODBC connections.
//!
//! Pools are keyed by canonical connection string, so inputs that differ
//! only in keyword case, whitespace, order or synonym share one pool.
//!
//! ## Features
//!
//! - Bounded pools: idle plus checked-out connections never exceed `max_size`
//! - Liveness check and session reset before every reuse
//! - Lazy idle eviction on acquire, no background threads
//! - Native I/O never runs under a pool lock
//! - Immediate [`PoolError::Exhausted`] instead of waiting
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mssql_odbc_pool::{ConnectOptions, Connector, PoolConfig, PoolManager};
//!
//! let manager = Arc::new(PoolManager::new(driver));
//! manager.enable(PoolConfig::new().max_size(20))?;
//!
//! let connector = Connector::new(manager);
//! let mut conn = connector.open("Server=localhost;UID=sa;PWD=secret", [], &ConnectOptions::new())?;
//! conn.commit()?;
//! // Connection goes back to the pool on drop
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod pool;

#[cfg(test)]
mod stub;

pub use config::{AttributeValue, ConnectOptions, PoolConfig};
pub use connection::Connection;
pub use connector::{ConnectionHandle, Connector};
pub use error::{ConnectionError, NativeError, PoolError};
pub use lifecycle::{Completion, ConnectionState, Driver, NativeHandle};
pub use manager::{PoolManager, PoolingMode};
pub use pool::{ConnectionPool, PoolMetrics, PoolStatus};
