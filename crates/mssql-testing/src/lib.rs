//! # mssql-testing
//!
//! Test infrastructure for the SQL Server ODBC connection pool.
//!
//! This crate provides a mock native driver so pool behavior can be tested
//! without an ODBC driver manager or a SQL Server instance.
//!
//! ## Features
//!
//! - Scripted connect, reset and disconnect failures
//! - Killing live sessions to exercise liveness checks
//! - Artificial latency on every blocking call
//! - Call counters and a live-session gauge
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mssql_odbc_pool::{ConnectOptions, Connector, PoolManager};
//! use mssql_testing::MockDriver;
//!
//! let driver = MockDriver::new();
//! let connector = Connector::new(Arc::new(PoolManager::new(driver.shared())));
//!
//! let conn = connector
//!     .open("Server=localhost;UID=sa", [("Database", "test")], &ConnectOptions::new())
//!     .unwrap();
//! drop(conn);
//!
//! assert_eq!(driver.counters().connects, 1);
//! assert_eq!(driver.open_sessions(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock_driver;

pub use mock_driver::{MockCounters, MockDriver};
