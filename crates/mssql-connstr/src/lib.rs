//! # mssql-connstr
//!
//! ODBC connection string handling for SQL Server.
//!
//! Turns a user-supplied connection string plus keyword overrides into a
//! validated, canonical string. The same canonical string is handed to the
//! native driver and used as the connection pool key.
//!
//! ## Pipeline
//!
//! ```text
//! raw string --parse--> ParsedParameters --filter--> canonical map
//!            + overrides (same keyword table, override wins)
//!            --build--> CanonicalConnectionString (Driver and APP injected)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use mssql_connstr::resolve;
//!
//! let canonical = resolve(
//!     "server=localhost;UID=sa;PWD={p;ss}",
//!     [("database", "master")],
//! )
//! .unwrap();
//!
//! assert_eq!(
//!     canonical.as_str(),
//!     "Driver={ODBC Driver 18 for SQL Server};APP=mssql-odbc;Database=master;Pwd={p;ss};Server=localhost;Uid=sa"
//! );
//! ```
//!
//! Malformed input is rejected with every problem listed:
//!
//! ```rust
//! use mssql_connstr::parse;
//!
//! let errors = parse("Server=a;Server=b;Driver=x;Bad", None).unwrap_err();
//! assert_eq!(errors.len(), 3);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod allowlist;
pub mod builder;
pub mod canonical;
pub mod error;
pub mod parser;

pub use allowlist::{AllowList, Filtered, is_reserved_keyword, normalize_key};
pub use builder::{ConnectionStringBuilder, DriverIdentity, escape_value};
pub use canonical::{CanonicalConnectionString, resolve, resolve_with};
pub use error::{ParseError, ParseErrors};
pub use parser::{ConnectionStringParser, ParsedParameters, parse};
