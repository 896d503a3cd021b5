//! Connection string builder.
//!
//! Rebuilds a connection string from canonical parameters. Output is
//! deterministic: `Driver` first, then every other key in sorted order.
//! The two reserved parameters are always written from [`DriverIdentity`],
//! whatever the map holds.

use std::collections::BTreeMap;

use crate::allowlist::{APPLICATION_NAME, DRIVER, PASSWORD};
use crate::canonical::CanonicalConnectionString;

/// Default ODBC driver name.
pub const DEFAULT_DRIVER: &str = "ODBC Driver 18 for SQL Server";

/// Default application name reported to the server.
pub const DEFAULT_APPLICATION_NAME: &str = "mssql-odbc";

/// Values the driver writes for the reserved parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverIdentity {
    /// ODBC driver name.
    pub driver: String,
    /// Application name shown in SQL Server management tools.
    pub application_name: String,
}

impl Default for DriverIdentity {
    fn default() -> Self {
        Self {
            driver: DEFAULT_DRIVER.to_string(),
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
        }
    }
}

impl DriverIdentity {
    /// Create an identity with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ODBC driver name.
    #[must_use]
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }
}

/// Builder for canonical connection strings.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStringBuilder {
    params: BTreeMap<String, String>,
    identity: DriverIdentity,
}

impl ConnectionStringBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder seeded with canonical parameters.
    #[must_use]
    pub fn from_params(params: BTreeMap<String, String>) -> Self {
        Self {
            params,
            identity: DriverIdentity::default(),
        }
    }

    /// Set the values used for the reserved parameters.
    #[must_use]
    pub fn identity(mut self, identity: DriverIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Add or replace a parameter. `key` should be a canonical name.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Whether a parameter is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Get a parameter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Build the connection string.
    #[must_use]
    pub fn build(&self) -> String {
        self.render(false)
    }

    /// Build the connection string together with its redacted form.
    #[must_use]
    pub fn build_canonical(&self) -> CanonicalConnectionString {
        CanonicalConnectionString::new(self.render(false), self.render(true))
    }

    fn render(&self, redact: bool) -> String {
        let mut out = String::new();
        push_pair(&mut out, DRIVER, &self.identity.driver);

        let mut params: BTreeMap<&str, &str> = self
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        params.remove(DRIVER);
        params.insert(APPLICATION_NAME, &self.identity.application_name);

        for (key, value) in params {
            if redact && key == PASSWORD {
                push_pair(&mut out, key, "***");
            } else {
                push_pair(&mut out, key, value);
            }
        }

        out
    }
}

fn push_pair(out: &mut String, key: &str, value: &str) {
    if !out.is_empty() {
        out.push(';');
    }
    out.push_str(key);
    out.push('=');
    out.push_str(&escape_value(value));
}

/// Escape a value for use in a connection string.
///
/// Values containing `;`, `{`, `}`, `=` or whitespace are wrapped in braces
/// with `}` doubled to `}}` and `{` doubled to `{{`. Everything else is
/// written as is.
#[must_use]
pub fn escape_value(value: &str) -> String {
    let needs_braces = value
        .chars()
        .any(|c| matches!(c, ';' | '{' | '}' | '=') || c.is_whitespace());

    if !needs_braces {
        return value.to_string();
    }

    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('{');
    for c in value.chars() {
        match c {
            '}' => escaped.push_str("}}"),
            '{' => escaped.push_str("{{"),
            _ => escaped.push(c),
        }
    }
    escaped.push('}');
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value("localhost"), "localhost");
        assert_eq!(escape_value(""), "");
        assert_eq!(escape_value("local;host"), "{local;host}");
        assert_eq!(escape_value("p}w{d"), "{p}}w{{d}");
        assert_eq!(escape_value("a=b"), "{a=b}");
        assert_eq!(escape_value("ODBC Driver 18 for SQL Server"), "{ODBC Driver 18 for SQL Server}");
    }

    #[test]
    fn test_build_injects_reserved_params() {
        let builder = ConnectionStringBuilder::new();
        assert_eq!(
            builder.build(),
            "Driver={ODBC Driver 18 for SQL Server};APP=mssql-odbc"
        );
    }

    #[test]
    fn test_build_orders_driver_first_then_sorted() {
        let mut builder = ConnectionStringBuilder::new();
        builder
            .set("Server", "localhost")
            .set("Database", "mydb")
            .set("Encrypt", "yes");

        assert_eq!(
            builder.build(),
            "Driver={ODBC Driver 18 for SQL Server};APP=mssql-odbc;Database=mydb;Encrypt=yes;Server=localhost"
        );
    }

    #[test]
    fn test_build_overwrites_reserved_values() {
        let mut builder = ConnectionStringBuilder::new()
            .identity(DriverIdentity::new().driver("Test Driver").application_name("tests"));
        builder.set("Driver", "Evil").set("APP", "Spoofed");

        let built = builder.build();
        assert_eq!(built, "Driver={Test Driver};APP=tests");
        assert!(!built.contains("Evil"));
        assert!(!built.contains("Spoofed"));
    }

    #[test]
    fn test_set_replaces_value() {
        let mut builder = ConnectionStringBuilder::new();
        builder.set("Server", "first").set("Server", "second");
        assert_eq!(builder.get("Server"), Some("second"));
        assert!(builder.contains("Server"));
        assert!(!builder.contains("Database"));
    }

    #[test]
    fn test_build_canonical_redacts_password() {
        let mut builder = ConnectionStringBuilder::new();
        builder.set("Server", "localhost").set("Pwd", "p;ss");

        let canonical = builder.build_canonical();
        assert!(canonical.as_str().contains("Pwd={p;ss}"));
        assert!(canonical.redacted().contains("Pwd=***"));
        assert!(!canonical.redacted().contains("p;ss"));
    }
}
