//! Pool and connect configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Default maximum number of connections per pool.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default idle timeout.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Configuration for a connection pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Maximum number of connections, idle plus checked out.
    pub max_size: usize,

    /// Time a connection can sit idle before it is evicted on the next
    /// acquire.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_size == 0 {
            return Err(PoolError::Configuration(
                "max_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Value of a pre-connect native attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Integer attribute.
    Int(i64),
    /// String attribute.
    Text(String),
    /// Binary attribute, such as an access token.
    Bytes(Vec<u8>),
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Options applied when a connection is opened.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Native attributes set before connecting, in order.
    pub attrs_before: Vec<(i32, AttributeValue)>,
    /// Autocommit mode set after connecting.
    pub autocommit: bool,
}

impl ConnectOptions {
    /// Create default options: no attributes, autocommit off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pre-connect attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: i32, value: impl Into<AttributeValue>) -> Self {
        self.attrs_before.push((attribute, value.into()));
        self
    }

    /// Set autocommit mode.
    #[must_use]
    pub fn autocommit(mut self, enabled: bool) -> Self {
        self.autocommit = enabled;
        self
    }
}

// Attribute payloads can carry access tokens.
impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let attributes: Vec<i32> = self.attrs_before.iter().map(|(id, _)| *id).collect();
        f.debug_struct("ConnectOptions")
            .field("attrs_before", &attributes)
            .field("autocommit", &self.autocommit)
            .finish()
    }
}
