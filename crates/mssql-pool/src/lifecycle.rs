//! Native connection lifecycle.
//!
//! This module defines the seam between the pool and the native ODBC layer.
//! A [`Driver`] allocates [`NativeHandle`]s; each handle is one connection
//! handle owned by exactly one [`Connection`](crate::Connection). All calls
//! are blocking and must never run while a pool lock is held.

use crate::config::AttributeValue;
use crate::error::NativeError;

/// How a transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Make the transaction's changes permanent.
    Commit,
    /// Undo the transaction's changes.
    Rollback,
}

/// One native connection handle.
///
/// Implementations wrap a driver connection handle. They are `Send` so a
/// connection can move between the caller and the pool's idle queue, but
/// never shared between threads.
pub trait NativeHandle: Send {
    /// Set a connection attribute before connecting.
    fn set_attribute(&mut self, attribute: i32, value: &AttributeValue) -> Result<(), NativeError>;

    /// Open a session using a canonical connection string.
    fn connect(&mut self, connection_string: &str) -> Result<(), NativeError>;

    /// Close the session.
    fn disconnect(&mut self) -> Result<(), NativeError>;

    /// Commit or roll back the current transaction.
    fn end_transaction(&mut self, completion: Completion) -> Result<(), NativeError>;

    /// Switch autocommit mode.
    fn set_autocommit(&mut self, enabled: bool) -> Result<(), NativeError>;

    /// Whether the server session is still usable.
    fn is_alive(&self) -> bool;

    /// Clear transaction and session state before reuse.
    fn reset(&mut self) -> Result<(), NativeError>;
}

/// Allocates native connection handles.
pub trait Driver: Send + Sync {
    /// Allocate an unconnected handle.
    fn allocate(&self) -> Result<Box<dyn NativeHandle>, NativeError>;
}

/// Connection state tracked by [`Connection`](crate::Connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handle allocated, never connected.
    Allocated,
    /// Session open.
    Connected,
    /// Session closed. The handle may connect again.
    Disconnected,
}

impl ConnectionState {
    /// Whether native calls that need a session may run.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether `connect` may run.
    #[must_use]
    pub fn can_connect(&self) -> bool {
        !self.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_transitions() {
        assert!(ConnectionState::Allocated.can_connect());
        assert!(!ConnectionState::Allocated.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connected.can_connect());
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(ConnectionState::Disconnected.can_connect());
    }
}
