//! In-crate native driver stub for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::config::AttributeValue;
use crate::error::NativeError;
use crate::lifecycle::{Completion, Driver, NativeHandle};

#[derive(Debug, Default)]
pub(crate) struct StubState {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub resets: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_reset: AtomicBool,
    pub dead: AtomicBool,
    pub attributes: Mutex<Vec<i32>>,
    pub connection_strings: Mutex<Vec<String>>,
}

impl StubState {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct StubDriver {
    pub state: Arc<StubState>,
}

impl StubDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> Arc<dyn Driver> {
        Arc::new(self.clone())
    }
}

impl Driver for StubDriver {
    fn allocate(&self) -> Result<Box<dyn NativeHandle>, NativeError> {
        Ok(Box::new(StubHandle {
            state: Arc::clone(&self.state),
            connected: false,
        }))
    }
}

struct StubHandle {
    state: Arc<StubState>,
    connected: bool,
}

impl NativeHandle for StubHandle {
    fn set_attribute(&mut self, attribute: i32, _value: &AttributeValue) -> Result<(), NativeError> {
        self.state.attributes.lock().push(attribute);
        Ok(())
    }

    fn connect(&mut self, connection_string: &str) -> Result<(), NativeError> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(NativeError::new("08001", "server unreachable"));
        }
        self.state
            .connection_strings
            .lock()
            .push(connection_string.to_string());
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), NativeError> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        Ok(())
    }

    fn end_transaction(&mut self, completion: Completion) -> Result<(), NativeError> {
        if completion == Completion::Rollback {
            self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn set_autocommit(&mut self, _enabled: bool) -> Result<(), NativeError> {
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.connected && !self.state.dead.load(Ordering::SeqCst)
    }

    fn reset(&mut self) -> Result<(), NativeError> {
        if self.state.fail_reset.load(Ordering::SeqCst) {
            return Err(NativeError::new("HY000", "reset failed"));
        }
        self.state.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
