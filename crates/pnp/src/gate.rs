//! Removal admission gate
//!
//! Collaborators that hand out a capability into a device node (a queried
//! bus interface, an open control channel) hold an [`InterfaceRef`] for as
//! long as the capability is live. Query-Remove is admitted only while no
//! such reference exists.
//!
//! The admission test never waits. A caller refused with "device busy" owns
//! the retry policy; [`RefGate::wait_drained`] is provided for collaborators
//! that want to be woken when the last reference goes away.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Counter of live external references with a drained condition
#[derive(Debug, Default)]
pub struct RefGate {
    count: Mutex<usize>,
    drained: Condvar,
}

impl RefGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current number of live references
    pub fn count(&self) -> usize {
        *self.lock()
    }

    /// Zero-timeout test of the drained condition
    pub fn is_drained(&self) -> bool {
        *self.lock() == 0
    }

    pub(crate) fn acquire(&self) -> usize {
        let mut count = self.lock();
        *count += 1;
        *count
    }

    pub(crate) fn release(&self) -> usize {
        let mut count = self.lock();
        debug_assert!(*count > 0, "interface reference released twice");
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
        *count
    }

    /// Blocks until the count drops to zero or `timeout` elapses
    ///
    /// Returns `true` if the gate drained. Never called from request handlers.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .drained
            .wait_timeout_while(guard, timeout, |count| *count > 0)
            .unwrap_or_else(|e| e.into_inner());
        *guard == 0
    }
}

/// RAII guard for one external reference into a device node
///
/// Dropping the guard releases the reference.
#[derive(Debug)]
#[must_use = "dropping the reference releases it immediately"]
pub struct InterfaceRef {
    gate: Arc<RefGate>,
}

impl InterfaceRef {
    pub(crate) fn new(gate: Arc<RefGate>) -> Self {
        gate.acquire();
        Self { gate }
    }
}

impl Clone for InterfaceRef {
    fn clone(&self) -> Self {
        Self::new(self.gate.clone())
    }
}

impl Drop for InterfaceRef {
    fn drop(&mut self) {
        self.gate.release();
    }
}
