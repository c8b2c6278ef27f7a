//! Per-thread release gate.
//!
//! A binary semaphore: the dispatcher opens it to let a thread continue, and
//! closes it (inside the dispatcher's critical section) when the thread has
//! to wait for its turn. Waiting does not consume the opening.

use parking_lot::{Condvar, Mutex};

/// Binary release gate of one observed thread.
#[derive(Debug, Default)]
pub struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the gate and wakes its waiter.
    pub fn open(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.cond.notify_all();
    }

    /// Closes the gate.
    pub fn close(&self) {
        *self.open.lock() = false;
    }

    /// Returns true if the gate is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Blocks until the gate is open.
    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }
}
