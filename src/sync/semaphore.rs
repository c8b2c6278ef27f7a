//! Emulated counting semaphore.
//!
//! `post` with waiters hands the unit of capacity directly to the oldest
//! waiter, so the value does not change. While the observed program follows
//! the semaphore protocol, `value + queued waiters` is conserved across a
//! `post`/`wait` pair and the value never goes negative.
//!
//! # Example
//!
//! ```
//! use pramsync::sync::semaphore::{SemaphoreEntry, WaitOutcome};
//! use pramsync::ThreadId;
//!
//! let mut sem = SemaphoreEntry::new(1);
//! assert_eq!(sem.wait(ThreadId::new(0)), WaitOutcome::Acquired);
//! assert_eq!(sem.wait(ThreadId::new(1)), WaitOutcome::Blocked);
//! assert_eq!(sem.post(), Some(ThreadId::new(1)));
//! assert_eq!(sem.value(), 0);
//! ```

use super::table::{Primitive, PrimitiveKind};
use crate::types::ThreadId;
use serde::Serialize;
use std::collections::VecDeque;

/// Result of a blocking wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A unit was taken; the caller proceeds.
    Acquired,
    /// No unit available; the caller was queued.
    Blocked,
}

/// Semaphore state: value plus FIFO wait queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SemaphoreEntry {
    value: i64,
    queue: VecDeque<ThreadId>,
}

impl SemaphoreEntry {
    /// Creates a semaphore holding `value` units.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Self {
            value: i64::from(value),
            queue: VecDeque::new(),
        }
    }

    /// Returns the current value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.value
    }

    /// Queued threads, head first.
    pub fn queued(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.queue.iter().copied()
    }

    /// Takes a unit or queues `thread`.
    pub fn wait(&mut self, thread: ThreadId) -> WaitOutcome {
        if self.value > 0 {
            self.value -= 1;
            WaitOutcome::Acquired
        } else {
            self.queue.push_back(thread);
            WaitOutcome::Blocked
        }
    }

    /// Takes a unit if one is available.
    pub fn try_wait(&mut self) -> bool {
        if self.value > 0 {
            self.value -= 1;
            true
        } else {
            false
        }
    }

    /// Returns a unit: wakes the oldest waiter, or increments the value.
    pub fn post(&mut self) -> Option<ThreadId> {
        let woken = self.queue.pop_front();
        if woken.is_none() {
            self.value = self.value.saturating_add(1);
        }
        woken
    }
}

impl Primitive for SemaphoreEntry {
    const KIND: PrimitiveKind = PrimitiveKind::Semaphore;

    fn waiters(&self) -> usize {
        self.queue.len()
    }
}
