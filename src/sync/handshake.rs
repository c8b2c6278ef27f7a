//! Reentrant handshake: a busy flag with a FIFO of threads waiting to enter.
//!
//! Serializes one thread creation at a time, and the paired before/after
//! events of functions that must not be entered concurrently.

use crate::tracing_compat::warn;
use crate::types::ThreadId;
use serde::Serialize;
use std::collections::VecDeque;

/// Busy flag plus FIFO of threads waiting to enter.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Handshake {
    busy: bool,
    queue: VecDeque<ThreadId>,
}

impl Handshake {
    /// Returns true while some thread is inside.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Number of queued threads.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.queue.len()
    }

    /// Enters if free (returns `true`), otherwise queues `thread`.
    pub fn enter(&mut self, thread: ThreadId) -> bool {
        if self.busy {
            self.queue.push_back(thread);
            false
        } else {
            self.busy = true;
            true
        }
    }

    /// Leaves, handing ownership to the oldest queued thread if any.
    pub fn leave(&mut self) -> Option<ThreadId> {
        if !self.busy {
            warn!("leaving a handshake that is not held");
            return None;
        }
        let next = self.queue.pop_front();
        if next.is_none() {
            self.busy = false;
        }
        next
    }
}
