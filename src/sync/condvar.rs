//! Emulated condition variable: a FIFO of waiters and nothing else.
//!
//! Dequeued threads are not runnable yet; the caller hands each one to the
//! mutex it stashed when it started waiting.

use super::table::{Primitive, PrimitiveKind};
use crate::types::ThreadId;
use serde::Serialize;
use std::collections::VecDeque;

/// Condition variable wait queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CondEntry {
    queue: VecDeque<ThreadId>,
}

impl CondEntry {
    /// Queues `thread`.
    pub fn wait(&mut self, thread: ThreadId) {
        self.queue.push_back(thread);
    }

    /// Dequeues the oldest waiter.
    pub fn signal(&mut self) -> Option<ThreadId> {
        self.queue.pop_front()
    }

    /// Dequeues every waiter in arrival order.
    pub fn broadcast(&mut self) -> Vec<ThreadId> {
        self.queue.drain(..).collect()
    }

    /// Queued threads, head first.
    pub fn queued(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.queue.iter().copied()
    }
}

impl Primitive for CondEntry {
    const KIND: PrimitiveKind = PrimitiveKind::CondVar;

    fn waiters(&self) -> usize {
        self.queue.len()
    }
}
