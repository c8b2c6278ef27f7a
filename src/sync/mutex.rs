//! Emulated mutex.
//!
//! A locked mutex has exactly one owner. `unlock` with waiters hands the
//! lock straight to the queue head, which becomes the new owner, without
//! the mutex ever passing through the unlocked state. An unlock from a
//! thread that does not own the mutex changes nothing.
//!
//! The owner is tracked explicitly rather than inferred from the locked
//! flag. With only a flag, a stray unlock from a former owner would wake the
//! next queued waiter while the current owner still holds the lock; here it
//! is reported as [`UnlockOutcome::NotOwner`] and ignored.

use super::table::{Primitive, PrimitiveKind};
use crate::types::ThreadId;
use serde::Serialize;
use std::collections::VecDeque;

/// Result of a blocking lock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The caller now holds the lock.
    Acquired,
    /// The caller was queued.
    Blocked,
}

/// Result of an unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The lock passed directly to this waiter.
    HandedOff(ThreadId),
    /// No waiter: the lock is now free.
    Released,
    /// The lock was not held.
    AlreadyUnlocked,
    /// The lock is held by another thread; nothing changed.
    NotOwner(ThreadId),
}

/// Mutex state: current owner plus FIFO wait queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MutexEntry {
    owner: Option<ThreadId>,
    queue: VecDeque<ThreadId>,
}

impl MutexEntry {
    /// Returns true if the mutex is held.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.owner.is_some()
    }

    /// Thread holding the mutex.
    #[must_use]
    pub const fn owner(&self) -> Option<ThreadId> {
        self.owner
    }

    /// Queued threads, head first.
    pub fn queued(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.queue.iter().copied()
    }

    /// Acquires the lock or queues `thread`.
    pub fn lock(&mut self, thread: ThreadId) -> LockOutcome {
        if self.owner.is_some() {
            self.queue.push_back(thread);
            LockOutcome::Blocked
        } else {
            self.owner = Some(thread);
            LockOutcome::Acquired
        }
    }

    /// Acquires the lock for `thread` if it is free.
    pub fn try_lock(&mut self, thread: ThreadId) -> bool {
        if self.owner.is_some() {
            false
        } else {
            self.owner = Some(thread);
            true
        }
    }

    /// Releases the lock held by `thread`, handing it to the oldest waiter.
    pub fn unlock(&mut self, thread: ThreadId) -> UnlockOutcome {
        match self.owner {
            None => UnlockOutcome::AlreadyUnlocked,
            Some(owner) if owner != thread => UnlockOutcome::NotOwner(owner),
            Some(_) => {
                self.owner = self.queue.pop_front();
                self.owner
                    .map_or(UnlockOutcome::Released, UnlockOutcome::HandedOff)
            }
        }
    }
}

impl Primitive for MutexEntry {
    const KIND: PrimitiveKind = PrimitiveKind::Mutex;

    fn waiters(&self) -> usize {
        self.queue.len()
    }
}
