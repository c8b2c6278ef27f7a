//! Emulated read-write lock.
//!
//! The lock is `Unlocked`, `Reading` (one or more readers) or `Writing`
//! (exactly one writer). Each holder's acquisition mode is kept next to it,
//! which is how a mismatched unlock is detected. A reader may take the lock
//! again while holding it; its hold is released only by the matching number
//! of unlocks.
//!
//! Readers join an active reader set even when writers are queued. When the
//! last holder leaves, the queue head decides what happens next: a writer is
//! promoted alone, a reader is promoted together with every reader queued
//! directly behind it.

use super::table::{Primitive, PrimitiveKind};
use crate::error::{Error, Result};
use crate::types::{PrimitiveKey, ThreadId};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Acquisition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RwMode {
    /// Shared.
    Read,
    /// Exclusive.
    Write,
}

impl fmt::Display for RwMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Lock state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RwState {
    /// No holder.
    #[default]
    Unlocked,
    /// One or more readers hold the lock.
    Reading,
    /// A single writer holds the lock.
    Writing,
}

/// Result of a blocking acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RwOutcome {
    /// The caller holds the lock in the requested mode.
    Acquired,
    /// The caller was queued with its requested mode.
    Blocked,
}

/// One thread's hold on the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
struct Hold {
    mode: RwMode,
    count: u32,
}

/// Read-write lock state, holders and FIFO wait queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RwLockEntry {
    state: RwState,
    holders: BTreeMap<ThreadId, Hold>,
    queue: VecDeque<(ThreadId, RwMode)>,
}

impl RwLockEntry {
    /// Returns the lock state.
    #[must_use]
    pub const fn state(&self) -> RwState {
        self.state
    }

    /// Returns the mode `thread` holds the lock in, if any.
    #[must_use]
    pub fn held_by(&self, thread: ThreadId) -> Option<RwMode> {
        self.holders.get(&thread).map(|hold| hold.mode)
    }

    /// Number of unlocks `thread` owes before its hold is released.
    #[must_use]
    pub fn hold_count(&self, thread: ThreadId) -> u32 {
        self.holders.get(&thread).map_or(0, |hold| hold.count)
    }

    /// Number of distinct holders.
    #[must_use]
    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    /// Queued requests, head first.
    pub fn queued(&self) -> impl Iterator<Item = (ThreadId, RwMode)> + '_ {
        self.queue.iter().copied()
    }

    fn can_grant(&self, mode: RwMode) -> bool {
        match mode {
            RwMode::Read => self.state != RwState::Writing,
            RwMode::Write => self.state == RwState::Unlocked,
        }
    }

    fn grant(&mut self, thread: ThreadId, mode: RwMode) {
        self.holders
            .entry(thread)
            .and_modify(|hold| hold.count = hold.count.saturating_add(1))
            .or_insert(Hold { mode, count: 1 });
        self.state = match mode {
            RwMode::Read => RwState::Reading,
            RwMode::Write => RwState::Writing,
        };
    }

    /// Acquires in `mode` or queues the request.
    pub fn lock(&mut self, thread: ThreadId, mode: RwMode) -> RwOutcome {
        if self.can_grant(mode) {
            self.grant(thread, mode);
            RwOutcome::Acquired
        } else {
            self.queue.push_back((thread, mode));
            RwOutcome::Blocked
        }
    }

    /// Acquires in `mode` if compatible, never queuing.
    pub fn try_lock(&mut self, thread: ThreadId, mode: RwMode) -> bool {
        if self.can_grant(mode) {
            self.grant(thread, mode);
            true
        } else {
            false
        }
    }

    /// Releases one of `thread`'s acquisitions and returns the waiters
    /// promoted to holders.
    ///
    /// `mode` is the mode named by the unlock, when the caller knows it; it
    /// must match the acquisition mode. Waiters are only considered once the
    /// last acquisition of the last holder is released.
    pub fn unlock(
        &mut self,
        key: PrimitiveKey,
        thread: ThreadId,
        mode: Option<RwMode>,
    ) -> Result<Vec<ThreadId>> {
        let Some(hold) = self.holders.get_mut(&thread) else {
            return Err(Error::RwLockNotHeld { thread, key });
        };
        let acquired = hold.mode;
        if let Some(requested) = mode {
            if requested != acquired {
                return Err(Error::RwLockModeMismatch {
                    thread,
                    key,
                    acquired,
                    requested,
                });
            }
        }
        if hold.count > 1 {
            hold.count -= 1;
            return Ok(Vec::new());
        }
        self.holders.remove(&thread);
        if !self.holders.is_empty() {
            return Ok(Vec::new());
        }

        self.state = RwState::Unlocked;
        let mut promoted = Vec::new();
        match self.queue.front().map(|&(_, mode)| mode) {
            Some(RwMode::Write) => {
                if let Some((next, mode)) = self.queue.pop_front() {
                    self.grant(next, mode);
                    promoted.push(next);
                }
            }
            Some(RwMode::Read) => {
                while let Some(&(next, RwMode::Read)) = self.queue.front() {
                    self.queue.pop_front();
                    self.grant(next, RwMode::Read);
                    promoted.push(next);
                }
            }
            None => {}
        }
        Ok(promoted)
    }
}

impl Primitive for RwLockEntry {
    const KIND: PrimitiveKind = PrimitiveKind::RwLock;

    fn waiters(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: PrimitiveKey = PrimitiveKey::new(0x70);

    fn tid(n: u32) -> ThreadId {
        ThreadId::new(n)
    }

    #[test]
    fn readers_share_writers_exclude() {
        let mut rw = RwLockEntry::default();
        assert_eq!(rw.lock(tid(1), RwMode::Read), RwOutcome::Acquired);
        assert_eq!(rw.lock(tid(2), RwMode::Read), RwOutcome::Acquired);
        assert_eq!(rw.state(), RwState::Reading);
        assert_eq!(rw.lock(tid(3), RwMode::Write), RwOutcome::Blocked);
        assert!(!rw.try_lock(tid(4), RwMode::Write));
        assert_eq!(rw.waiters(), 1);

        assert!(rw.unlock(KEY, tid(1), None).unwrap().is_empty());
        assert_eq!(rw.unlock(KEY, tid(2), None).unwrap(), vec![tid(3)]);
        assert_eq!(rw.state(), RwState::Writing);
        assert_eq!(rw.held_by(tid(3)), Some(RwMode::Write));
    }

    #[test]
    fn writer_unlock_promotes_contiguous_reader_run() {
        let mut rw = RwLockEntry::default();
        rw.lock(tid(0), RwMode::Write);
        rw.lock(tid(1), RwMode::Read);
        rw.lock(tid(2), RwMode::Read);
        rw.lock(tid(3), RwMode::Write);
        rw.lock(tid(4), RwMode::Read);

        let promoted = rw.unlock(KEY, tid(0), Some(RwMode::Write)).unwrap();
        assert_eq!(promoted, vec![tid(1), tid(2)]);
        assert_eq!(rw.state(), RwState::Reading);
        assert_eq!(rw.holder_count(), 2);
        assert_eq!(rw.queued().collect::<Vec<_>>(), vec![
            (tid(3), RwMode::Write),
            (tid(4), RwMode::Read)
        ]);
    }

    #[test]
    fn last_unlock_with_empty_queue_unlocks() {
        let mut rw = RwLockEntry::default();
        assert!(rw.try_lock(tid(1), RwMode::Write));
        assert!(!rw.try_lock(tid(2), RwMode::Read));
        assert!(rw.unlock(KEY, tid(1), None).unwrap().is_empty());
        assert_eq!(rw.state(), RwState::Unlocked);
    }

    #[test]
    fn mode_mismatch_is_fatal() {
        let mut rw = RwLockEntry::default();
        rw.lock(tid(1), RwMode::Read);
        let err = rw.unlock(KEY, tid(1), Some(RwMode::Write)).unwrap_err();
        assert!(matches!(
            err,
            Error::RwLockModeMismatch {
                acquired: RwMode::Read,
                requested: RwMode::Write,
                ..
            }
        ));
        assert_eq!(rw.held_by(tid(1)), Some(RwMode::Read));
    }

    #[test]
    fn recursive_read_needs_matching_unlocks() {
        let mut rw = RwLockEntry::default();
        assert_eq!(rw.lock(tid(0), RwMode::Read), RwOutcome::Acquired);
        assert!(rw.try_lock(tid(0), RwMode::Read));
        assert_eq!(rw.hold_count(tid(0)), 2);
        assert_eq!(rw.lock(tid(1), RwMode::Write), RwOutcome::Blocked);

        assert!(rw.unlock(KEY, tid(0), None).unwrap().is_empty());
        assert_eq!(rw.state(), RwState::Reading);
        assert_eq!(rw.held_by(tid(0)), Some(RwMode::Read));

        assert_eq!(rw.unlock(KEY, tid(0), Some(RwMode::Read)).unwrap(), vec![tid(1)]);
        assert_eq!(rw.hold_count(tid(0)), 0);
        assert_eq!(rw.state(), RwState::Writing);
    }

    #[test]
    fn unlock_without_holding_is_fatal() {
        let mut rw = RwLockEntry::default();
        let err = rw.unlock(KEY, tid(9), None).unwrap_err();
        assert_eq!(err.kind_name(), "rwlock_not_held");
    }
}
