//! Thread records and the thread table.
//!
//! The [`ThreadTable`] is the single owner of every thread record. It is a
//! fixed-size arena indexed by [`ThreadId`]; wait queues elsewhere in the
//! engine hold ids, never records. Transitions that also touch the scheduler
//! and the trace recorder are coordinated by `EngineState`; the table only
//! keeps the per-thread facts consistent.

use crate::types::{OsHandle, PrimitiveKey, ThreadId};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an observed thread.
///
/// The discriminants are the digit codes written into trace samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ThreadStatus {
    /// Runnable: executing, or parked by the scheduler until its turn.
    Running = 0,
    /// Blocked in the wait queue of a primitive.
    Waiting = 1,
    /// Never registered.
    #[default]
    Unregistered = 2,
    /// Exited; no further transitions.
    Finished = 3,
}

impl ThreadStatus {
    /// Returns the digit code used in trace samples.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns the printable sample character (`'0'..='3'`).
    #[must_use]
    pub const fn as_char(self) -> char {
        (b'0' + self as u8) as char
    }

    /// Returns the status name in lowercase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Unregistered => "unregistered",
            Self::Finished => "finished",
        }
    }

    /// Returns true if the thread has not exited and was registered.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Running | Self::Waiting)
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient value stashed by one event for a later event of the same call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "key")]
pub enum Payload {
    /// Nothing stashed.
    #[default]
    Empty,
    /// The mutex a condition-variable waiter must re-acquire when signalled.
    CondMutex(PrimitiveKey),
}

/// The wait queue a blocked thread sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "queue", content = "key")]
pub enum WaitSite {
    /// Mutex wait queue.
    Mutex(PrimitiveKey),
    /// Semaphore wait queue.
    Semaphore(PrimitiveKey),
    /// Condition variable wait queue.
    Cond(PrimitiveKey),
    /// Read-write lock wait queue.
    RwLock(PrimitiveKey),
    /// Joiners of an OS thread handle.
    Join(OsHandle),
    /// Creators waiting for the creation handshake.
    Creation,
    /// Callers waiting to enter a non-reentrant function.
    Exclusive(PrimitiveKey),
}

impl fmt::Display for WaitSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutex(key) => write!(f, "mutex {key}"),
            Self::Semaphore(key) => write!(f, "semaphore {key}"),
            Self::Cond(key) => write!(f, "cond {key}"),
            Self::RwLock(key) => write!(f, "rwlock {key}"),
            Self::Join(handle) => write!(f, "join {handle}"),
            Self::Creation => f.write_str("creation"),
            Self::Exclusive(key) => write!(f, "exclusive {key}"),
        }
    }
}

/// Per-thread state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    /// Own id (its slot in the table).
    pub id: ThreadId,
    /// Progress counter: steps this thread is considered to have executed.
    pub progress: u64,
    /// Lifecycle status.
    pub status: ThreadStatus,
    /// Transient payload slot.
    pub payload: Payload,
    /// Handle produced by the create call that spawned this thread.
    pub create_value: Option<OsHandle>,
    /// The single wait queue this thread is in, when blocked.
    pub blocked_on: Option<WaitSite>,
}

impl ThreadRecord {
    fn new(id: ThreadId) -> Self {
        Self {
            id,
            progress: 0,
            status: ThreadStatus::Unregistered,
            payload: Payload::Empty,
            create_value: None,
            blocked_on: None,
        }
    }
}

/// Fixed-size table of thread records.
#[derive(Debug, Clone)]
pub struct ThreadTable {
    records: Vec<ThreadRecord>,
    /// Highest id ever registered.
    max_seen: Option<ThreadId>,
}

impl ThreadTable {
    /// Creates a table with `capacity` unregistered slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let records = (0..capacity)
            .map(|i| ThreadRecord::new(ThreadId::new(u32::try_from(i).unwrap_or(u32::MAX))))
            .collect();
        Self {
            records,
            max_seen: None,
        }
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Returns true if `id` has a slot.
    #[must_use]
    pub fn contains(&self, id: ThreadId) -> bool {
        id.index() < self.records.len()
    }

    /// Returns the record for `id`, if the id is in range.
    #[must_use]
    pub fn get(&self, id: ThreadId) -> Option<&ThreadRecord> {
        self.records.get(id.index())
    }

    /// Returns the record for an id already checked with [`contains`](Self::contains).
    #[must_use]
    pub fn record(&self, id: ThreadId) -> &ThreadRecord {
        &self.records[id.index()]
    }

    pub(crate) fn record_mut(&mut self, id: ThreadId) -> &mut ThreadRecord {
        &mut self.records[id.index()]
    }

    /// Returns the status of `id` (unregistered for out-of-range ids).
    #[must_use]
    pub fn status(&self, id: ThreadId) -> ThreadStatus {
        self.get(id).map_or(ThreadStatus::Unregistered, |r| r.status)
    }

    /// Returns true if every thread created with `handle` has finished.
    #[must_use]
    pub fn handle_exited(&self, handle: OsHandle) -> bool {
        let mut created = self
            .iter_seen()
            .filter(|r| r.create_value == Some(handle))
            .peekable();
        created.peek().is_some() && created.all(|r| r.status == ThreadStatus::Finished)
    }

    /// Returns the progress counter of `id`.
    #[must_use]
    pub fn progress(&self, id: ThreadId) -> u64 {
        self.get(id).map_or(0, |r| r.progress)
    }

    /// Returns true if no thread ever registered.
    #[must_use]
    pub fn none_registered(&self) -> bool {
        self.max_seen.is_none()
    }

    /// Returns the highest registered id.
    #[must_use]
    pub fn max_seen(&self) -> Option<ThreadId> {
        self.max_seen
    }

    /// Marks `id` running with the given starting progress.
    pub(crate) fn mark_started(&mut self, id: ThreadId, progress: u64) {
        if self.max_seen.is_none_or(|max| max < id) {
            self.max_seen = Some(id);
        }
        let record = self.record_mut(id);
        record.status = ThreadStatus::Running;
        record.progress = progress;
        record.payload = Payload::Empty;
        record.blocked_on = None;
    }

    /// Marks `id` blocked in `site`.
    pub(crate) fn mark_blocked(&mut self, id: ThreadId, site: WaitSite) {
        let record = self.record_mut(id);
        record.status = ThreadStatus::Waiting;
        record.blocked_on = Some(site);
    }

    /// Marks `id` runnable again, adopting the waker's progress.
    pub(crate) fn mark_woken(&mut self, id: ThreadId, progress: u64) {
        let record = self.record_mut(id);
        record.status = ThreadStatus::Running;
        record.progress = progress;
        record.blocked_on = None;
    }

    /// Marks `id` finished.
    pub(crate) fn mark_finished(&mut self, id: ThreadId) {
        let record = self.record_mut(id);
        record.status = ThreadStatus::Finished;
        record.blocked_on = None;
        record.payload = Payload::Empty;
    }

    /// Moves a blocked thread to another wait queue without waking it.
    pub(crate) fn requeue(&mut self, id: ThreadId, site: WaitSite) {
        self.record_mut(id).blocked_on = Some(site);
    }

    /// Iterates over every slot up to the highest registered id.
    pub fn iter_seen(&self) -> impl Iterator<Item = &ThreadRecord> {
        let end = self.max_seen.map_or(0, |max| max.index() + 1);
        self.records[..end].iter()
    }

    /// Threads currently blocked on a primitive.
    #[must_use]
    pub fn blocked(&self) -> Vec<ThreadId> {
        self.iter_seen()
            .filter(|r| r.status == ThreadStatus::Waiting)
            .map(|r| r.id)
            .collect()
    }

    /// Returns true if every registered thread has finished.
    #[must_use]
    pub fn all_finished(&self) -> bool {
        self.iter_seen()
            .all(|r| matches!(r.status, ThreadStatus::Finished | ThreadStatus::Unregistered))
    }

    /// Counts threads per status among registered slots.
    #[must_use]
    pub fn count(&self, status: ThreadStatus) -> usize {
        self.iter_seen().filter(|r| r.status == status).count()
    }
}
