//! Join entries keyed by OS thread handle.
//!
//! An entry lives from the first join or exit of its handle until the exit
//! has been observed by a join. Joiners queued before the exit consume the
//! entry when they are released; otherwise the first join after the exit
//! does. At most one entry per created thread is ever left behind.

use crate::types::{OsHandle, ThreadId};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Result of `before_join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The target already exited.
    Proceed,
    /// The caller was queued until the target exits.
    Blocked,
}

/// Exit flag plus the joiners waiting for it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JoinEntry {
    exited: bool,
    queue: VecDeque<ThreadId>,
}

impl JoinEntry {
    /// Returns true once the target has exited.
    #[must_use]
    pub const fn exited(&self) -> bool {
        self.exited
    }

    /// Number of queued joiners.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.queue.len()
    }
}

/// All join entries.
#[derive(Debug, Clone, Default)]
pub struct JoinTable {
    entries: BTreeMap<OsHandle, JoinEntry>,
}

impl JoinTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Proceeds if `handle` has exited, otherwise queues `thread`.
    pub fn before_join(&mut self, handle: OsHandle, thread: ThreadId) -> JoinOutcome {
        let entry = self.entries.entry(handle).or_default();
        if entry.exited {
            self.entries.remove(&handle);
            JoinOutcome::Proceed
        } else {
            entry.queue.push_back(thread);
            JoinOutcome::Blocked
        }
    }

    /// Marks `handle` exited and returns every queued joiner in order.
    pub fn on_exit(&mut self, handle: OsHandle) -> Vec<ThreadId> {
        let entry = self.entries.entry(handle).or_default();
        if entry.queue.is_empty() {
            entry.exited = true;
            return Vec::new();
        }
        let joiners: Vec<ThreadId> = entry.queue.drain(..).collect();
        self.entries.remove(&handle);
        joiners
    }

    /// Returns true while `handle` has an entry.
    #[must_use]
    pub fn is_tracked(&self, handle: OsHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entry is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry for `handle`.
    #[must_use]
    pub fn get(&self, handle: OsHandle) -> Option<&JoinEntry> {
        self.entries.get(&handle)
    }

    /// Iterates over the entries in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (OsHandle, &JoinEntry)> {
        self.entries.iter().map(|(h, e)| (*h, e))
    }
}
