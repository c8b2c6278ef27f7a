//! Lockstep scheduler.
//!
//! Threads that finished a round (`Done`) or were woken from a primitive wait
//! in a list ordered by progress, least advanced first, FIFO among equals.
//! The scheduler also counts the threads currently permitted to run and
//! remembers the *watermark*: the progress at which the current runners were
//! admitted.
//!
//! A waiting thread is released when nothing runs (the watermark then moves
//! to its progress), or when its progress is within `slack` of the
//! watermark. With `slack = 0` no thread runs a round ahead of the least
//! advanced runnable thread.

use crate::types::ThreadId;
use serde::Serialize;
use std::collections::VecDeque;

/// Ordered waiting list plus running accounting.
#[derive(Debug, Clone)]
pub struct LockstepScheduler {
    waiting: VecDeque<(ThreadId, u64)>,
    running: usize,
    watermark: u64,
    slack: u64,
    bounded: bool,
    rounds: u64,
    fast_path: u64,
}

/// Serializable view of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSnapshot {
    /// Waiting threads and their progress, least advanced first.
    pub waiting: Vec<(ThreadId, u64)>,
    /// Threads permitted to run.
    pub running: usize,
    /// Progress of the current runners.
    pub watermark: u64,
    /// Watermark advances so far.
    pub rounds: u64,
}

impl LockstepScheduler {
    /// Creates a scheduler enforcing the lockstep bound with `slack`.
    #[must_use]
    pub fn new(slack: u64) -> Self {
        Self {
            waiting: VecDeque::new(),
            running: 0,
            watermark: 0,
            slack,
            bounded: true,
            rounds: 0,
            fast_path: 0,
        }
    }

    /// Creates a scheduler that never holds a thread back.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            bounded: false,
            ..Self::new(0)
        }
    }

    /// Returns true if the lockstep bound is enforced.
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.bounded
    }

    /// Number of threads permitted to run.
    #[must_use]
    pub const fn running(&self) -> usize {
        self.running
    }

    /// Number of threads waiting for their turn.
    #[must_use]
    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    /// Progress of the current runners.
    #[must_use]
    pub const fn watermark(&self) -> u64 {
        self.watermark
    }

    /// Number of times the watermark advanced.
    #[must_use]
    pub const fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Number of sleeps answered without a queue round-trip.
    #[must_use]
    pub const fn fast_path_hits(&self) -> u64 {
        self.fast_path
    }

    /// Returns true if no thread runs or waits.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.running == 0 && self.waiting.is_empty()
    }

    /// Returns true if `thread` is in the waiting list.
    #[must_use]
    pub fn is_waiting(&self, thread: ThreadId) -> bool {
        self.waiting.iter().any(|&(t, _)| t == thread)
    }

    fn move_watermark(&mut self, progress: u64) {
        if progress > self.watermark {
            self.rounds += 1;
        }
        self.watermark = progress;
    }

    /// Inserts `thread` at its sorted position.
    pub fn insert(&mut self, thread: ThreadId, progress: u64) {
        let pos = self
            .waiting
            .iter()
            .position(|&(_, p)| p > progress)
            .unwrap_or(self.waiting.len());
        self.waiting.insert(pos, (thread, progress));
    }

    /// A running thread finished a round at `progress`.
    ///
    /// Returns `true` if it may continue immediately: it is the only runner
    /// and nobody waiting is behind it. Otherwise it is parked in the
    /// waiting list and stops counting as running.
    pub fn sleep(&mut self, thread: ThreadId, progress: u64) -> bool {
        if !self.bounded {
            return true;
        }
        let least_advanced = self.waiting.front().is_none_or(|&(_, p)| p >= progress);
        if self.running == 1 && least_advanced {
            self.move_watermark(progress);
            self.fast_path += 1;
            return true;
        }
        self.insert(thread, progress);
        self.remove_running();
        false
    }

    /// A running thread blocked on a primitive or finished.
    pub fn remove_running(&mut self) {
        self.running = self.running.saturating_sub(1);
    }

    /// Releases the least advanced waiting thread if it is eligible.
    ///
    /// Callers loop until `None` to drain every newly eligible thread.
    pub fn awake(&mut self) -> Option<ThreadId> {
        let &(thread, progress) = self.waiting.front()?;
        if self.running == 0 {
            self.move_watermark(progress);
        } else if self.bounded && progress > self.watermark.saturating_add(self.slack) {
            return None;
        }
        self.waiting.pop_front();
        self.running += 1;
        Some(thread)
    }

    /// Returns a serializable view.
    #[must_use]
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            waiting: self.waiting.iter().copied().collect(),
            running: self.running,
            watermark: self.watermark,
            rounds: self.rounds,
        }
    }
}
