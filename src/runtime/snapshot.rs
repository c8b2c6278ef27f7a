//! Debug snapshot of the engine state.
//!
//! Produced by `Engine::print_state`; serializable so tools can dump it as
//! JSON, and displayable for a quick look on stderr.

use super::scheduler::SchedulerSnapshot;
use super::state::{EngineState, Pending};
use crate::observability::EngineMetrics;
use crate::record::ThreadRecord;
use crate::sync::{RwMode, RwState};
use crate::types::{OsHandle, PrimitiveKey, ThreadId};
use core::fmt;
use serde::Serialize;

/// A mutex and its queue.
#[derive(Debug, Clone, Serialize)]
pub struct MutexView {
    /// Identity.
    pub key: PrimitiveKey,
    /// Current owner.
    pub owner: Option<ThreadId>,
    /// Waiters, head first.
    pub queue: Vec<ThreadId>,
}

/// A semaphore and its queue.
#[derive(Debug, Clone, Serialize)]
pub struct SemaphoreView {
    /// Identity.
    pub key: PrimitiveKey,
    /// Current value.
    pub value: i64,
    /// Waiters, head first.
    pub queue: Vec<ThreadId>,
}

/// A condition variable's queue.
#[derive(Debug, Clone, Serialize)]
pub struct CondView {
    /// Identity.
    pub key: PrimitiveKey,
    /// Waiters, head first.
    pub queue: Vec<ThreadId>,
}

/// A read-write lock, its holders and queue.
#[derive(Debug, Clone, Serialize)]
pub struct RwLockView {
    /// Identity.
    pub key: PrimitiveKey,
    /// Lock state.
    pub state: RwState,
    /// Requests waiting, head first.
    pub queue: Vec<(ThreadId, RwMode)>,
}

/// A join entry.
#[derive(Debug, Clone, Serialize)]
pub struct JoinView {
    /// Joined handle.
    pub handle: OsHandle,
    /// Whether the thread exited.
    pub exited: bool,
    /// Number of joiners waiting.
    pub waiters: usize,
}

/// Creation handshake state.
#[derive(Debug, Clone, Serialize)]
pub struct CreationView {
    /// Thread currently creating.
    pub creator: Option<ThreadId>,
    /// Handle returned before the child registered.
    pub pending_handle: Option<OsHandle>,
    /// Child registered before the create call returned.
    pub pending_child: Option<ThreadId>,
    /// Creators queued behind the current one.
    pub queued: usize,
}

/// Whole-engine snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    /// Every slot up to the highest registered id.
    pub threads: Vec<ThreadRecord>,
    /// Scheduler view.
    pub scheduler: SchedulerSnapshot,
    /// Mutexes.
    pub mutexes: Vec<MutexView>,
    /// Semaphores.
    pub semaphores: Vec<SemaphoreView>,
    /// Condition variables.
    pub conds: Vec<CondView>,
    /// Read-write locks.
    pub rwlocks: Vec<RwLockView>,
    /// Join entries.
    pub joins: Vec<JoinView>,
    /// Creation handshake.
    pub creation: CreationView,
    /// Statistics.
    pub metrics: EngineMetrics,
}

impl EngineSnapshot {
    pub(crate) fn capture(state: &EngineState) -> Self {
        let (pending_handle, pending_child) = match state.creation.pending {
            Pending::Nothing => (None, None),
            Pending::Handle(handle) => (Some(handle), None),
            Pending::Registered(child) => (None, Some(child)),
        };
        Self {
            threads: state.threads.iter_seen().cloned().collect(),
            scheduler: state.scheduler.snapshot(),
            mutexes: state
                .mutexes
                .iter()
                .map(|(key, m)| MutexView {
                    key,
                    owner: m.owner(),
                    queue: m.queued().collect(),
                })
                .collect(),
            semaphores: state
                .semaphores
                .iter()
                .map(|(key, s)| SemaphoreView {
                    key,
                    value: s.value(),
                    queue: s.queued().collect(),
                })
                .collect(),
            conds: state
                .conds
                .iter()
                .map(|(key, c)| CondView {
                    key,
                    queue: c.queued().collect(),
                })
                .collect(),
            rwlocks: state
                .rwlocks
                .iter()
                .map(|(key, rw)| RwLockView {
                    key,
                    state: rw.state(),
                    queue: rw.queued().collect(),
                })
                .collect(),
            joins: state
                .joins
                .iter()
                .map(|(handle, j)| JoinView {
                    handle,
                    exited: j.exited(),
                    waiters: j.waiters(),
                })
                .collect(),
            creation: CreationView {
                creator: state.creation.creator,
                pending_handle,
                pending_child,
                queued: state.creation.gate.waiters(),
            },
            metrics: state.metrics.clone(),
        }
    }
}

fn write_queue(f: &mut fmt::Formatter<'_>, queue: &[ThreadId]) -> fmt::Result {
    f.write_str("[")?;
    for (i, t) in queue.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{t}")?;
    }
    f.write_str("]")
}

impl fmt::Display for EngineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scheduler: running={} waiting={} watermark={} rounds={}",
            self.scheduler.running,
            self.scheduler.waiting.len(),
            self.scheduler.watermark,
            self.scheduler.rounds
        )?;
        writeln!(f, "threads:")?;
        for t in &self.threads {
            write!(f, "  {} {} progress={}", t.id, t.status, t.progress)?;
            if let Some(site) = t.blocked_on {
                write!(f, " blocked_on={site}")?;
            }
            if let Some(handle) = t.create_value {
                write!(f, " handle={handle}")?;
            }
            writeln!(f)?;
        }
        for m in &self.mutexes {
            match m.owner {
                Some(owner) => write!(f, "mutex {} owner={owner} queue=", m.key)?,
                None => write!(f, "mutex {} unlocked queue=", m.key)?,
            }
            write_queue(f, &m.queue)?;
            writeln!(f)?;
        }
        for s in &self.semaphores {
            write!(f, "semaphore {} value={} queue=", s.key, s.value)?;
            write_queue(f, &s.queue)?;
            writeln!(f)?;
        }
        for c in &self.conds {
            write!(f, "cond {} queue=", c.key)?;
            write_queue(f, &c.queue)?;
            writeln!(f)?;
        }
        for rw in &self.rwlocks {
            writeln!(f, "rwlock {} state={:?} queued={}", rw.key, rw.state, rw.queue.len())?;
        }
        for j in &self.joins {
            writeln!(f, "join {} exited={} waiters={}", j.handle, j.exited, j.waiters)?;
        }
        if let Some(creator) = self.creation.creator {
            writeln!(f, "creation: creator={creator} queued={}", self.creation.queued)?;
        }
        write!(f, "{}", self.metrics.format_text())
    }
}
