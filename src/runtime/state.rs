//! The engine state machine.
//!
//! [`EngineState::apply`] processes one action to completion without
//! blocking: it mutates the thread table, the primitives, and the trace,
//! runs exactly one release pass, and checks for termination. The returned
//! [`Step`] tells the dispatcher which threads were released and whether the
//! caller may continue; suspending and resuming OS threads is the
//! dispatcher's job.

use super::action::{Action, ActionKind, Reply};
use super::scheduler::LockstepScheduler;
use super::snapshot::EngineSnapshot;
use crate::config::{ClockMode, EngineConfig};
use crate::error::{Error, Result};
use crate::observability::EngineMetrics;
use crate::record::{Payload, ThreadStatus, ThreadTable, WaitSite};
use crate::sync::{
    CondEntry, Handshake, JoinOutcome, JoinTable, LockOutcome, MutexEntry, PrimitiveTable,
    RwLockEntry, RwMode, RwOutcome, SemaphoreEntry, UnlockOutcome, WaitOutcome,
};
use crate::trace::{TraceClock, TraceRecorder, TraceReport};
use crate::tracing_compat::{debug, error, info, trace, warn};
use crate::types::{OsHandle, PrimitiveKey, ThreadId};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Outcome of one applied action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Thread that submitted the action.
    pub caller: ThreadId,
    /// Value handed back to the caller.
    pub reply: Reply,
    /// Threads granted permission to continue by this action's release pass.
    pub released: SmallVec<[ThreadId; 4]>,
    /// Whether the caller may continue right away.
    pub caller_may_continue: bool,
    /// Whether this action completed the program.
    pub program_finished: bool,
}

/// Value parked by the first half of a creation handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    /// Neither half arrived yet.
    Nothing,
    /// The create call returned this handle; the new thread has not registered.
    Handle(OsHandle),
    /// The new thread registered; the create call has not returned.
    Registered(ThreadId),
}

/// One-at-a-time thread creation.
#[derive(Debug, Clone)]
pub(crate) struct Creation {
    pub(crate) gate: Handshake,
    pub(crate) creator: Option<ThreadId>,
    pub(crate) pending: Pending,
}

/// Everything the dispatcher mutates.
#[derive(Debug)]
pub struct EngineState {
    mode: ClockMode,
    round: u64,
    pub(crate) threads: ThreadTable,
    pub(crate) scheduler: LockstepScheduler,
    pub(crate) mutexes: PrimitiveTable<MutexEntry>,
    pub(crate) semaphores: PrimitiveTable<SemaphoreEntry>,
    pub(crate) conds: PrimitiveTable<CondEntry>,
    pub(crate) rwlocks: PrimitiveTable<RwLockEntry>,
    pub(crate) joins: JoinTable,
    pub(crate) creation: Creation,
    pub(crate) exclusive: BTreeMap<PrimitiveKey, Handshake>,
    pub(crate) trace: TraceRecorder,
    clock: TraceClock,
    permits: Vec<bool>,
    pub(crate) metrics: EngineMetrics,
    finished: bool,
    released: SmallVec<[ThreadId; 4]>,
}

impl EngineState {
    /// Creates the state for `config`.
    ///
    /// The configuration is assumed valid; see [`EngineConfig::validate`].
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let scheduler = if config.mode.is_lockstep() {
            LockstepScheduler::new(config.lockstep_slack())
        } else {
            LockstepScheduler::unbounded()
        };
        Self {
            mode: config.mode,
            round: config.instructions_per_round,
            threads: ThreadTable::new(config.max_threads),
            scheduler,
            mutexes: PrimitiveTable::new(),
            semaphores: PrimitiveTable::new(),
            conds: PrimitiveTable::new(),
            rwlocks: PrimitiveTable::new(),
            joins: JoinTable::new(),
            creation: Creation {
                gate: Handshake::default(),
                creator: None,
                pending: Pending::Nothing,
            },
            exclusive: BTreeMap::new(),
            trace: TraceRecorder::from_config(config),
            clock: TraceClock::for_mode(config.mode),
            permits: vec![false; config.max_threads],
            metrics: EngineMetrics::new(),
            finished: false,
            released: SmallVec::new(),
        }
    }

    /// Thread table.
    #[must_use]
    pub fn threads(&self) -> &ThreadTable {
        &self.threads
    }

    /// Scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &LockstepScheduler {
        &self.scheduler
    }

    /// Trace recorder.
    #[must_use]
    pub fn trace(&self) -> &TraceRecorder {
        &self.trace
    }

    /// Statistics.
    #[must_use]
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Semaphore value, if the semaphore exists.
    #[must_use]
    pub fn semaphore_value(&self, key: PrimitiveKey) -> Option<i64> {
        self.semaphores.get(key).map(SemaphoreEntry::value)
    }

    /// Mutex entry, if it exists.
    #[must_use]
    pub fn mutex(&self, key: PrimitiveKey) -> Option<&MutexEntry> {
        self.mutexes.get(key)
    }

    /// Read-write lock entry, if it exists.
    #[must_use]
    pub fn rwlock(&self, key: PrimitiveKey) -> Option<&RwLockEntry> {
        self.rwlocks.get(key)
    }

    /// Returns true if `thread` currently holds a permit to run.
    #[must_use]
    pub fn has_permit(&self, thread: ThreadId) -> bool {
        self.permits.get(thread.index()).copied().unwrap_or(false)
    }

    /// Returns true once every registered thread finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Builds the trace report from the current trace contents.
    #[must_use]
    pub fn report(&self) -> TraceReport {
        TraceReport::from_recorder(&self.trace, self.mode)
    }

    /// Captures a serializable view of the whole state.
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot::capture(self)
    }

    /// Applies one action.
    ///
    /// Any error is fatal for the run: the state may be partially updated.
    pub fn apply(&mut self, action: Action) -> Result<Step> {
        let Action { thread, kind } = action;
        trace!(action = %action, "apply");
        self.check_caller(thread, &kind)?;
        self.metrics.record_action(kind.name());
        self.released.clear();

        let reply = self.handle(thread, kind)?;
        self.release_pass();
        let program_finished = self.check_termination()?;
        self.sync_metrics();

        let caller_finished = self.threads.status(thread) == ThreadStatus::Finished;
        let reply = if program_finished && caller_finished {
            Reply::ProgramFinished
        } else {
            reply
        };
        Ok(Step {
            caller: thread,
            reply,
            released: std::mem::take(&mut self.released),
            caller_may_continue: caller_finished || self.permits[thread.index()],
            program_finished,
        })
    }

    fn check_caller(&self, thread: ThreadId, kind: &ActionKind) -> Result<()> {
        if !self.threads.contains(thread) {
            return Err(Error::ThreadIdOutOfRange {
                thread,
                max: self.threads.capacity(),
            });
        }
        let status = self.threads.status(thread);
        match kind {
            ActionKind::Register if status != ThreadStatus::Unregistered => {
                Err(Error::AlreadyRegistered { thread })
            }
            ActionKind::Register => Ok(()),
            _ if status != ThreadStatus::Running => Err(Error::NotRunning {
                thread,
                action: kind.name(),
                status,
            }),
            _ => Ok(()),
        }
    }

    fn handle(&mut self, thread: ThreadId, kind: ActionKind) -> Result<Reply> {
        match kind {
            ActionKind::Done => self.done(thread),
            ActionKind::Register => self.register(thread),
            ActionKind::Fini => self.fini(thread),
            ActionKind::BeforeCreate => self.before_create(thread),
            ActionKind::AfterCreate { handle } => self.after_create(thread, handle),
            ActionKind::BeforeJoin { handle } => {
                if !self.joins.is_tracked(handle) && self.threads.handle_exited(handle) {
                    warn!(thread = %thread, handle = %handle, "join of an already joined thread");
                } else if self.joins.before_join(handle, thread) == JoinOutcome::Blocked {
                    self.thread_lock(thread, WaitSite::Join(handle));
                }
            }

            ActionKind::MutexInit { key } => self.mutexes.init(key, MutexEntry::default())?,
            ActionKind::MutexDestroy { key } => self.mutexes.destroy(key)?,
            ActionKind::MutexLock { key } => {
                if self.mutexes.get_or_create(key).lock(thread) == LockOutcome::Blocked {
                    self.thread_lock(thread, WaitSite::Mutex(key));
                }
            }
            ActionKind::MutexTryLock { key } => {
                return Ok(Reply::Acquired(self.mutexes.get_or_create(key).try_lock(thread)));
            }
            ActionKind::MutexUnlock { key } => self.unlock_mutex(thread, key),

            ActionKind::SemInit { key, value } => {
                self.semaphores.init(key, SemaphoreEntry::new(value))?;
            }
            ActionKind::SemDestroy { key } => self.semaphores.destroy(key)?,
            ActionKind::SemWait { key } => {
                if self.semaphores.get_or_create(key).wait(thread) == WaitOutcome::Blocked {
                    self.thread_lock(thread, WaitSite::Semaphore(key));
                }
            }
            ActionKind::SemTryWait { key } => {
                return Ok(Reply::Acquired(self.semaphores.get_or_create(key).try_wait()));
            }
            ActionKind::SemPost { key } => {
                if let Some(next) = self.semaphores.get_or_create(key).post() {
                    self.thread_unlock(next, thread);
                }
            }
            ActionKind::SemGetValue { key } => {
                return Ok(Reply::Value(self.semaphores.get_or_create(key).value()));
            }

            ActionKind::CondInit { key } => self.conds.init(key, CondEntry::default())?,
            ActionKind::CondDestroy { key } => self.conds.destroy(key)?,
            ActionKind::CondWait { cond, mutex } => {
                self.threads.record_mut(thread).payload = Payload::CondMutex(mutex);
                self.unlock_mutex(thread, mutex);
                self.conds.get_or_create(cond).wait(thread);
                self.thread_lock(thread, WaitSite::Cond(cond));
            }
            ActionKind::CondSignal { key } => {
                if let Some(waiter) = self.conds.get_or_create(key).signal() {
                    self.reacquire(waiter, thread);
                }
            }
            ActionKind::CondBroadcast { key } => {
                for waiter in self.conds.get_or_create(key).broadcast() {
                    self.reacquire(waiter, thread);
                }
            }

            ActionKind::RwInit { key } => self.rwlocks.init(key, RwLockEntry::default())?,
            ActionKind::RwDestroy { key } => self.rwlocks.destroy(key)?,
            ActionKind::RwRdLock { key } => self.lock_rw(thread, key, RwMode::Read),
            ActionKind::RwWrLock { key } => self.lock_rw(thread, key, RwMode::Write),
            ActionKind::RwTryRdLock { key } => {
                let acquired = self.rwlocks.get_or_create(key).try_lock(thread, RwMode::Read);
                return Ok(Reply::Acquired(acquired));
            }
            ActionKind::RwTryWrLock { key } => {
                let acquired = self.rwlocks.get_or_create(key).try_lock(thread, RwMode::Write);
                return Ok(Reply::Acquired(acquired));
            }
            ActionKind::RwUnlock { key, mode } => {
                let promoted = self.rwlocks.get_or_create(key).unlock(key, thread, mode)?;
                for next in promoted {
                    self.thread_unlock(next, thread);
                }
            }

            ActionKind::EnterExclusive { function } => {
                if !self.exclusive.entry(function).or_default().enter(thread) {
                    self.thread_lock(thread, WaitSite::Exclusive(function));
                }
            }
            ActionKind::LeaveExclusive { function } => match self.exclusive.get_mut(&function) {
                Some(handshake) => {
                    if let Some(next) = handshake.leave() {
                        self.thread_unlock(next, thread);
                    }
                }
                None => warn!(thread = %thread, function = %function, "leave of a function never entered"),
            },
        }
        Ok(Reply::Proceed)
    }

    // ── Thread lifecycle ──

    fn done(&mut self, thread: ThreadId) {
        let record = self.threads.record_mut(thread);
        record.progress = record.progress.saturating_add(self.round);
        let progress = record.progress;
        if !self.scheduler.sleep(thread, progress) {
            self.permits[thread.index()] = false;
        }
    }

    fn register(&mut self, thread: ThreadId) {
        if self.creation.gate.is_busy() {
            let progress = self
                .creation
                .creator
                .map_or(self.scheduler.watermark(), |c| self.threads.progress(c));
            match self.creation.pending {
                Pending::Nothing => {
                    self.start_thread(thread, progress, false);
                    self.threads.mark_blocked(thread, WaitSite::Creation);
                    self.trace_status(thread, ThreadStatus::Waiting);
                    self.creation.pending = Pending::Registered(thread);
                    info!(thread = %thread, progress, "registered ahead of its creator");
                    return;
                }
                Pending::Handle(handle) => {
                    self.start_thread(thread, progress, true);
                    self.bind(thread, handle);
                    if let Some(creator) = self.creation.creator {
                        self.thread_unlock(creator, thread);
                    }
                    self.end_creation(thread);
                    info!(thread = %thread, progress, handle = %handle, "registered");
                    return;
                }
                Pending::Registered(other) => {
                    warn!(thread = %thread, pending = %other, "second registration during one creation");
                }
            }
        } else if self.threads.none_registered() {
            self.start_thread(thread, 0, true);
            info!(thread = %thread, "root thread registered");
            return;
        }
        let progress = self.scheduler.watermark();
        warn!(thread = %thread, progress, "registration without a matching create");
        self.start_thread(thread, progress, true);
    }

    fn fini(&mut self, thread: ThreadId) {
        let handle = self.threads.record(thread).create_value;
        self.thread_finish(thread);
        if let Some(handle) = handle {
            for joiner in self.joins.on_exit(handle) {
                self.thread_unlock(joiner, thread);
            }
        }
        info!(thread = %thread, "thread finished");
    }

    fn before_create(&mut self, thread: ThreadId) {
        if self.creation.gate.enter(thread) {
            self.creation.creator = Some(thread);
            self.creation.pending = Pending::Nothing;
        } else {
            self.thread_lock(thread, WaitSite::Creation);
        }
    }

    fn after_create(&mut self, thread: ThreadId, handle: Option<OsHandle>) {
        if self.creation.creator != Some(thread) {
            warn!(thread = %thread, "create returned in a thread that is not creating");
            return;
        }
        match (handle, self.creation.pending) {
            (None, pending) => {
                warn!(thread = %thread, "thread creation failed");
                if let Pending::Registered(orphan) = pending {
                    self.thread_unlock(orphan, thread);
                }
                self.end_creation(thread);
            }
            (Some(handle), Pending::Registered(child)) => {
                self.bind(child, handle);
                self.thread_unlock(child, thread);
                self.end_creation(thread);
            }
            (Some(handle), Pending::Nothing) => {
                self.creation.pending = Pending::Handle(handle);
                self.thread_lock(thread, WaitSite::Creation);
            }
            (Some(handle), Pending::Handle(previous)) => {
                warn!(thread = %thread, %previous, %handle, "create returned twice");
                self.creation.pending = Pending::Handle(handle);
            }
        }
    }

    fn bind(&mut self, child: ThreadId, handle: OsHandle) {
        self.threads.record_mut(child).create_value = Some(handle);
        debug!(thread = %child, handle = %handle, "creation bound");
    }

    fn end_creation(&mut self, unlocker: ThreadId) {
        self.creation.creator = None;
        self.creation.pending = Pending::Nothing;
        if let Some(next) = self.creation.gate.leave() {
            self.creation.creator = Some(next);
            self.thread_unlock(next, unlocker);
        }
    }

    fn start_thread(&mut self, thread: ThreadId, progress: u64, schedule: bool) {
        self.threads.mark_started(thread, progress);
        self.trace.register(thread, self.clock.tick(progress));
        self.permits[thread.index()] = false;
        if schedule {
            self.scheduler.insert(thread, progress);
        }
    }

    /// Running thread blocks in `site`.
    fn thread_lock(&mut self, thread: ThreadId, site: WaitSite) {
        self.permits[thread.index()] = false;
        self.threads.mark_blocked(thread, site);
        self.trace_status(thread, ThreadStatus::Waiting);
        self.scheduler.remove_running();
        debug!(thread = %thread, %site, "blocked");
    }

    /// Blocked thread becomes runnable at its waker's progress.
    fn thread_unlock(&mut self, thread: ThreadId, unlocker: ThreadId) {
        let progress = self.threads.progress(unlocker);
        self.threads.mark_woken(thread, progress);
        self.trace_status(thread, ThreadStatus::Running);
        self.scheduler.insert(thread, progress);
        debug!(thread = %thread, by = %unlocker, progress, "woken");
    }

    fn thread_finish(&mut self, thread: ThreadId) {
        let tick = self.clock.tick(self.threads.progress(thread));
        self.threads.mark_finished(thread);
        self.trace.finish(thread, tick);
        self.permits[thread.index()] = false;
        self.scheduler.remove_running();
    }

    fn trace_status(&mut self, thread: ThreadId, status: ThreadStatus) {
        let tick = self.clock.tick(self.threads.progress(thread));
        self.trace.update(thread, tick, status);
    }

    // ── Primitive helpers ──

    fn unlock_mutex(&mut self, unlocker: ThreadId, key: PrimitiveKey) {
        match self.mutexes.get_or_create(key).unlock(unlocker) {
            UnlockOutcome::HandedOff(next) => self.thread_unlock(next, unlocker),
            UnlockOutcome::Released => {}
            UnlockOutcome::AlreadyUnlocked => {
                warn!(thread = %unlocker, key = %key, "unlock of an unlocked mutex");
            }
            UnlockOutcome::NotOwner(owner) => {
                warn!(thread = %unlocker, key = %key, %owner, "unlock of a mutex held by another thread");
            }
        }
    }

    /// Hands a signalled condition waiter to the mutex it waited with.
    fn reacquire(&mut self, waiter: ThreadId, waker: ThreadId) {
        let payload = std::mem::take(&mut self.threads.record_mut(waiter).payload);
        match payload {
            Payload::CondMutex(mutex) => match self.mutexes.get_or_create(mutex).lock(waiter) {
                LockOutcome::Acquired => self.thread_unlock(waiter, waker),
                LockOutcome::Blocked => self.threads.requeue(waiter, WaitSite::Mutex(mutex)),
            },
            Payload::Empty => {
                warn!(thread = %waiter, "condition waiter without a stashed mutex");
                self.thread_unlock(waiter, waker);
            }
        }
    }

    fn lock_rw(&mut self, thread: ThreadId, key: PrimitiveKey, mode: RwMode) {
        if self.rwlocks.get_or_create(key).lock(thread, mode) == RwOutcome::Blocked {
            self.thread_lock(thread, WaitSite::RwLock(key));
        }
    }

    // ── Release and termination ──

    fn release_pass(&mut self) {
        while let Some(thread) = self.scheduler.awake() {
            self.permits[thread.index()] = true;
            self.released.push(thread);
            self.metrics.releases.inc();
            trace!(thread = %thread, watermark = self.scheduler.watermark(), "released");
        }
    }

    fn check_termination(&mut self) -> Result<bool> {
        if !self.scheduler.is_idle()
            || self.creation.gate.is_busy()
            || self.threads.none_registered()
        {
            return Ok(false);
        }
        if self.threads.all_finished() {
            if self.finished {
                return Ok(false);
            }
            self.finished = true;
            info!(rounds = self.scheduler.rounds(), "program finished");
            return Ok(true);
        }
        let blocked = self.threads.blocked();
        error!(?blocked, "deadlock detected");
        Err(Error::Deadlock { blocked })
    }

    fn sync_metrics(&mut self) {
        self.metrics.rounds.record_total(self.scheduler.rounds());
        self.metrics
            .fast_path
            .record_total(self.scheduler.fast_path_hits());
        self.metrics
            .compressions
            .record_total(self.trace.compressions());
        let implicit = self.mutexes.implicit_creations()
            + self.semaphores.implicit_creations()
            + self.conds.implicit_creations()
            + self.rwlocks.implicit_creations();
        self.metrics.implicit_primitives.record_total(implicit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: u32) -> ThreadId {
        ThreadId::new(n)
    }

    fn key(n: u64) -> PrimitiveKey {
        PrimitiveKey::new(n)
    }

    fn state() -> EngineState {
        EngineState::new(&EngineConfig::default().with_max_threads(8))
    }

    fn apply(state: &mut EngineState, thread: u32, kind: ActionKind) -> Step {
        state.apply(Action::new(tid(thread), kind)).unwrap()
    }

    /// Registers T0 as root and creates T1..=n from it (handle = id + 100).
    fn spawn_all(state: &mut EngineState, n: u32) {
        apply(state, 0, ActionKind::Register);
        for child in 1..=n {
            apply(state, 0, ActionKind::BeforeCreate);
            apply(state, 0, ActionKind::AfterCreate {
                handle: Some(OsHandle::new(u64::from(child) + 100)),
            });
            let step = apply(state, child, ActionKind::Register);
            assert!(step.released.contains(&tid(0)));
        }
    }

    #[test]
    fn root_registration_releases_root() {
        crate::test_utils::init_test_logging();
        let mut s = state();
        let step = apply(&mut s, 0, ActionKind::Register);
        assert!(step.caller_may_continue);
        assert_eq!(step.released.as_slice(), &[tid(0)]);
        assert_eq!(s.threads().status(tid(0)), ThreadStatus::Running);
    }

    #[test]
    fn out_of_range_thread_is_fatal() {
        let mut s = state();
        let err = s.apply(Action::new(tid(8), ActionKind::Register)).unwrap_err();
        assert!(matches!(err, Error::ThreadIdOutOfRange { max: 8, .. }));
    }

    #[test]
    fn action_from_unregistered_thread_is_fatal() {
        let mut s = state();
        let err = s.apply(Action::new(tid(1), ActionKind::Done)).unwrap_err();
        assert_eq!(err.kind_name(), "not_running");
    }

    #[test]
    fn double_registration_is_fatal() {
        let mut s = state();
        apply(&mut s, 0, ActionKind::Register);
        let err = s.apply(Action::new(tid(0), ActionKind::Register)).unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered { .. }));
    }

    #[test]
    fn children_start_at_creator_progress() {
        let mut s = state();
        apply(&mut s, 0, ActionKind::Register);
        for _ in 0..3 {
            apply(&mut s, 0, ActionKind::Done);
        }
        apply(&mut s, 0, ActionKind::BeforeCreate);
        apply(&mut s, 0, ActionKind::AfterCreate {
            handle: Some(OsHandle::new(7)),
        });
        apply(&mut s, 1, ActionKind::Register);
        assert_eq!(s.threads().progress(tid(1)), 3);
        assert_eq!(s.threads().record(tid(1)).create_value, Some(OsHandle::new(7)));
    }

    #[test]
    fn lone_thread_uses_fast_path() {
        let mut s = state();
        apply(&mut s, 0, ActionKind::Register);
        for _ in 0..4 {
            let step = apply(&mut s, 0, ActionKind::Done);
            assert!(step.caller_may_continue);
            assert!(step.released.is_empty());
        }
        assert_eq!(s.metrics().fast_path.value(), 4);
        assert_eq!(s.metrics().rounds.value(), 4);
    }

    #[test]
    fn blocked_mutex_waiter_adopts_unlocker_progress() {
        let mut s = state();
        spawn_all(&mut s, 1);
        let m = key(0x10);
        apply(&mut s, 0, ActionKind::MutexLock { key: m });
        let step = apply(&mut s, 1, ActionKind::MutexLock { key: m });
        assert!(!step.caller_may_continue);
        assert_eq!(s.threads().status(tid(1)), ThreadStatus::Waiting);

        let step = apply(&mut s, 0, ActionKind::MutexUnlock { key: m });
        assert!(step.released.contains(&tid(1)));
        assert_eq!(s.threads().status(tid(1)), ThreadStatus::Running);
        assert_eq!(s.threads().progress(tid(1)), s.threads().progress(tid(0)));
        assert!(s.mutex(m).unwrap().is_locked());
    }

    #[test]
    fn trylock_and_semaphore_replies() {
        let mut s = state();
        apply(&mut s, 0, ActionKind::Register);
        let m = key(0x20);
        assert_eq!(apply(&mut s, 0, ActionKind::MutexTryLock { key: m }).reply, Reply::Acquired(true));
        assert_eq!(apply(&mut s, 0, ActionKind::MutexTryLock { key: m }).reply, Reply::Acquired(false));

        let sem = key(0x30);
        apply(&mut s, 0, ActionKind::SemInit { key: sem, value: 2 });
        assert_eq!(apply(&mut s, 0, ActionKind::SemTryWait { key: sem }).reply, Reply::Acquired(true));
        assert_eq!(apply(&mut s, 0, ActionKind::SemGetValue { key: sem }).reply, Reply::Value(1));
    }

    #[test]
    fn deadlock_is_detected() {
        crate::test_utils::init_test_logging();
        let mut s = state();
        spawn_all(&mut s, 1);
        let (a, b) = (key(1), key(2));
        apply(&mut s, 0, ActionKind::MutexLock { key: a });
        apply(&mut s, 1, ActionKind::MutexLock { key: b });
        apply(&mut s, 0, ActionKind::MutexLock { key: b });
        let err = s
            .apply(Action::new(tid(1), ActionKind::MutexLock { key: a }))
            .unwrap_err();
        match err {
            Error::Deadlock { blocked } => assert_eq!(blocked, vec![tid(0), tid(1)]),
            other => panic!("expected deadlock, got {other}"),
        }
    }

    #[test]
    fn program_finished_reported_once() {
        let mut s = state();
        spawn_all(&mut s, 1);
        let step = apply(&mut s, 1, ActionKind::Fini);
        assert!(!step.program_finished);
        assert!(step.caller_may_continue);
        let step = apply(&mut s, 0, ActionKind::Fini);
        assert!(step.program_finished);
        assert_eq!(step.reply, Reply::ProgramFinished);
        assert!(s.is_finished());
    }

    #[test]
    fn join_waits_for_exit() {
        let mut s = state();
        spawn_all(&mut s, 1);
        let h = OsHandle::new(101);
        let step = apply(&mut s, 0, ActionKind::BeforeJoin { handle: h });
        assert!(!step.caller_may_continue);
        let step = apply(&mut s, 1, ActionKind::Fini);
        assert!(step.released.contains(&tid(0)));
        assert!(!step.program_finished);
        let step = apply(&mut s, 0, ActionKind::BeforeJoin { handle: h });
        assert!(step.caller_may_continue);
    }

    #[test]
    fn exclusive_section_serializes_callers() {
        let mut s = state();
        spawn_all(&mut s, 1);
        let f = key(0xf00);
        apply(&mut s, 0, ActionKind::EnterExclusive { function: f });
        let step = apply(&mut s, 1, ActionKind::EnterExclusive { function: f });
        assert!(!step.caller_may_continue);
        let step = apply(&mut s, 0, ActionKind::LeaveExclusive { function: f });
        assert!(step.released.contains(&tid(1)));
        apply(&mut s, 1, ActionKind::LeaveExclusive { function: f });
        apply(&mut s, 1, ActionKind::LeaveExclusive { function: f });
    }

    #[test]
    fn failed_create_frees_the_handshake() {
        let mut s = state();
        apply(&mut s, 0, ActionKind::Register);
        apply(&mut s, 0, ActionKind::BeforeCreate);
        let step = apply(&mut s, 0, ActionKind::AfterCreate { handle: None });
        assert!(step.caller_may_continue);
        assert!(!s.creation.gate.is_busy());
    }
}
