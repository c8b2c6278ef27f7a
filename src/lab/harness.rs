//! Runs a [`Scenario`] on real OS threads against a shared [`Engine`].
//!
//! Each script runs on its own `std::thread`, submitting one action per
//! observed event exactly the way an instrumented program would. Thread
//! creation follows the two-sided handshake: the creator submits
//! `BeforeCreate`, spawns the OS thread, then reports the new handle with
//! `AfterCreate`, while the child independently submits `Register` first
//! thing. The two sides race, and the engine pairs them in either order.

use super::scenario::{Op, Scenario, ScenarioError};
use crate::error::{Error, Result};
use crate::observability::EngineMetrics;
use crate::runtime::{Action, ActionKind, Engine, Reply};
use crate::tracing_compat::{debug, info, warn};
use crate::trace::TraceReport;
use crate::types::{OsHandle, PrimitiveKey, ThreadId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

/// First OS handle handed out to spawned threads.
const FIRST_HANDLE: u64 = 0x1000;

/// Outcome of a completed scenario run.
#[derive(Debug, Clone)]
pub struct HarnessReport {
    /// Scenario name.
    pub scenario: String,
    /// Trace report of the run.
    pub report: TraceReport,
    /// Engine statistics at the end of the run.
    pub metrics: EngineMetrics,
    /// Whether the engine saw every thread finish.
    pub finished: bool,
    /// Number of threads the run started, root included.
    pub threads: u32,
}

/// Scenario runner.
#[derive(Debug)]
pub struct Harness {
    engine: Arc<Engine>,
    scenario: Arc<Scenario>,
}

impl Harness {
    /// Validates `scenario` and builds an engine from its configuration.
    pub fn new(scenario: Scenario) -> Result<Self> {
        let engine = Engine::new(scenario.engine.clone())?;
        Self::with_engine(scenario, Arc::new(engine))
    }

    /// Validates `scenario` and runs it against an existing engine.
    pub fn with_engine(scenario: Scenario, engine: Arc<Engine>) -> Result<Self> {
        scenario.validate()?;
        Ok(Self {
            engine,
            scenario: Arc::new(scenario),
        })
    }

    /// The engine the scenario runs against.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Runs the scenario to completion.
    ///
    /// Returns the first fatal error any worker hit, preferring the root
    /// cause over the [`Error::Aborted`] seen by the other workers.
    pub fn run(self) -> Result<HarnessReport> {
        info!(scenario = %self.scenario.name, "running scenario");
        let shared = Arc::new(Shared {
            engine: Arc::clone(&self.engine),
            scenario: Arc::clone(&self.scenario),
            next_thread: AtomicU32::new(1),
            next_handle: AtomicU64::new(FIRST_HANDLE),
            orphans: Mutex::new(Vec::new()),
        });

        let root = ThreadId::new(0);
        let main = self.scenario.main.clone();
        let worker = Worker::new(Arc::clone(&shared), root);
        let join = thread::Builder::new()
            .name(format!("pram-{root}"))
            .spawn(move || worker.run(&main))?;

        let mut outcomes = vec![collect(root, join)];
        loop {
            let batch = std::mem::take(&mut *shared.orphans.lock());
            if batch.is_empty() {
                break;
            }
            outcomes.extend(batch.into_iter().map(|(id, join)| collect(id, join)));
        }
        first_failure(outcomes)?;

        let report = HarnessReport {
            scenario: self.scenario.name.clone(),
            report: self.engine.report(),
            metrics: self.engine.metrics(),
            finished: self.engine.is_finished(),
            threads: shared.next_thread.load(Ordering::Acquire),
        };
        info!(
            scenario = %report.scenario,
            threads = report.threads,
            rounds = report.metrics.rounds.value(),
            "scenario finished"
        );
        Ok(report)
    }
}

/// Validates and runs `scenario` with the engine configuration it carries.
pub fn run(scenario: Scenario) -> Result<HarnessReport> {
    Harness::new(scenario)?.run()
}

#[derive(Debug)]
struct Shared {
    engine: Arc<Engine>,
    scenario: Arc<Scenario>,
    next_thread: AtomicU32,
    next_handle: AtomicU64,
    // Children whose creator exited without joining them.
    orphans: Mutex<Vec<(ThreadId, JoinHandle<Result<()>>)>>,
}

#[derive(Debug)]
struct Child {
    id: ThreadId,
    handle: OsHandle,
    join: JoinHandle<Result<()>>,
}

struct Worker {
    shared: Arc<Shared>,
    id: ThreadId,
    children: Vec<Option<Child>>,
}

impl Worker {
    fn new(shared: Arc<Shared>, id: ThreadId) -> Self {
        Self {
            shared,
            id,
            children: Vec::new(),
        }
    }

    fn run(mut self, script: &[Op]) -> Result<()> {
        let result = self.run_script(script);
        let unjoined = self
            .children
            .drain(..)
            .flatten()
            .map(|child| (child.id, child.join));
        self.shared.orphans.lock().extend(unjoined);
        result
    }

    fn run_script(&mut self, script: &[Op]) -> Result<()> {
        self.act(ActionKind::Register)?;
        self.exec(script)?;
        self.act(ActionKind::Fini)?;
        Ok(())
    }

    fn act(&self, kind: ActionKind) -> Result<Reply> {
        self.shared.engine.dispatch(Action::new(self.id, kind))
    }

    fn exec(&mut self, ops: &[Op]) -> Result<()> {
        for op in ops {
            match op {
                Op::Work { steps } => {
                    for _ in 0..*steps {
                        self.act(ActionKind::Done)?;
                    }
                }
                Op::MutexInit { mutex } => {
                    self.act(ActionKind::MutexInit { key: key(*mutex) })?;
                }
                Op::Lock { mutex } => {
                    self.act(ActionKind::MutexLock { key: key(*mutex) })?;
                }
                Op::TryLock { mutex } => {
                    while !self
                        .act(ActionKind::MutexTryLock { key: key(*mutex) })?
                        .acquired()
                    {
                        self.act(ActionKind::Done)?;
                    }
                }
                Op::Unlock { mutex } => {
                    self.act(ActionKind::MutexUnlock { key: key(*mutex) })?;
                }
                Op::MutexDestroy { mutex } => {
                    self.act(ActionKind::MutexDestroy { key: key(*mutex) })?;
                }
                Op::SemInit { sem, value } => {
                    self.act(ActionKind::SemInit {
                        key: key(*sem),
                        value: *value,
                    })?;
                }
                Op::Wait { sem } => {
                    self.act(ActionKind::SemWait { key: key(*sem) })?;
                }
                Op::TryWait { sem } => {
                    while !self
                        .act(ActionKind::SemTryWait { key: key(*sem) })?
                        .acquired()
                    {
                        self.act(ActionKind::Done)?;
                    }
                }
                Op::Post { sem } => {
                    self.act(ActionKind::SemPost { key: key(*sem) })?;
                }
                Op::CondWait { cond, mutex } => {
                    self.act(ActionKind::CondWait {
                        cond: key(*cond),
                        mutex: key(*mutex),
                    })?;
                }
                Op::Signal { cond } => {
                    self.act(ActionKind::CondSignal { key: key(*cond) })?;
                }
                Op::Broadcast { cond } => {
                    self.act(ActionKind::CondBroadcast { key: key(*cond) })?;
                }
                Op::ReadLock { rwlock } => {
                    self.act(ActionKind::RwRdLock { key: key(*rwlock) })?;
                }
                Op::WriteLock { rwlock } => {
                    self.act(ActionKind::RwWrLock { key: key(*rwlock) })?;
                }
                Op::RwUnlock { rwlock, mode } => {
                    self.act(ActionKind::RwUnlock {
                        key: key(*rwlock),
                        mode: *mode,
                    })?;
                }
                Op::Exclusive { function, ops } => {
                    self.act(ActionKind::EnterExclusive {
                        function: key(*function),
                    })?;
                    self.exec(ops)?;
                    self.act(ActionKind::LeaveExclusive {
                        function: key(*function),
                    })?;
                }
                Op::Spawn { script } => self.spawn(script)?,
                Op::Join { spawn } => self.join(*spawn)?,
                Op::Repeat { times, ops } => {
                    for _ in 0..*times {
                        self.exec(ops)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn spawn(&mut self, name: &str) -> Result<()> {
        let script = self
            .shared
            .scenario
            .scripts
            .get(name)
            .cloned()
            .ok_or_else(|| ScenarioError::UnknownScript {
                owner: self.id.to_string(),
                script: name.to_string(),
            })?;

        self.act(ActionKind::BeforeCreate)?;
        let id = ThreadId::new(self.shared.next_thread.fetch_add(1, Ordering::AcqRel));
        let worker = Self::new(Arc::clone(&self.shared), id);
        let spawned = thread::Builder::new()
            .name(format!("pram-{id}"))
            .spawn(move || worker.run(&script));

        match spawned {
            Ok(join) => {
                let handle = OsHandle::new(self.shared.next_handle.fetch_add(1, Ordering::AcqRel));
                debug!(creator = %self.id, child = %id, handle = %handle, script = name, "spawned worker");
                self.children.push(Some(Child { id, handle, join }));
                self.act(ActionKind::AfterCreate {
                    handle: Some(handle),
                })?;
                Ok(())
            }
            Err(err) => {
                warn!(creator = %self.id, error = %err, "failed to spawn worker");
                self.act(ActionKind::AfterCreate { handle: None })?;
                Err(err.into())
            }
        }
    }

    fn join(&mut self, index: usize) -> Result<()> {
        let child = self
            .children
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| ScenarioError::JoinBeforeSpawn {
                owner: self.id.to_string(),
                spawn: index,
            })?;
        self.act(ActionKind::BeforeJoin {
            handle: child.handle,
        })?;
        collect(child.id, child.join)
    }
}

fn key(raw: u64) -> PrimitiveKey {
    PrimitiveKey::new(raw)
}

fn collect(id: ThreadId, join: JoinHandle<Result<()>>) -> Result<()> {
    join.join()
        .map_err(|_| Error::WorkerPanicked { thread: id })?
}

fn first_failure(outcomes: Vec<Result<()>>) -> Result<()> {
    let mut aborted = false;
    for outcome in outcomes {
        match outcome {
            Ok(()) => {}
            Err(Error::Aborted) => aborted = true,
            Err(err) => return Err(err),
        }
    }
    if aborted { Err(Error::Aborted) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn engine_config() -> EngineConfig {
        EngineConfig::default().with_max_threads(8)
    }

    #[test]
    fn single_thread_scenario_finishes() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("single_thread_scenario_finishes");
        let scenario =
            Scenario::new("solo", vec![Op::Work { steps: 3 }]).with_engine(engine_config());
        let outcome = run(scenario).unwrap();
        assert!(outcome.finished);
        assert_eq!(outcome.threads, 1);
        assert_eq!(outcome.metrics.action_count("done"), 3);
        assert_eq!(outcome.report.threads.len(), 1);
        crate::test_complete!("single_thread_scenario_finishes");
    }

    #[test]
    fn spawned_workers_share_a_mutex() {
        crate::test_utils::init_test_logging();
        let worker = vec![
            Op::Lock { mutex: 0x10 },
            Op::Work { steps: 2 },
            Op::Unlock { mutex: 0x10 },
        ];
        let scenario = Scenario::new("pair", vec![
            Op::MutexInit { mutex: 0x10 },
            Op::Spawn {
                script: "worker".into(),
            },
            Op::Spawn {
                script: "worker".into(),
            },
            Op::Join { spawn: 0 },
            Op::Join { spawn: 1 },
        ])
        .with_script("worker", worker)
        .with_engine(engine_config());

        let outcome = run(scenario).unwrap();
        assert!(outcome.finished);
        assert_eq!(outcome.threads, 3);
        assert_eq!(outcome.metrics.action_count("mutex_lock"), 2);
        assert_eq!(outcome.metrics.action_count("done"), 4);
    }

    #[test]
    fn unjoined_workers_are_collected() {
        let scenario = Scenario::new("detached", vec![Op::Spawn {
            script: "w".into(),
        }])
        .with_script("w", vec![Op::Work { steps: 2 }])
        .with_engine(engine_config());
        let outcome = run(scenario).unwrap();
        assert!(outcome.finished);
        assert_eq!(outcome.threads, 2);
    }

    #[test]
    fn self_deadlock_surfaces_as_error() {
        crate::test_utils::init_test_logging();
        let scenario = Scenario::new("stuck", vec![Op::Wait { sem: 0x20 }])
            .with_engine(engine_config());
        let err = run(scenario).unwrap_err();
        assert!(matches!(err, Error::Deadlock { .. }), "{err}");
    }

    #[test]
    fn invalid_scenario_is_rejected_before_running() {
        let scenario = Scenario::new("bad", vec![Op::Join { spawn: 0 }]);
        let err = Harness::new(scenario).unwrap_err();
        assert_eq!(err.kind_name(), "scenario");
    }

    #[test]
    fn first_failure_prefers_root_cause() {
        let outcomes = vec![
            Err(Error::Aborted),
            Err(Error::Deadlock {
                blocked: vec![ThreadId::new(1)],
            }),
            Ok(()),
        ];
        assert!(matches!(
            first_failure(outcomes),
            Err(Error::Deadlock { .. })
        ));
        assert!(matches!(
            first_failure(vec![Ok(()), Err(Error::Aborted)]),
            Err(Error::Aborted)
        ));
        assert!(first_failure(vec![Ok(())]).is_ok());
    }
}
