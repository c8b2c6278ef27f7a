//! The action dispatcher.
//!
//! [`Engine::dispatch`] is the single serialization point between observed
//! threads. Each call locks the engine state, applies the action, opens the
//! gates of the threads the release pass let through, and then blocks the
//! calling thread on its own gate until it is allowed to continue.
//!
//! A fatal error aborts the run: every gate is opened so no thread stays
//! parked, and every later or resumed call returns [`Error::Aborted`].
//!
//! # Example
//!
//! ```
//! use pramsync::{Action, ActionKind, Engine, EngineConfig, Reply, ThreadId};
//!
//! let engine = Engine::new(EngineConfig::default().with_max_threads(4))?;
//! let main = ThreadId::new(0);
//! engine.dispatch(Action::new(main, ActionKind::Register))?;
//! engine.dispatch(Action::new(main, ActionKind::Done))?;
//! let reply = engine.dispatch(Action::new(main, ActionKind::Fini))?;
//! assert_eq!(reply, Reply::ProgramFinished);
//! # Ok::<(), pramsync::Error>(())
//! ```

use super::action::{Action, Reply};
use super::gate::Gate;
use super::snapshot::EngineSnapshot;
use super::state::EngineState;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::observability::EngineMetrics;
use crate::trace::TraceReport;
use crate::tracing_compat::{error, info};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Lockstep synchronization engine shared by all observed threads.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    state: Mutex<EngineState>,
    gates: Box<[Gate]>,
    aborted: AtomicBool,
}

impl Engine {
    /// Creates an engine after validating `config`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let state = EngineState::new(&config);
        let gates = (0..config.max_threads).map(|_| Gate::new()).collect();
        info!(
            max_threads = config.max_threads,
            round = config.instructions_per_round,
            mode = %config.mode,
            "engine created"
        );
        Ok(Self {
            config,
            state: Mutex::new(state),
            gates,
            aborted: AtomicBool::new(false),
        })
    }

    /// The configuration the engine runs with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Submits one action and blocks until the caller may continue.
    pub fn dispatch(&self, action: Action) -> Result<Reply> {
        if self.is_aborted() {
            return Err(Error::Aborted);
        }
        let mut state = self.state.lock();
        let step = match state.apply(action) {
            Ok(step) => step,
            Err(err) => {
                drop(state);
                self.abort(&err);
                return Err(err);
            }
        };

        let gate = &self.gates[step.caller.index()];
        if !step.caller_may_continue {
            gate.close();
        }
        for thread in &step.released {
            self.gates[thread.index()].open();
        }
        drop(state);

        gate.wait();
        if self.is_aborted() {
            return Err(Error::Aborted);
        }
        Ok(step.reply)
    }

    fn abort(&self, err: &Error) {
        error!(error = %err, kind = err.kind_name(), "fatal error, aborting run");
        self.aborted.store(true, Ordering::Release);
        for gate in &self.gates {
            gate.open();
        }
    }

    /// Returns true once a fatal error aborted the run.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Returns true once every registered thread finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.lock().is_finished()
    }

    /// Human-readable dump of threads, primitives, and statistics.
    #[must_use]
    pub fn print_state(&self) -> String {
        self.snapshot().to_string()
    }

    /// Serializable dump of the whole state.
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        self.state.lock().snapshot()
    }

    /// Statistics so far.
    #[must_use]
    pub fn metrics(&self) -> EngineMetrics {
        self.state.lock().metrics().clone()
    }

    /// Builds the trace report.
    #[must_use]
    pub fn report(&self) -> TraceReport {
        self.state.lock().report()
    }

    /// Writes the trace report to the configured output path.
    pub fn write_report(&self) -> Result<PathBuf> {
        let path = self.config.output_path.clone();
        self.write_report_to(&path)?;
        Ok(path)
    }

    /// Writes the trace report to `path`.
    pub fn write_report_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.report().write_to(path)?;
        info!(path = %path.display(), "trace report written");
        Ok(())
    }
}
