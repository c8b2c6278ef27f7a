//! Shared helpers for integration tests.

#![allow(dead_code)]
#![allow(unused_macros)]

use pramsync::runtime::{EngineState, Step};
use pramsync::{Action, ActionKind, EngineConfig, OsHandle, ThreadId};
use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a test-writer subscriber once per test binary.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pramsync=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = $name, "test phase start");
    };
}

macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = $name, "test complete");
    };
}

pub fn tid(n: u32) -> ThreadId {
    ThreadId::new(n)
}

/// Handle assigned to thread `n` by [`spawn_all`].
pub fn handle_of(n: u32) -> OsHandle {
    OsHandle::new(100 + u64::from(n))
}

pub fn apply(state: &mut EngineState, thread: ThreadId, kind: ActionKind) -> Step {
    state
        .apply(Action::new(thread, kind))
        .unwrap_or_else(|err| panic!("{thread} rejected: {err}"))
}

/// Registers the root and lets it create threads `1..count`, each at the
/// root's progress.
pub fn spawn_all(config: &EngineConfig, count: u32) -> EngineState {
    let mut state = EngineState::new(config);
    apply(&mut state, tid(0), ActionKind::Register);
    for child in 1..count {
        apply(&mut state, tid(0), ActionKind::BeforeCreate);
        apply(&mut state, tid(0), ActionKind::AfterCreate {
            handle: Some(handle_of(child)),
        });
        apply(&mut state, tid(child), ActionKind::Register);
    }
    state
}

/// Outcome of [`drive`].
#[derive(Debug, Default)]
pub struct DriveOutcome {
    /// Actions applied.
    pub steps: usize,
    /// Number of steps that reported program completion.
    pub finished_reports: usize,
}

/// Plays `scripts` against `state` the way the dispatcher would: at every
/// step the lowest-numbered thread holding a permit submits its next action.
/// `check` runs after every applied action.
pub fn drive(
    state: &mut EngineState,
    scripts: &mut [std::collections::VecDeque<ActionKind>],
    mut check: impl FnMut(&EngineState, &Step),
) -> DriveOutcome {
    let mut outcome = DriveOutcome::default();
    loop {
        let next = (0..scripts.len()).find(|&t| {
            !scripts[t].is_empty() && state.has_permit(tid(t as u32))
        });
        let Some(t) = next else { break };
        let Some(kind) = scripts[t].pop_front() else { break };
        let step = apply(state, tid(t as u32), kind);
        outcome.steps += 1;
        if step.program_finished {
            outcome.finished_reports += 1;
        }
        check(state, &step);
    }
    outcome
}

/// `rounds` rounds of computation followed by exit.
pub fn rounds_then_exit(rounds: usize) -> std::collections::VecDeque<ActionKind> {
    std::iter::repeat_n(ActionKind::Done, rounds)
        .chain(std::iter::once(ActionKind::Fini))
        .collect()
}

/// Largest progress gap between threads currently marked running.
pub fn running_spread(state: &EngineState) -> u64 {
    let progress: Vec<u64> = state
        .threads()
        .iter_seen()
        .filter(|r| r.status == pramsync::ThreadStatus::Running)
        .map(|r| r.progress)
        .collect();
    match (progress.iter().min(), progress.iter().max()) {
        (Some(lo), Some(hi)) => hi - lo,
        _ => 0,
    }
}
