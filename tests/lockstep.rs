//! Lockstep scheduling: rounds, slack, and time mode.

#[macro_use]
mod common;

use common::{apply, drive, rounds_then_exit, running_spread, spawn_all, tid};
use pramsync::runtime::EngineState;
use pramsync::{ActionKind, ClockMode, EngineConfig, PrimitiveKey, Reply};
use std::collections::VecDeque;

fn config(round: u64, period: u64) -> EngineConfig {
    EngineConfig::default()
        .with_max_threads(8)
        .with_instructions_per_round(round)
        .with_sync_period(period)
}

#[test]
fn three_threads_advance_five_rounds_in_lockstep() {
    common::init_test_logging();
    test_phase!("three_threads_advance_five_rounds_in_lockstep");
    let mut state = spawn_all(&config(1, 1), 3);
    let mut scripts: Vec<VecDeque<ActionKind>> = (0..3).map(|_| rounds_then_exit(5)).collect();

    let mut max_spread = 0;
    let mut last_reply = None;
    let outcome = drive(&mut state, &mut scripts, |state, step| {
        max_spread = max_spread.max(running_spread(state));
        if step.program_finished {
            last_reply = Some((step.caller, step.reply));
        }
    });

    assert!(scripts.iter().all(VecDeque::is_empty));
    assert_eq!(outcome.steps, 18);
    assert_eq!(outcome.finished_reports, 1);
    assert_eq!(last_reply, Some((tid(2), Reply::ProgramFinished)));
    assert!(max_spread <= 1, "spread {max_spread}");
    assert_eq!(state.metrics().rounds.value(), 5);
    assert!(state.is_finished());
    assert_eq!(state.report().end, 5);
    test_complete!("three_threads_advance_five_rounds_in_lockstep");
}

#[test]
fn round_size_scales_progress() {
    let mut state = spawn_all(&config(10, 1), 2);
    let mut scripts: Vec<VecDeque<ActionKind>> = (0..2).map(|_| rounds_then_exit(3)).collect();
    let mut max_spread = 0;
    drive(&mut state, &mut scripts, |state, _| {
        max_spread = max_spread.max(running_spread(state));
    });
    assert!(max_spread <= 10, "spread {max_spread}");
    assert_eq!(state.threads().progress(tid(0)), 30);
    assert_eq!(state.threads().progress(tid(1)), 30);
    assert_eq!(state.report().end, 30);
}

#[test]
fn sync_period_allows_bounded_run_ahead() {
    common::init_test_logging();
    let mut state = spawn_all(&config(1, 3), 3);
    let mut scripts: Vec<VecDeque<ActionKind>> = (0..3).map(|_| rounds_then_exit(6)).collect();
    let mut max_spread = 0;
    let outcome = drive(&mut state, &mut scripts, |state, _| {
        max_spread = max_spread.max(running_spread(state));
    });
    assert_eq!(outcome.finished_reports, 1);
    assert_eq!(max_spread, 3);
}

#[test]
fn time_mode_never_holds_threads_back() {
    let config = config(1, 1).with_mode(ClockMode::Time);
    let mut state = spawn_all(&config, 2);
    let mut scripts: Vec<VecDeque<ActionKind>> = (0..2).map(|_| rounds_then_exit(4)).collect();
    let mut callers = Vec::new();
    let outcome = drive(&mut state, &mut scripts, |_, step| callers.push(step.caller));
    // Lowest id first: T0 runs its whole script before T1 moves.
    assert_eq!(&callers[..5], &[tid(0); 5]);
    assert_eq!(outcome.finished_reports, 1);
    assert_eq!(state.report().unit, "ms");
    assert_eq!(state.metrics().fast_path.value(), 0);
}

#[test]
fn blocked_thread_does_not_hold_back_the_round() {
    let mut state = spawn_all(&config(1, 1), 2);
    let sem = PrimitiveKey::new(0x40);
    apply(&mut state, tid(0), ActionKind::SemInit { key: sem, value: 0 });
    let step = apply(&mut state, tid(1), ActionKind::SemWait { key: sem });
    assert!(!step.caller_may_continue);

    for _ in 0..4 {
        let step = apply(&mut state, tid(0), ActionKind::Done);
        assert!(step.caller_may_continue);
    }
    assert_eq!(state.metrics().rounds.value(), 4);

    let step = apply(&mut state, tid(0), ActionKind::SemPost { key: sem });
    assert!(step.released.contains(&tid(1)));
    assert!(state.has_permit(tid(1)));
    assert_eq!(state.threads().progress(tid(1)), 4);
    assert_eq!(state.semaphore_value(sem), Some(0));
}

#[test]
fn late_registered_thread_starts_at_creator_progress() {
    let mut state = EngineState::new(&config(1, 1));
    apply(&mut state, tid(0), ActionKind::Register);
    for _ in 0..7 {
        apply(&mut state, tid(0), ActionKind::Done);
    }
    apply(&mut state, tid(0), ActionKind::BeforeCreate);
    apply(&mut state, tid(0), ActionKind::AfterCreate {
        handle: Some(common::handle_of(1)),
    });
    let step = apply(&mut state, tid(1), ActionKind::Register);
    assert!(step.released.contains(&tid(1)));
    assert_eq!(state.threads().progress(tid(1)), 7);

    let mut scripts = vec![rounds_then_exit(2), rounds_then_exit(2)];
    let mut max_spread = 0;
    let outcome = drive(&mut state, &mut scripts, |state, _| {
        max_spread = max_spread.max(running_spread(state));
    });
    assert!(max_spread <= 1);
    assert_eq!(outcome.finished_reports, 1);
}
