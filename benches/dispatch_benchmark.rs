//! Dispatcher benchmark suite for pramsync.
//!
//! Benchmarks the non-blocking core of the engine:
//! - Lockstep rounds for growing thread counts
//! - Uncontended and contended mutex hand-off
//! - Trace recording under compression pressure
//!
//! Run:
//!   cargo bench --bench dispatch_benchmark

#![allow(missing_docs)]
#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use pramsync::runtime::EngineState;
use pramsync::trace::TraceRecorder;
use pramsync::{
    Action, ActionKind, CompressionStrategy, EngineConfig, OsHandle, PrimitiveKey, ThreadId,
    ThreadStatus,
};

// =============================================================================
// HELPERS
// =============================================================================

fn tid(n: u32) -> ThreadId {
    ThreadId::new(n)
}

fn apply(state: &mut EngineState, thread: ThreadId, kind: ActionKind) {
    state
        .apply(Action::new(thread, kind))
        .expect("benchmark action rejected");
}

/// Registers `count` threads, each created by the root.
fn setup_state(count: u32) -> EngineState {
    let config = EngineConfig::default().with_max_threads(count as usize + 1);
    let mut state = EngineState::new(&config);
    apply(&mut state, tid(0), ActionKind::Register);
    for child in 1..count {
        apply(&mut state, tid(0), ActionKind::BeforeCreate);
        apply(&mut state, tid(0), ActionKind::AfterCreate {
            handle: Some(OsHandle::new(u64::from(child))),
        });
        apply(&mut state, tid(child), ActionKind::Register);
    }
    state
}

// =============================================================================
// LOCKSTEP ROUNDS
// =============================================================================

fn bench_lockstep_rounds(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/lockstep_rounds");
    let rounds = 64u32;

    for &threads in &[1u32, 4, 16, 64] {
        group.throughput(Throughput::Elements(u64::from(threads * rounds)));
        group.bench_with_input(BenchmarkId::new("done", threads), &threads, |b, &threads| {
            b.iter_batched(
                || setup_state(threads),
                |mut state| {
                    for _ in 0..rounds {
                        for t in 0..threads {
                            apply(&mut state, tid(t), ActionKind::Done);
                        }
                    }
                    black_box(state.metrics().rounds.value())
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// =============================================================================
// MUTEX HAND-OFF
// =============================================================================

fn bench_mutex(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/mutex");
    let key = PrimitiveKey::new(0x10);

    group.bench_function("uncontended_lock_unlock", |b| {
        b.iter_batched(
            || setup_state(1),
            |mut state| {
                for _ in 0..128 {
                    apply(&mut state, tid(0), ActionKind::MutexLock { key });
                    apply(&mut state, tid(0), ActionKind::MutexUnlock { key });
                }
                black_box(state.mutex(key).map(|m| m.is_locked()))
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("contended_handoff", |b| {
        b.iter_batched(
            || setup_state(2),
            |mut state| {
                for _ in 0..64 {
                    apply(&mut state, tid(0), ActionKind::MutexLock { key });
                    apply(&mut state, tid(1), ActionKind::MutexLock { key });
                    apply(&mut state, tid(0), ActionKind::MutexUnlock { key });
                    apply(&mut state, tid(1), ActionKind::MutexUnlock { key });
                }
                black_box(state.metrics().releases.value())
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

// =============================================================================
// TRACE RECORDING
// =============================================================================

fn bench_trace(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace/record");
    let updates = 4096u64;
    group.throughput(Throughput::Elements(updates));

    for strategy in [
        CompressionStrategy::PairElision,
        CompressionStrategy::MajorityVote,
    ] {
        group.bench_function(BenchmarkId::new("alternating", format!("{strategy:?}")), |b| {
            b.iter_batched(
                || {
                    let mut recorder = TraceRecorder::new(256, 8, strategy);
                    recorder.register(tid(0), 0);
                    recorder
                },
                |mut recorder| {
                    for tick in 1..=updates {
                        let status = if tick % 2 == 0 {
                            ThreadStatus::Running
                        } else {
                            ThreadStatus::Waiting
                        };
                        recorder.update(tid(0), tick, status);
                    }
                    black_box(recorder.compressions())
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lockstep_rounds, bench_mutex, bench_trace);
criterion_main!(benches);
