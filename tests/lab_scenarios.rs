//! Scripted workloads on real OS threads.

#[macro_use]
mod common;

use pramsync::lab::{Harness, Op, Scenario, run};
use pramsync::{EngineConfig, Error, RwMode};

fn engine() -> EngineConfig {
    EngineConfig::default().with_max_threads(16)
}

fn spawn(script: &str) -> Op {
    Op::Spawn {
        script: script.to_string(),
    }
}

fn join_all(count: usize) -> Vec<Op> {
    (0..count).map(|spawn| Op::Join { spawn }).collect()
}

#[test]
fn workers_finish_in_lockstep() {
    common::init_test_logging();
    test_phase!("workers_finish_in_lockstep");
    let mut main = vec![spawn("worker"), spawn("worker"), spawn("worker")];
    main.extend(join_all(3));
    let scenario = Scenario::new("lockstep", main)
        .with_script("worker", vec![Op::Work { steps: 5 }])
        .with_engine(engine());

    let outcome = run(scenario).unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.threads, 4);
    assert_eq!(outcome.metrics.action_count("done"), 15);
    assert_eq!(outcome.metrics.action_count("fini"), 4);
    assert_eq!(outcome.report.end, 5);
    assert_eq!(outcome.report.threads.len(), 4);
    test_complete!("workers_finish_in_lockstep");
}

#[test]
fn bounded_buffer_with_semaphores() {
    common::init_test_logging();
    let (empty, full, lock) = (0x1, 0x2, 0x3);
    let producer = vec![Op::Repeat {
        times: 6,
        ops: vec![
            Op::Wait { sem: empty },
            Op::Lock { mutex: lock },
            Op::Work { steps: 1 },
            Op::Unlock { mutex: lock },
            Op::Post { sem: full },
        ],
    }];
    let consumer = vec![Op::Repeat {
        times: 6,
        ops: vec![
            Op::Wait { sem: full },
            Op::Lock { mutex: lock },
            Op::Work { steps: 2 },
            Op::Unlock { mutex: lock },
            Op::Post { sem: empty },
        ],
    }];
    let mut main = vec![
        Op::SemInit {
            sem: empty,
            value: 2,
        },
        Op::SemInit { sem: full, value: 0 },
        Op::MutexInit { mutex: lock },
        spawn("producer"),
        spawn("consumer"),
    ];
    main.extend(join_all(2));
    let scenario = Scenario::new("bounded-buffer", main)
        .with_script("producer", producer)
        .with_script("consumer", consumer)
        .with_engine(engine());

    let harness = Harness::new(scenario).unwrap();
    let engine = std::sync::Arc::clone(harness.engine());
    let outcome = harness.run().unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.metrics.action_count("sem_post"), 12);
    assert_eq!(outcome.metrics.implicit_primitives.value(), 0);

    let snapshot = engine.snapshot();
    let value = |key: u64| {
        snapshot
            .semaphores
            .iter()
            .find(|s| s.key.as_u64() == key)
            .map(|s| s.value)
    };
    assert_eq!(value(empty), Some(2));
    assert_eq!(value(full), Some(0));
}

#[test]
fn condition_wait_and_signal() {
    let (m, c) = (0x10, 0x11);
    let waiter = vec![
        Op::Lock { mutex: m },
        Op::CondWait { cond: c, mutex: m },
        Op::Unlock { mutex: m },
    ];
    let main = vec![
        Op::MutexInit { mutex: m },
        spawn("waiter"),
        Op::Work { steps: 2 },
        Op::Lock { mutex: m },
        Op::Signal { cond: c },
        Op::Unlock { mutex: m },
        Op::Join { spawn: 0 },
    ];
    let scenario = Scenario::new("condvar", main)
        .with_script("waiter", waiter)
        .with_engine(engine());
    let outcome = run(scenario).unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.metrics.action_count("cond_wait"), 1);
    assert_eq!(outcome.metrics.action_count("cond_signal"), 1);
    let waiter_trace = outcome.report.thread(1).unwrap();
    assert!(waiter_trace.samples.contains('1'), "{}", waiter_trace.samples);
}

#[test]
fn readers_and_writer_share_a_rwlock() {
    let rw = 0x20;
    let reader = vec![
        Op::ReadLock { rwlock: rw },
        Op::Work { steps: 2 },
        Op::RwUnlock {
            rwlock: rw,
            mode: Some(RwMode::Read),
        },
    ];
    let writer = vec![
        Op::WriteLock { rwlock: rw },
        Op::Work { steps: 1 },
        Op::RwUnlock {
            rwlock: rw,
            mode: Some(RwMode::Write),
        },
    ];
    let mut main = vec![
        spawn("reader"),
        spawn("writer"),
        spawn("reader"),
        spawn("reader"),
    ];
    main.extend(join_all(4));
    let scenario = Scenario::new("rwlock", main)
        .with_script("reader", reader)
        .with_script("writer", writer)
        .with_engine(engine());
    let outcome = run(scenario).unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.metrics.action_count("rw_rd_lock"), 3);
    assert_eq!(outcome.metrics.action_count("rw_unlock"), 4);
}

#[test]
fn exclusive_sections_and_trylock_spinning() {
    let worker = vec![
        Op::Exclusive {
            function: 0xf00,
            ops: vec![Op::Work { steps: 1 }],
        },
        Op::TryLock { mutex: 0x30 },
        Op::Work { steps: 2 },
        Op::Unlock { mutex: 0x30 },
    ];
    let mut main = vec![spawn("worker"); 4];
    main.extend(join_all(4));
    let scenario = Scenario::new("exclusive", main)
        .with_script("worker", worker)
        .with_engine(engine());
    let outcome = run(scenario).unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.metrics.action_count("enter_exclusive"), 4);
    assert_eq!(outcome.metrics.action_count("leave_exclusive"), 4);
    assert_eq!(outcome.metrics.action_count("mutex_unlock"), 4);
    assert!(outcome.metrics.action_count("mutex_try_lock") >= 4);
}

#[test]
fn nested_spawns_are_collected() {
    let scenario = Scenario::new("tree", vec![spawn("parent"), Op::Work { steps: 1 }])
        .with_script("parent", vec![spawn("leaf"), spawn("leaf"), Op::Join { spawn: 1 }])
        .with_script("leaf", vec![Op::Work { steps: 3 }])
        .with_engine(engine());
    let outcome = run(scenario).unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.threads, 4);
    assert_eq!(outcome.metrics.action_count("register"), 4);
}

#[test]
fn lock_held_across_join_deadlocks() {
    common::init_test_logging();
    let scenario = Scenario::new("abba", vec![
        Op::Lock { mutex: 0x40 },
        spawn("worker"),
        Op::Join { spawn: 0 },
    ])
    .with_script("worker", vec![Op::Lock { mutex: 0x40 }])
    .with_engine(engine());

    let harness = Harness::new(scenario).unwrap();
    let engine = std::sync::Arc::clone(harness.engine());
    let err = harness.run().unwrap_err();
    match err {
        Error::Deadlock { blocked } => assert_eq!(blocked.len(), 2),
        other => panic!("expected deadlock, got {other}"),
    }
    assert!(engine.is_aborted());
    assert!(!engine.is_finished());
}

#[test]
fn too_many_threads_aborts_the_run() {
    let scenario = Scenario::new("overflow", vec![Op::Repeat {
        times: 4,
        ops: vec![spawn("w")],
    }])
    .with_script("w", vec![Op::Work { steps: 1 }])
    .with_engine(EngineConfig::default().with_max_threads(3));
    let err = run(scenario).unwrap_err();
    assert!(matches!(err, Error::ThreadIdOutOfRange { max: 3, .. }), "{err}");
}

#[test]
fn randomized_workloads_finish() {
    common::init_test_logging();
    for seed in 0..6 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let workers = rng.usize(1..6);
        let mut main = Vec::new();
        let mut scenario = Scenario::new(format!("random-{seed}"), Vec::new());
        let mut expected_done = 0;
        for w in 0..workers {
            let steps = rng.u64(1..8);
            let laps = rng.u32(1..4);
            expected_done += steps * u64::from(laps);
            let name = format!("w{w}");
            scenario = scenario.with_script(&name, vec![Op::Repeat {
                times: laps,
                ops: vec![
                    Op::Lock { mutex: 0x50 },
                    Op::Work { steps },
                    Op::Unlock { mutex: 0x50 },
                ],
            }]);
            main.push(spawn(&name));
        }
        main.extend(join_all(workers));
        scenario.main = main;
        let outcome = run(scenario.with_engine(engine())).unwrap();
        assert!(outcome.finished, "seed {seed}");
        assert_eq!(outcome.metrics.action_count("done"), expected_done, "seed {seed}");
    }
}

#[test]
fn json_scenario_runs() {
    let scenario = Scenario::from_json(
        r#"{
            "name": "json",
            "engine": { "max_threads": 4, "instructions_per_round": 2 },
            "main": [
                { "op": "spawn", "script": "w" },
                { "op": "work", "steps": 2 },
                { "op": "join", "spawn": 0 }
            ],
            "scripts": { "w": [ { "op": "work", "steps": 2 } ] }
        }"#,
    )
    .unwrap();
    let outcome = run(scenario).unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.report.end, 4);
}

#[cfg(feature = "config-file")]
#[test]
fn toml_scenario_runs() {
    let scenario = Scenario::from_toml_str(
        r#"
        name = "toml"

        [engine]
        max_threads = 4

        [[main]]
        op = "sem_init"
        sem = 1
        value = 0

        [[main]]
        op = "spawn"
        script = "poster"

        [[main]]
        op = "wait"
        sem = 1

        [[main]]
        op = "join"
        spawn = 0

        [[scripts.poster]]
        op = "work"
        steps = 3

        [[scripts.poster]]
        op = "post"
        sem = 1
        "#,
    )
    .unwrap();
    let outcome = run(scenario).unwrap();
    assert!(outcome.finished);
    assert_eq!(outcome.metrics.action_count("sem_wait"), 1);
}
