//! Scripted workloads.
//!
//! A [`Scenario`] describes a small multithreaded program as one script per
//! thread: the `main` script runs on the root thread, and `spawn` ops start
//! threads running one of the named `scripts`. Scenarios deserialize from
//! TOML or JSON:
//!
//! ```toml
//! name = "counter"
//!
//! [engine]
//! instructions_per_round = 1
//!
//! [[main]]
//! op = "spawn"
//! script = "worker"
//!
//! [[main]]
//! op = "join"
//! spawn = 0
//!
//! [[scripts.worker]]
//! op = "lock"
//! mutex = 16
//!
//! [[scripts.worker]]
//! op = "work"
//! steps = 3
//!
//! [[scripts.worker]]
//! op = "unlock"
//! mutex = 16
//! ```

use crate::config::EngineConfig;
use crate::sync::RwMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A per-thread script.
pub type Script = Vec<Op>;

/// One step of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Execute `steps` rounds of plain computation.
    Work {
        /// Number of rounds.
        steps: u64,
    },
    /// Explicitly initialize a mutex.
    MutexInit {
        /// Mutex identity.
        mutex: u64,
    },
    /// Lock a mutex.
    Lock {
        /// Mutex identity.
        mutex: u64,
    },
    /// Spin on try-lock, one round per failed attempt.
    TryLock {
        /// Mutex identity.
        mutex: u64,
    },
    /// Unlock a mutex.
    Unlock {
        /// Mutex identity.
        mutex: u64,
    },
    /// Destroy a mutex.
    MutexDestroy {
        /// Mutex identity.
        mutex: u64,
    },
    /// Explicitly initialize a semaphore.
    SemInit {
        /// Semaphore identity.
        sem: u64,
        /// Initial value.
        value: u32,
    },
    /// Wait on a semaphore.
    Wait {
        /// Semaphore identity.
        sem: u64,
    },
    /// Spin on try-wait, one round per failed attempt.
    TryWait {
        /// Semaphore identity.
        sem: u64,
    },
    /// Post a semaphore.
    Post {
        /// Semaphore identity.
        sem: u64,
    },
    /// Wait on a condition variable while holding `mutex`.
    CondWait {
        /// Condition variable identity.
        cond: u64,
        /// Mutex held by the thread.
        mutex: u64,
    },
    /// Wake one condition waiter.
    Signal {
        /// Condition variable identity.
        cond: u64,
    },
    /// Wake every condition waiter.
    Broadcast {
        /// Condition variable identity.
        cond: u64,
    },
    /// Acquire a read-write lock for reading.
    ReadLock {
        /// Lock identity.
        rwlock: u64,
    },
    /// Acquire a read-write lock for writing.
    WriteLock {
        /// Lock identity.
        rwlock: u64,
    },
    /// Release a read-write lock.
    RwUnlock {
        /// Lock identity.
        rwlock: u64,
        /// Mode being released, if the script names it.
        #[serde(default)]
        mode: Option<RwMode>,
    },
    /// Run `ops` inside a function that must not run concurrently.
    Exclusive {
        /// Function identity.
        function: u64,
        /// Body.
        ops: Script,
    },
    /// Start a thread running the named script.
    Spawn {
        /// Name under `scripts`.
        script: String,
    },
    /// Join the `spawn`-th thread started by this thread (0-based).
    Join {
        /// Spawn index.
        spawn: usize,
    },
    /// Run `ops` `times` times.
    Repeat {
        /// Repetitions.
        times: u32,
        /// Body.
        ops: Script,
    },
}

/// Problem found by [`Scenario::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    /// A spawn names a script that does not exist.
    #[error("script `{owner}` spawns unknown script `{script}`")]
    UnknownScript {
        /// Script containing the spawn.
        owner: String,
        /// Missing script name.
        script: String,
    },
    /// A join refers to a spawn that does not precede it.
    #[error("script `{owner}` joins spawn #{spawn} before starting it")]
    JoinBeforeSpawn {
        /// Script containing the join.
        owner: String,
        /// Spawn index.
        spawn: usize,
    },
    /// The document could not be parsed.
    #[error("failed to parse scenario: {0}")]
    Parse(String),
}

/// A scripted program plus the engine configuration to run it with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Script of the root thread.
    pub main: Script,
    /// Named scripts for spawned threads.
    #[serde(default)]
    pub scripts: BTreeMap<String, Script>,
}

impl Scenario {
    /// Creates a scenario with the default engine configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, main: Script) -> Self {
        Self {
            name: name.into(),
            engine: EngineConfig::default(),
            main,
            scripts: BTreeMap::new(),
        }
    }

    /// Adds a named script.
    #[must_use]
    pub fn with_script(mut self, name: impl Into<String>, script: Script) -> Self {
        self.scripts.insert(name.into(), script);
        self
    }

    /// Replaces the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Checks spawn targets and join indices in every script.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        check_script(self, "main", &self.main, &mut 0)?;
        for (name, script) in &self.scripts {
            check_script(self, name, script, &mut 0)?;
        }
        Ok(())
    }

    /// Parses a JSON scenario.
    pub fn from_json(source: &str) -> Result<Self, ScenarioError> {
        serde_json::from_str(source).map_err(|e| ScenarioError::Parse(e.to_string()))
    }

    /// Parses a TOML scenario.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> Result<Self, ScenarioError> {
        toml::from_str(source).map_err(|e| ScenarioError::Parse(e.to_string()))
    }
}

fn check_script(
    scenario: &Scenario,
    owner: &str,
    script: &[Op],
    spawns: &mut usize,
) -> Result<(), ScenarioError> {
    for op in script {
        match op {
            Op::Spawn { script } => {
                if !scenario.scripts.contains_key(script) {
                    return Err(ScenarioError::UnknownScript {
                        owner: owner.to_string(),
                        script: script.clone(),
                    });
                }
                *spawns += 1;
            }
            Op::Join { spawn } if *spawn >= *spawns => {
                return Err(ScenarioError::JoinBeforeSpawn {
                    owner: owner.to_string(),
                    spawn: *spawn,
                });
            }
            Op::Exclusive { ops, .. } => check_script(scenario, owner, ops, spawns)?,
            Op::Repeat { times, ops } => {
                let before = *spawns;
                check_script(scenario, owner, ops, spawns)?;
                let per_pass = *spawns - before;
                *spawns = before + per_pass * (*times as usize);
            }
            _ => {}
        }
    }
    Ok(())
}
