//! Error types for the engine.
//!
//! Every [`Error`] returned from the dispatcher is fatal: it means the engine's
//! model of the observed program has diverged from what the program actually
//! did, so the simulated run is aborted rather than retried. Conditions that
//! are merely suspicious (implicit primitive creation, unlocking an unlocked
//! mutex, ...) are logged as warnings and never surface here.

use crate::config::ConfigError;
use crate::lab::ScenarioError;
use crate::record::ThreadStatus;
use crate::sync::{PrimitiveKind, RwMode};
use crate::types::{PrimitiveKey, ThreadId};
use thiserror::Error;

/// A fatal engine error.
#[derive(Debug, Error)]
pub enum Error {
    /// A thread id does not fit in the configured thread table.
    #[error("thread id {thread} exceeds the configured maximum of {max} threads")]
    ThreadIdOutOfRange {
        /// Offending thread.
        thread: ThreadId,
        /// Configured table size.
        max: usize,
    },

    /// A thread registered twice.
    #[error("thread {thread} registered twice")]
    AlreadyRegistered {
        /// Offending thread.
        thread: ThreadId,
    },

    /// A thread submitted an action while not running.
    #[error("thread {thread} submitted {action} while {status}")]
    NotRunning {
        /// Offending thread.
        thread: ThreadId,
        /// Name of the submitted action.
        action: &'static str,
        /// Registry status at the time of the action.
        status: ThreadStatus,
    },

    /// A primitive was (re)initialized while threads wait on it.
    #[error("{kind} {key} reinitialized while {waiters} thread(s) wait on it")]
    ReinitWithWaiters {
        /// Primitive family.
        kind: PrimitiveKind,
        /// Primitive identity.
        key: PrimitiveKey,
        /// Number of queued waiters.
        waiters: usize,
    },

    /// A primitive was destroyed while threads wait on it.
    #[error("{kind} {key} destroyed while {waiters} thread(s) wait on it")]
    DestroyWithWaiters {
        /// Primitive family.
        kind: PrimitiveKind,
        /// Primitive identity.
        key: PrimitiveKey,
        /// Number of queued waiters.
        waiters: usize,
    },

    /// A thread unlocked a read-write lock it does not hold.
    #[error("thread {thread} unlocked rwlock {key} without holding it")]
    RwLockNotHeld {
        /// Offending thread.
        thread: ThreadId,
        /// Lock identity.
        key: PrimitiveKey,
    },

    /// A read-write lock was unlocked under a different mode than it was acquired.
    #[error("thread {thread} unlocked rwlock {key} as {requested} but acquired it as {acquired}")]
    RwLockModeMismatch {
        /// Offending thread.
        thread: ThreadId,
        /// Lock identity.
        key: PrimitiveKey,
        /// Mode recorded at acquisition.
        acquired: RwMode,
        /// Mode named by the unlock.
        requested: RwMode,
    },

    /// No thread can run any more while some are still blocked.
    #[error("deadlock: no runnable thread while {} thread(s) are blocked: {blocked:?}", blocked.len())]
    Deadlock {
        /// Threads stuck on a primitive.
        blocked: Vec<ThreadId>,
    },

    /// The run was aborted by an earlier fatal error.
    #[error("engine aborted by an earlier fatal error")]
    Aborted,

    /// Writing the trace report failed.
    #[error("trace report i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization failed.
    #[error("trace report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid lab scenario.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// A scripted worker thread panicked.
    #[error("worker thread {thread} panicked")]
    WorkerPanicked {
        /// Thread whose worker panicked.
        thread: ThreadId,
    },
}

impl Error {
    /// Returns `true` for errors that describe a synchronization protocol
    /// violation by the observed program (as opposed to engine-side failures
    /// such as I/O).
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRegistered { .. }
                | Self::NotRunning { .. }
                | Self::ReinitWithWaiters { .. }
                | Self::DestroyWithWaiters { .. }
                | Self::RwLockNotHeld { .. }
                | Self::RwLockModeMismatch { .. }
                | Self::Deadlock { .. }
        )
    }

    /// Returns a short stable name for the error variant.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::ThreadIdOutOfRange { .. } => "thread_id_out_of_range",
            Self::AlreadyRegistered { .. } => "already_registered",
            Self::NotRunning { .. } => "not_running",
            Self::ReinitWithWaiters { .. } => "reinit_with_waiters",
            Self::DestroyWithWaiters { .. } => "destroy_with_waiters",
            Self::RwLockNotHeld { .. } => "rwlock_not_held",
            Self::RwLockModeMismatch { .. } => "rwlock_mode_mismatch",
            Self::Deadlock { .. } => "deadlock",
            Self::Aborted => "aborted",
            Self::Io(_) => "io",
            Self::Serialize(_) => "serialize",
            Self::Config(_) => "config",
            Self::Scenario(_) => "scenario",
            Self::WorkerPanicked { .. } => "worker_panicked",
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
