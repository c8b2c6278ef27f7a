//! Actions submitted to the dispatcher and the replies it returns.
//!
//! An [`Action`] describes one observed event of one thread. Every kind
//! carries exactly the arguments it needs, so a malformed action cannot be
//! constructed.

use crate::sync::RwMode;
use crate::types::{OsHandle, PrimitiveKey, ThreadId};
use core::fmt;
use serde::{Deserialize, Serialize};

/// `EBUSY`, returned by failed try-lock calls.
pub const EBUSY: i64 = 16;

/// Kind and arguments of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ActionKind {
    /// The thread finished one round of steps.
    Done,
    /// A thread starts and announces itself.
    Register,
    /// A thread exits.
    Fini,
    /// A thread is about to create another thread.
    BeforeCreate,
    /// The create call returned (`None` if it failed).
    AfterCreate {
        /// Handle of the new thread.
        handle: Option<OsHandle>,
    },
    /// A thread is about to join `handle`.
    BeforeJoin {
        /// Joined thread.
        handle: OsHandle,
    },

    /// Explicit mutex initialization.
    MutexInit {
        /// Mutex identity.
        key: PrimitiveKey,
    },
    /// Mutex destruction.
    MutexDestroy {
        /// Mutex identity.
        key: PrimitiveKey,
    },
    /// Blocking lock.
    MutexLock {
        /// Mutex identity.
        key: PrimitiveKey,
    },
    /// Non-blocking lock.
    MutexTryLock {
        /// Mutex identity.
        key: PrimitiveKey,
    },
    /// Unlock.
    MutexUnlock {
        /// Mutex identity.
        key: PrimitiveKey,
    },

    /// Explicit semaphore initialization.
    SemInit {
        /// Semaphore identity.
        key: PrimitiveKey,
        /// Initial value, unsigned as in `sem_init`.
        value: u32,
    },
    /// Semaphore destruction.
    SemDestroy {
        /// Semaphore identity.
        key: PrimitiveKey,
    },
    /// Blocking wait.
    SemWait {
        /// Semaphore identity.
        key: PrimitiveKey,
    },
    /// Non-blocking wait.
    SemTryWait {
        /// Semaphore identity.
        key: PrimitiveKey,
    },
    /// Post.
    SemPost {
        /// Semaphore identity.
        key: PrimitiveKey,
    },
    /// Value read.
    SemGetValue {
        /// Semaphore identity.
        key: PrimitiveKey,
    },

    /// Explicit condition variable initialization.
    CondInit {
        /// Condition variable identity.
        key: PrimitiveKey,
    },
    /// Condition variable destruction.
    CondDestroy {
        /// Condition variable identity.
        key: PrimitiveKey,
    },
    /// Wait on `cond`, releasing `mutex` meanwhile.
    CondWait {
        /// Condition variable identity.
        cond: PrimitiveKey,
        /// Mutex held by the caller.
        mutex: PrimitiveKey,
    },
    /// Wake one waiter.
    CondSignal {
        /// Condition variable identity.
        key: PrimitiveKey,
    },
    /// Wake every waiter.
    CondBroadcast {
        /// Condition variable identity.
        key: PrimitiveKey,
    },

    /// Explicit read-write lock initialization.
    RwInit {
        /// Lock identity.
        key: PrimitiveKey,
    },
    /// Read-write lock destruction.
    RwDestroy {
        /// Lock identity.
        key: PrimitiveKey,
    },
    /// Blocking read lock.
    RwRdLock {
        /// Lock identity.
        key: PrimitiveKey,
    },
    /// Blocking write lock.
    RwWrLock {
        /// Lock identity.
        key: PrimitiveKey,
    },
    /// Non-blocking read lock.
    RwTryRdLock {
        /// Lock identity.
        key: PrimitiveKey,
    },
    /// Non-blocking write lock.
    RwTryWrLock {
        /// Lock identity.
        key: PrimitiveKey,
    },
    /// Unlock, optionally naming the mode being released.
    RwUnlock {
        /// Lock identity.
        key: PrimitiveKey,
        /// Mode named by the unlock, checked against the acquisition mode.
        mode: Option<RwMode>,
    },

    /// Before-event of a function that must not run concurrently.
    EnterExclusive {
        /// Function identity.
        function: PrimitiveKey,
    },
    /// After-event of a function that must not run concurrently.
    LeaveExclusive {
        /// Function identity.
        function: PrimitiveKey,
    },
}

impl ActionKind {
    /// Returns the snake-case name of the kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Register => "register",
            Self::Fini => "fini",
            Self::BeforeCreate => "before_create",
            Self::AfterCreate { .. } => "after_create",
            Self::BeforeJoin { .. } => "before_join",
            Self::MutexInit { .. } => "mutex_init",
            Self::MutexDestroy { .. } => "mutex_destroy",
            Self::MutexLock { .. } => "mutex_lock",
            Self::MutexTryLock { .. } => "mutex_try_lock",
            Self::MutexUnlock { .. } => "mutex_unlock",
            Self::SemInit { .. } => "sem_init",
            Self::SemDestroy { .. } => "sem_destroy",
            Self::SemWait { .. } => "sem_wait",
            Self::SemTryWait { .. } => "sem_try_wait",
            Self::SemPost { .. } => "sem_post",
            Self::SemGetValue { .. } => "sem_get_value",
            Self::CondInit { .. } => "cond_init",
            Self::CondDestroy { .. } => "cond_destroy",
            Self::CondWait { .. } => "cond_wait",
            Self::CondSignal { .. } => "cond_signal",
            Self::CondBroadcast { .. } => "cond_broadcast",
            Self::RwInit { .. } => "rw_init",
            Self::RwDestroy { .. } => "rw_destroy",
            Self::RwRdLock { .. } => "rw_rd_lock",
            Self::RwWrLock { .. } => "rw_wr_lock",
            Self::RwTryRdLock { .. } => "rw_try_rd_lock",
            Self::RwTryWrLock { .. } => "rw_try_wr_lock",
            Self::RwUnlock { .. } => "rw_unlock",
            Self::EnterExclusive { .. } => "enter_exclusive",
            Self::LeaveExclusive { .. } => "leave_exclusive",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One observed event of one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Submitting thread.
    pub thread: ThreadId,
    /// What happened.
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    /// Creates an action.
    #[must_use]
    pub const fn new(thread: ThreadId, kind: ActionKind) -> Self {
        Self { thread, kind }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.thread, self.kind)
    }
}

/// What the dispatcher tells the calling thread once it may continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reply", content = "value")]
pub enum Reply {
    /// Continue; the intercepted call keeps its own result.
    Proceed,
    /// Outcome of a non-blocking acquisition.
    Acquired(bool),
    /// Value read from a semaphore.
    Value(i64),
    /// This `Fini` completed the program.
    ProgramFinished,
}

impl Reply {
    /// Return value to write back into the intercepted call.
    ///
    /// Failed try-lock calls report `EBUSY`; failed semaphore try-waits
    /// report `-1`, as their libc counterparts do.
    #[must_use]
    pub const fn return_code(self, kind: &ActionKind) -> i64 {
        match self {
            Self::Proceed | Self::ProgramFinished | Self::Acquired(true) => 0,
            Self::Acquired(false) => match kind {
                ActionKind::SemTryWait { .. } => -1,
                _ => EBUSY,
            },
            Self::Value(v) => v,
        }
    }

    /// Returns true for `Acquired(true)`.
    #[must_use]
    pub const fn acquired(self) -> bool {
        matches!(self, Self::Acquired(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_codes_follow_libc() {
        let key = PrimitiveKey::new(1);
        assert_eq!(
            Reply::Acquired(false).return_code(&ActionKind::MutexTryLock { key }),
            EBUSY
        );
        assert_eq!(
            Reply::Acquired(false).return_code(&ActionKind::SemTryWait { key }),
            -1
        );
        assert_eq!(
            Reply::Acquired(true).return_code(&ActionKind::RwTryWrLock { key }),
            0
        );
        assert_eq!(
            Reply::Value(3).return_code(&ActionKind::SemGetValue { key }),
            3
        );
    }

    #[test]
    fn action_serializes_with_flat_kind() {
        let action = Action::new(
            ThreadId::new(2),
            ActionKind::CondWait {
                cond: PrimitiveKey::new(0x10),
                mutex: PrimitiveKey::new(0x20),
            },
        );
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#"{"thread":2,"kind":"cond_wait","cond":16,"mutex":32}"#);
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
        assert_eq!(action.to_string(), "T2:cond_wait");
    }
}
