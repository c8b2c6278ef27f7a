//! Emulated synchronization primitives.
//!
//! Each primitive is a plain state machine with its own FIFO wait queue.
//! Operations only report what happened (acquired, queued, which waiter to
//! hand over to); the dispatcher applies the resulting thread transitions and
//! runs the release pass once per action.
//!
//! - [`mutex`]: locked flag with direct hand-off on unlock
//! - [`semaphore`]: counting semaphore handing units directly to waiters
//! - [`condvar`]: waiter queue re-contending for a stashed mutex
//! - [`rwlock`]: reader/writer lock with contiguous-reader promotion
//! - [`join`]: exit flags keyed by OS handle
//! - [`handshake`]: one-at-a-time entry for creations and non-reentrant calls
//! - [`table`]: lazily populated per-family tables

pub mod condvar;
pub mod handshake;
pub mod join;
pub mod mutex;
pub mod rwlock;
pub mod semaphore;
pub mod table;

pub use condvar::CondEntry;
pub use handshake::Handshake;
pub use join::{JoinEntry, JoinOutcome, JoinTable};
pub use mutex::{LockOutcome, MutexEntry, UnlockOutcome};
pub use rwlock::{RwLockEntry, RwMode, RwOutcome, RwState};
pub use semaphore::{SemaphoreEntry, WaitOutcome};
pub use table::{Primitive, PrimitiveKind, PrimitiveTable};
