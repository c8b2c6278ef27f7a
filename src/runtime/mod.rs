//! The dispatcher and its scheduling machinery.
//!
//! - [`action`]: actions submitted by observed threads and their replies
//! - [`state`]: the non-blocking state machine applying one action
//! - [`scheduler`]: lockstep ordering of runnable threads
//! - [`gate`]: per-thread release gates
//! - [`engine`]: the blocking dispatcher shared by all threads
//! - [`snapshot`]: debug dumps

pub mod action;
pub mod engine;
pub mod gate;
pub mod scheduler;
pub mod snapshot;
pub mod state;

pub use action::{Action, ActionKind, EBUSY, Reply};
pub use engine::Engine;
pub use gate::Gate;
pub use scheduler::LockstepScheduler;
pub use snapshot::EngineSnapshot;
pub use state::{EngineState, Step};
