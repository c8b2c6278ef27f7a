//! Scheduling of observed threads.
//!
//! - [`lockstep`]: progress-ordered release enforcing the lockstep bound

pub mod lockstep;

pub use lockstep::{LockstepScheduler, SchedulerSnapshot};
