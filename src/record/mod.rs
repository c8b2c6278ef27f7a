//! Internal records owned by the engine.
//!
//! - [`thread`]: the thread table (per-thread status, progress, payload)

pub mod thread;

pub use thread::{Payload, ThreadRecord, ThreadStatus, ThreadTable, WaitSite};
