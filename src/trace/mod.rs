//! Execution trace recording.
//!
//! - [`recorder`]: per-thread bounded change-point buffers
//! - [`compress`]: pair elision and majority-vote compression
//! - [`clock`]: instruction or wall-clock ticks
//! - [`report`]: the JSON report written at the end of a run

pub mod clock;
pub mod compress;
pub mod recorder;
pub mod report;

pub use clock::TraceClock;
pub use recorder::{Sample, ThreadTrace, TraceAnomaly, TraceRecorder};
pub use report::{ThreadReport, TraceReport};
