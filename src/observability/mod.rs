//! Observability for the engine.
//!
//! Logging goes through [`tracing_compat`](crate::tracing_compat); this module
//! holds the counters reported by `Engine::metrics` and `print_state`.

pub mod metrics;

pub use metrics::{Counter, EngineMetrics};
