//! Pramsync: a lockstep (PRAM) synchronization and scheduling engine.
//!
//! # Overview
//!
//! Pramsync simulates an idealized synchronous-parallel machine over an
//! observed multithreaded program. Every observed event (a round of steps, a
//! lock, a semaphore post, a thread creation, ...) is submitted to a single
//! dispatcher as an [`Action`]. The dispatcher emulates the synchronization
//! primitive involved, forces every runnable thread to advance by the same
//! bounded number of steps before any thread may go further, and records a
//! compressed per-thread status trace for later analysis.
//!
//! # Core Guarantees
//!
//! - **Total order**: actions are applied one at a time inside a single critical section
//! - **Lockstep bound**: no thread runs more than one round ahead of the least advanced runnable thread
//! - **Faithful primitives**: FIFO wait queues; woken threads adopt their waker's progress
//! - **Bounded traces**: per-thread trace buffers never exceed their capacity
//! - **Fatal divergence**: protocol violations and deadlocks abort the run with a typed [`Error`]
//!
//! # Module Structure
//!
//! - [`types`]: identifiers (threads, primitives, OS handles)
//! - [`record`]: the thread table
//! - [`sync`]: emulated mutex, semaphore, condvar, rwlock, join, and handshake
//! - [`runtime`]: actions, the lockstep scheduler, and the dispatcher
//! - [`trace`](mod@trace): trace recording, compression, and the JSON report
//! - [`observability`]: engine statistics
//! - [`lab`]: scripted workloads run on real threads against an engine
//! - [`config`]: engine configuration
//! - [`error`](mod@error): error types
//! - [`tracing_compat`]: optional tracing integration (`tracing-integration` feature)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

// ── Core ──
pub mod config;
pub mod error;
pub mod record;
pub mod sync;
pub mod types;

// ── Engine ──
pub mod runtime;
pub mod trace;

// ── Tooling ──
pub mod lab;
pub mod observability;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;
pub mod tracing_compat;

pub use config::{ClockMode, CompressionStrategy, EngineConfig};
pub use error::{Error, Result};
pub use record::ThreadStatus;
pub use runtime::{Action, ActionKind, Engine, Reply};
pub use sync::RwMode;
pub use trace::TraceReport;
pub use types::{OsHandle, PrimitiveKey, ThreadId};
