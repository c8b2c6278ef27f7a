//! Scripted workloads for exercising an engine on real threads.
//!
//! The lab stands in for an instrumented program: a [`Scenario`] lists what
//! each thread does, and the [`Harness`] runs every script on its own OS
//! thread, submitting the matching actions to a shared [`Engine`].
//!
//! - [`scenario`]: the serializable script format
//! - [`harness`]: the threaded runner
//!
//! # Quick Start
//!
//! ```
//! use pramsync::EngineConfig;
//! use pramsync::lab::{Op, Scenario, run};
//!
//! let scenario = Scenario::new("pair", vec![
//!     Op::Spawn { script: "worker".into() },
//!     Op::Work { steps: 2 },
//!     Op::Join { spawn: 0 },
//! ])
//! .with_script("worker", vec![Op::Work { steps: 3 }])
//! .with_engine(EngineConfig::default().with_max_threads(4));
//!
//! let outcome = run(scenario)?;
//! assert!(outcome.finished);
//! assert_eq!(outcome.threads, 2);
//! # Ok::<(), pramsync::Error>(())
//! ```
//!
//! [`Engine`]: crate::runtime::Engine

pub mod harness;
pub mod scenario;

pub use harness::{Harness, HarnessReport, run};
pub use scenario::{Op, Scenario, ScenarioError, Script};
