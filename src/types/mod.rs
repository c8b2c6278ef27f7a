//! Core types for the pramsync engine.
//!
//! - [`id`]: Identifier types (`ThreadId`, `PrimitiveKey`, `OsHandle`)

pub mod id;

pub use id::{OsHandle, PrimitiveKey, ThreadId};
