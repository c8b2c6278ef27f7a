//! Persisted trace report.
//!
//! The report is a JSON document:
//!
//! ```json
//! {
//!   "end": 12,
//!   "unit": "cycles",
//!   "sample-size": 2048,
//!   "threads": [
//!     { "pin-tid": 0, "start": 0, "samples": "0103", "ticks": [0, 3, 7, 12] }
//!   ]
//! }
//! ```
//!
//! `samples` holds one digit per change-point (see
//! [`ThreadStatus`](crate::record::ThreadStatus)); `ticks` holds the tick of
//! each of them. `sample-size` is the per-thread change-point capacity.

use super::recorder::TraceRecorder;
use crate::config::ClockMode;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Report entry of one thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadReport {
    /// Thread id.
    #[serde(rename = "pin-tid")]
    pub pin_tid: u32,
    /// Registration tick.
    pub start: u64,
    /// Digit-coded statuses, one per change-point.
    pub samples: String,
    /// Tick of each change-point.
    #[serde(default)]
    pub ticks: Vec<u64>,
}

/// The whole report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceReport {
    /// Maximum finish tick across all threads.
    pub end: u64,
    /// `"cycles"` or `"ms"`.
    pub unit: String,
    /// Per-thread change-point capacity.
    #[serde(rename = "sample-size")]
    pub sample_size: usize,
    /// One entry per thread ever registered, in id order.
    pub threads: Vec<ThreadReport>,
}

impl TraceReport {
    /// Builds the report from the recorder's current contents.
    #[must_use]
    pub fn from_recorder(recorder: &TraceRecorder, mode: ClockMode) -> Self {
        let threads = recorder
            .iter()
            .map(|(thread, trace)| ThreadReport {
                pin_tid: thread.as_u32(),
                start: trace.start(),
                samples: trace.status_string(),
                ticks: trace.samples().iter().map(|s| s.tick).collect(),
            })
            .collect();
        Self {
            end: recorder.end_tick(),
            unit: mode.unit().to_string(),
            sample_size: recorder.capacity(),
            threads,
        }
    }

    /// Returns the entry for `pin_tid`.
    #[must_use]
    pub fn thread(&self, pin_tid: u32) -> Option<&ThreadReport> {
        self.threads.iter().find(|t| t.pin_tid == pin_tid)
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a report.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Writes the report to `path`, creating parent directories.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut json = self.to_json_pretty()?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }
}
