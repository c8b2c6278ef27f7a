//! Engine configuration.
//!
//! The configuration surface is values only: how they are collected (command
//! line, environment, a file) is up to the embedding tool. With the
//! `config-file` feature, [`EngineConfig::from_toml_str`] and
//! [`EngineConfig::from_toml_file`] load them from TOML.
//!
//! # Example
//!
//! ```
//! use pramsync::config::{ClockMode, EngineConfig};
//!
//! let config = EngineConfig::default()
//!     .with_max_threads(16)
//!     .with_instructions_per_round(4)
//!     .with_mode(ClockMode::Instructions);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Default thread table size.
pub const DEFAULT_MAX_THREADS: usize = 256;
/// Default per-thread trace capacity, in change-points.
pub const DEFAULT_TRACE_CAPACITY: usize = 2048;
/// Default compression window.
pub const DEFAULT_REDUCTION_WINDOW: usize = 8;
/// Default report path.
pub const DEFAULT_OUTPUT_FILE: &str = "trace.json";
/// Smallest accepted trace capacity.
pub const MIN_TRACE_CAPACITY: usize = 8;

/// How progress is measured and whether lockstep is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// PRAM mode: threads advance in lockstep and trace ticks are progress counters.
    #[default]
    Instructions,
    /// Free-running mode: no lockstep bound, trace ticks are wall-clock milliseconds.
    Time,
}

impl ClockMode {
    /// Returns the unit written in trace reports.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Instructions => "cycles",
            Self::Time => "ms",
        }
    }

    /// Returns true when the scheduler enforces the lockstep bound.
    #[must_use]
    pub const fn is_lockstep(self) -> bool {
        matches!(self, Self::Instructions)
    }
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instructions => f.write_str("instructions"),
            Self::Time => f.write_str("time"),
        }
    }
}

/// How a full trace buffer is compressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// Drop the shortest-lived adjacent sample pairs.
    #[default]
    PairElision,
    /// Replace fixed windows with their most frequent status and halve resolution.
    MajorityVote,
}

/// Error produced by invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field holds a value outside its accepted range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A configuration file could not be read.
    #[error("failed to read config file {path}: {reason}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        reason: String,
    },

    /// A configuration document could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Engine configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of the thread table; larger thread ids are fatal.
    pub max_threads: usize,
    /// Progress granted by one `Done`, i.e. the lockstep round size.
    pub instructions_per_round: u64,
    /// Rounds a thread may run ahead of the watermark minus one (1 = strict lockstep).
    pub sync_period: u64,
    /// Progress measurement and lockstep enforcement.
    pub mode: ClockMode,
    /// Where the trace report is written.
    pub output_path: PathBuf,
    /// Per-thread trace capacity, in change-points.
    pub trace_capacity: usize,
    /// Compression applied when a trace buffer fills up.
    pub compression: CompressionStrategy,
    /// Compression window size.
    pub reduction_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            instructions_per_round: 1,
            sync_period: 1,
            mode: ClockMode::Instructions,
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            trace_capacity: DEFAULT_TRACE_CAPACITY,
            compression: CompressionStrategy::PairElision,
            reduction_window: DEFAULT_REDUCTION_WINDOW,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the thread table size.
    #[must_use]
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Sets the lockstep round size.
    #[must_use]
    pub fn with_instructions_per_round(mut self, instructions: u64) -> Self {
        self.instructions_per_round = instructions;
        self
    }

    /// Sets the sync period.
    #[must_use]
    pub fn with_sync_period(mut self, period: u64) -> Self {
        self.sync_period = period;
        self
    }

    /// Sets the clock mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ClockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the report path.
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Sets the per-thread trace capacity.
    #[must_use]
    pub fn with_trace_capacity(mut self, capacity: usize) -> Self {
        self.trace_capacity = capacity;
        self
    }

    /// Sets the compression strategy.
    #[must_use]
    pub fn with_compression(mut self, strategy: CompressionStrategy) -> Self {
        self.compression = strategy;
        self
    }

    /// Sets the compression window.
    #[must_use]
    pub fn with_reduction_window(mut self, window: usize) -> Self {
        self.reduction_window = window;
        self
    }

    /// Progress a waiting thread may be ahead of the watermark and still be released.
    #[must_use]
    pub fn lockstep_slack(&self) -> u64 {
        self.instructions_per_round
            .saturating_mul(self.sync_period.saturating_sub(1))
    }

    /// Checks every field against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(invalid("max_threads", "must be at least 1"));
        }
        if u32::try_from(self.max_threads).is_err() {
            return Err(invalid("max_threads", "must fit in a 32-bit thread id"));
        }
        if self.instructions_per_round == 0 {
            return Err(invalid("instructions_per_round", "must be at least 1"));
        }
        if self.sync_period == 0 {
            return Err(invalid("sync_period", "must be at least 1"));
        }
        if self.trace_capacity < MIN_TRACE_CAPACITY {
            return Err(invalid(
                "trace_capacity",
                format!("must be at least {MIN_TRACE_CAPACITY}"),
            ));
        }
        if self.reduction_window < 2 {
            return Err(invalid("reduction_window", "must be at least 2"));
        }
        if self.reduction_window > self.trace_capacity / 2 {
            return Err(invalid(
                "reduction_window",
                "must be at most half of trace_capacity",
            ));
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}
