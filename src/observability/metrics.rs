//! Engine statistics.
//!
//! Counters for dispatched actions (per kind), lockstep rounds, fast-path
//! re-permits, released threads, and trace compressions. All updates happen
//! inside the dispatcher's critical section, so plain integers suffice.

use core::fmt;
use serde::Serialize;
use std::collections::BTreeMap;

/// A monotonically increasing counter.
#[derive(Debug, Clone, Serialize)]
pub struct Counter {
    name: &'static str,
    value: u64,
}

impl Counter {
    /// Creates a counter at zero.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name, value: 0 }
    }

    /// Returns the counter name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the current value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Increments the counter by the given amount.
    pub fn increment(&mut self, amount: u64) {
        self.value = self.value.saturating_add(amount);
    }

    /// Increments the counter by 1.
    pub fn inc(&mut self) {
        self.increment(1);
    }

    /// Sets the counter to an externally tracked total.
    pub fn record_total(&mut self, total: u64) {
        self.value = self.value.max(total);
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Statistics of one engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineMetrics {
    actions: BTreeMap<&'static str, u64>,
    /// Total dispatched actions.
    pub dispatched: Counter,
    /// Watermark advances.
    pub rounds: Counter,
    /// `Done` actions answered without parking the thread.
    pub fast_path: Counter,
    /// Threads released by release passes.
    pub releases: Counter,
    /// Trace compression passes.
    pub compressions: Counter,
    /// Primitives created without an explicit init.
    pub implicit_primitives: Counter,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Creates zeroed statistics.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: BTreeMap::new(),
            dispatched: Counter::new("dispatched"),
            rounds: Counter::new("rounds"),
            fast_path: Counter::new("fast_path"),
            releases: Counter::new("releases"),
            compressions: Counter::new("compressions"),
            implicit_primitives: Counter::new("implicit_primitives"),
        }
    }

    /// Counts one dispatched action of kind `name`.
    pub fn record_action(&mut self, name: &'static str) {
        self.dispatched.inc();
        *self.actions.entry(name).or_insert(0) += 1;
    }

    /// Returns how many actions of kind `name` were dispatched.
    #[must_use]
    pub fn action_count(&self, name: &str) -> u64 {
        self.actions.get(name).copied().unwrap_or(0)
    }

    /// Iterates over per-kind action counts in name order.
    pub fn actions(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.actions.iter().map(|(k, v)| (*k, *v))
    }

    /// Formats the statistics as a human-readable string.
    #[must_use]
    pub fn format_text(&self) -> String {
        use std::fmt::Write;
        let mut s = String::new();

        s.push_str("# Counters\n");
        for counter in [
            &self.dispatched,
            &self.rounds,
            &self.fast_path,
            &self.releases,
            &self.compressions,
            &self.implicit_primitives,
        ] {
            let _ = writeln!(s, "{counter}");
        }

        s.push_str("\n# Actions\n");
        for (name, count) in &self.actions {
            let _ = writeln!(s, "{name}={count}");
        }
        s
    }
}
