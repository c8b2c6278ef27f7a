//! Per-thread bounded change-point buffers.
//!
//! Every registry transition appends a `(tick, status)` sample to the buffer
//! of the thread concerned. A buffer never holds more than the configured
//! capacity: when it is full, it is compressed in place before the next
//! append. Buffers outlive thread exit so they can be dumped at the end.

use super::compress;
use crate::config::{CompressionStrategy, EngineConfig};
use crate::record::ThreadStatus;
use crate::tracing_compat::{debug, warn};
use crate::types::ThreadId;
use core::fmt;
use serde::Serialize;
use std::collections::BTreeMap;

/// One change-point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sample {
    /// When the status changed.
    pub tick: u64,
    /// The new status.
    pub status: ThreadStatus,
}

/// Change-points of one thread.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadTrace {
    start: u64,
    end: Option<u64>,
    samples: Vec<Sample>,
    /// Ticks closer than this to the previous sample overwrite it.
    period: u64,
}

impl ThreadTrace {
    fn new(start: u64) -> Self {
        Self {
            start,
            end: None,
            samples: vec![Sample {
                tick: start,
                status: ThreadStatus::Running,
            }],
            period: 1,
        }
    }

    /// Tick of registration.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Tick of exit, if the thread finished.
    #[must_use]
    pub const fn end(&self) -> Option<u64> {
        self.end
    }

    /// Recorded change-points, oldest first.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Current sampling period (doubles with every majority-vote pass).
    #[must_use]
    pub const fn period(&self) -> u64 {
        self.period
    }

    /// Samples encoded as one digit per change-point.
    #[must_use]
    pub fn status_string(&self) -> String {
        self.samples.iter().map(|s| s.status.as_char()).collect()
    }

    fn last(&self) -> Option<Sample> {
        self.samples.last().copied()
    }
}

/// A defect found by [`TraceRecorder::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceAnomaly {
    /// Two adjacent samples carry the same status.
    RepeatedStatus {
        /// Thread owning the trace.
        thread: ThreadId,
        /// Tick of the second sample.
        tick: u64,
    },
    /// A sample is older than the one before it.
    TickRegression {
        /// Thread owning the trace.
        thread: ThreadId,
        /// Tick of the earlier sample.
        previous: u64,
        /// Tick of the offending sample.
        tick: u64,
    },
}

impl fmt::Display for TraceAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepeatedStatus { thread, tick } => {
                write!(f, "{thread}: repeated status at tick {tick}")
            }
            Self::TickRegression {
                thread,
                previous,
                tick,
            } => write!(f, "{thread}: tick {tick} after {previous}"),
        }
    }
}

/// Trace buffers for every thread ever registered.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    traces: BTreeMap<ThreadId, ThreadTrace>,
    capacity: usize,
    window: usize,
    strategy: CompressionStrategy,
    compressions: u64,
}

impl TraceRecorder {
    /// Creates a recorder with the given per-thread capacity.
    #[must_use]
    pub fn new(capacity: usize, window: usize, strategy: CompressionStrategy) -> Self {
        Self {
            traces: BTreeMap::new(),
            capacity,
            window,
            strategy,
            compressions: 0,
        }
    }

    /// Creates a recorder from the trace settings of `config`.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.trace_capacity,
            config.reduction_window,
            config.compression,
        )
    }

    /// Per-thread capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of compression passes run so far.
    #[must_use]
    pub const fn compressions(&self) -> u64 {
        self.compressions
    }

    /// Returns the trace of `thread`.
    #[must_use]
    pub fn get(&self, thread: ThreadId) -> Option<&ThreadTrace> {
        self.traces.get(&thread)
    }

    /// Iterates over traces in thread order.
    pub fn iter(&self) -> impl Iterator<Item = (ThreadId, &ThreadTrace)> {
        self.traces.iter().map(|(t, tr)| (*t, tr))
    }

    /// Starts (or restarts) the trace of `thread` with a running sample.
    pub fn register(&mut self, thread: ThreadId, tick: u64) {
        debug!(thread = %thread, tick, "trace register");
        self.traces.insert(thread, ThreadTrace::new(tick));
    }

    /// Appends a status change for `thread`.
    pub fn update(&mut self, thread: ThreadId, tick: u64, status: ThreadStatus) {
        let capacity = self.capacity;
        let window = self.window;
        let strategy = self.strategy;
        let Some(trace) = self.traces.get_mut(&thread) else {
            warn!(thread = %thread, %status, "trace update for unregistered thread");
            return;
        };
        let Some(last) = trace.last() else {
            trace.samples.push(Sample { tick, status });
            return;
        };
        if last.status == status {
            return;
        }
        let tick = tick.max(last.tick);

        if trace.period > 1
            && trace.samples.len() > 1
            && status != ThreadStatus::Finished
            && tick < last.tick.saturating_add(trace.period)
        {
            trace.samples.pop();
            if trace.last().is_none_or(|prev| prev.status != status) {
                trace.samples.push(Sample {
                    tick: last.tick,
                    status,
                });
            }
            return;
        }

        if trace.samples.len() >= capacity {
            let removed = compress_trace(trace, strategy, capacity, window);
            self.compressions += 1;
            debug!(
                thread = %thread,
                removed,
                remaining = trace.samples.len(),
                period = trace.period,
                "trace compressed"
            );
            if trace.last().is_some_and(|s| s.status == status) {
                return;
            }
        }
        trace.samples.push(Sample { tick, status });
    }

    /// Appends the finished sample and freezes the end tick.
    pub fn finish(&mut self, thread: ThreadId, tick: u64) {
        self.update(thread, tick, ThreadStatus::Finished);
        if let Some(trace) = self.traces.get_mut(&thread) {
            let end = trace.last().map_or(tick, |s| s.tick.max(tick));
            trace.end = Some(end);
        }
    }

    /// Maximum finish tick over all traces.
    ///
    /// Traces of threads that have not finished are skipped with a warning.
    #[must_use]
    pub fn end_tick(&self) -> u64 {
        let mut end = 0;
        for (thread, trace) in &self.traces {
            match trace.end {
                Some(tick) => end = end.max(tick),
                None => warn!(thread = %thread, "trace dumped before thread exit"),
            }
        }
        end
    }

    /// Checks every trace for repeated statuses and decreasing ticks.
    #[must_use]
    pub fn validate(&self) -> Vec<TraceAnomaly> {
        let mut anomalies = Vec::new();
        for (&thread, trace) in &self.traces {
            for pair in trace.samples.windows(2) {
                if pair[0].status == pair[1].status {
                    anomalies.push(TraceAnomaly::RepeatedStatus {
                        thread,
                        tick: pair[1].tick,
                    });
                }
                if pair[1].tick < pair[0].tick {
                    anomalies.push(TraceAnomaly::TickRegression {
                        thread,
                        previous: pair[0].tick,
                        tick: pair[1].tick,
                    });
                }
            }
        }
        anomalies
    }
}

fn compress_trace(
    trace: &mut ThreadTrace,
    strategy: CompressionStrategy,
    capacity: usize,
    window: usize,
) -> usize {
    if strategy == CompressionStrategy::PairElision {
        let pairs = (capacity / window / 2).max(1);
        let removed = compress::elide_pairs(&mut trace.samples, pairs);
        if removed > 0 {
            return removed;
        }
    }
    trace.period = trace.period.saturating_mul(2);
    compress::majority_vote(&mut trace.samples, window)
}
