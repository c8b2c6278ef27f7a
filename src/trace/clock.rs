//! Tick source for trace samples.

use crate::config::ClockMode;
use std::time::Instant;

/// Produces the tick recorded with each trace sample.
///
/// In instruction mode the tick is the progress counter of the thread the
/// sample belongs to. In time mode it is the number of milliseconds since the
/// clock was created.
#[derive(Debug, Clone, Copy)]
pub enum TraceClock {
    /// Ticks are progress counters.
    Instructions,
    /// Ticks are wall-clock milliseconds since `origin`.
    WallClock {
        /// Creation instant.
        origin: Instant,
    },
}

impl TraceClock {
    /// Creates the clock matching `mode`.
    #[must_use]
    pub fn for_mode(mode: ClockMode) -> Self {
        match mode {
            ClockMode::Instructions => Self::Instructions,
            ClockMode::Time => Self::WallClock {
                origin: Instant::now(),
            },
        }
    }

    /// Returns the tick for a sample of a thread at `progress`.
    #[must_use]
    pub fn tick(&self, progress: u64) -> u64 {
        match self {
            Self::Instructions => progress,
            Self::WallClock { origin } => {
                u64::try_from(origin.elapsed().as_millis()).unwrap_or(u64::MAX)
            }
        }
    }
}
