//! Sweep timing accounting.
//!
//! The scheduler measures every block sweep with a [`SweepTimer`] and folds
//! the result into [`SweepStats`], which also counts overruns (sweeps whose
//! next wake time had already passed).

use std::time::{Duration, Instant};

/// Measures one sweep.
pub struct SweepTimer {
    start: Instant,
}

impl SweepTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}

/// Accumulated sweep statistics.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SweepStats {
    pub sweeps: u64,
    pub total: Duration,
    pub longest: Duration,
    pub overruns: u64,
}

impl SweepStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sweep measurement.
    pub fn record(&mut self, elapsed: Duration) {
        self.sweeps += 1;
        self.total += elapsed;
        self.longest = self.longest.max(elapsed);
    }

    pub fn record_overrun(&mut self) {
        self.overruns += 1;
    }

    /// Average sweep duration (zero before the first sweep).
    pub fn average(&self) -> Duration {
        if self.sweeps == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.sweeps);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}
