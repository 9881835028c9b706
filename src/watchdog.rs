//! Progress watchdog: declares the run stalled if no puppet completion
//! is observed across a full polling interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::constants::WATCHDOG_INTERVAL;

/// Sums the per-puppet completion counters and remembers the previous
/// reading. Call `poll` once per interval from the orchestrator loop.
pub struct Watchdog {
    completed: Vec<Arc<AtomicU64>>,
    last_total: u64,
}

impl Watchdog {
    /// Construct a watchdog over the given per-puppet completion counters.
    pub fn new(completed: Vec<Arc<AtomicU64>>) -> Self {
        Self { completed, last_total: 0 }
    }

    /// Current sum of all puppets' completions.
    pub fn total(&self) -> u64 {
        self.completed.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Returns `true` if the total has not advanced since the last poll.
    /// The very first poll always reports progress, since there is no
    /// prior reading to compare against.
    pub fn poll(&mut self) -> bool {
        let total = self.total();
        let stalled = total == self.last_total;
        self.last_total = total;
        stalled
    }
}

/// Polling cadence the orchestrator should use between `poll` calls.
pub fn interval() -> std::time::Duration {
    WATCHDOG_INTERVAL
}
