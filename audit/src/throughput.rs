//! Trailing-window operation counter

use core_types::{Duration, Instant};
use std::collections::VecDeque;

/// Counts operations within a trailing time window
///
/// Stamps are pruned on both record and query, so the structure stays
/// bounded by the volume of the window instead of growing with the full
/// history. The reported rate is the exact count of stamps whose age is
/// strictly less than the window.
#[derive(Debug, Clone)]
pub struct ThroughputCounter {
    window: Duration,
    stamps: VecDeque<Instant>,
}

impl ThroughputCounter {
    /// Creates a counter with a one-second window
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    /// Creates a counter with a custom window
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            stamps: VecDeque::new(),
        }
    }

    /// Records one operation at `now`
    pub fn record(&mut self, now: Instant) {
        self.prune(now);
        self.stamps.push_back(now);
    }

    /// Returns the number of operations within the trailing window
    pub fn rate(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.stamps.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.stamps.front() {
            if now.duration_since(*oldest) >= self.window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for ThroughputCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_within_window() {
        let mut counter = ThroughputCounter::new();
        let start = Instant::ZERO;

        counter.record(start);
        counter.record(start + Duration::from_millis(200));
        counter.record(start + Duration::from_millis(400));

        assert_eq!(counter.rate(start + Duration::from_millis(500)), 3);
    }

    #[test]
    fn test_old_stamps_fall_out() {
        let mut counter = ThroughputCounter::new();
        let start = Instant::ZERO;

        counter.record(start);
        counter.record(start + Duration::from_millis(900));

        // The first stamp is exactly one window old and no longer counts.
        assert_eq!(counter.rate(start + Duration::from_secs(1)), 1);
        assert_eq!(counter.rate(start + Duration::from_millis(1900)), 0);
    }

    #[test]
    fn test_custom_window() {
        let mut counter = ThroughputCounter::with_window(Duration::from_millis(100));
        let start = Instant::ZERO;

        counter.record(start);
        assert_eq!(counter.rate(start + Duration::from_millis(50)), 1);
        assert_eq!(counter.rate(start + Duration::from_millis(150)), 0);
    }

    #[test]
    fn test_record_prunes_as_it_goes() {
        let mut counter = ThroughputCounter::with_window(Duration::from_millis(10));
        let start = Instant::ZERO;

        for i in 0..1000 {
            counter.record(start + Duration::from_millis(i * 20));
        }

        // Each stamp expires before the next arrives; storage stays bounded.
        assert_eq!(counter.rate(start + Duration::from_millis(1000 * 20)), 0);
    }
}
