//! Virtual time base
//!
//! The simulation runs on its own timeline. Time only advances when the
//! event pump advances it, which makes every time-dependent behavior
//! (TTL expiry, throughput windows, worker delays) reproducible in tests.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A point on the simulation timeline
///
/// Opaque nanoseconds since boot of the simulation. There is no mapping to
/// wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instant {
    nanos: u64,
}

impl Instant {
    /// The start of the simulation timeline.
    pub const ZERO: Instant = Instant { nanos: 0 };

    /// Creates an instant from nanoseconds since boot
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Returns nanoseconds since boot
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Returns the duration elapsed since an earlier instant
    ///
    /// Saturates to zero if `earlier` is actually later.
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, duration: Duration) -> Self::Output {
        Instant::from_nanos(self.nanos + duration.as_nanos())
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, duration: Duration) -> Self::Output {
        Instant::from_nanos(self.nanos.saturating_sub(duration.as_nanos()))
    }
}

/// A span of simulation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Duration {
    nanos: u64,
}

impl Duration {
    /// Zero-length duration.
    pub const ZERO: Duration = Duration { nanos: 0 };

    /// Creates a duration from nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Creates a duration from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    /// Creates a duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            nanos: secs * 1_000_000_000,
        }
    }

    /// Returns the duration in nanoseconds
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Returns the duration in whole milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.nanos / 1_000_000
    }

    /// Returns the duration in whole seconds
    pub const fn as_secs(&self) -> u64 {
        self.nanos / 1_000_000_000
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, other: Duration) -> Self::Output {
        Duration::from_nanos(self.nanos + other.nanos)
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, other: Duration) -> Self::Output {
        Duration::from_nanos(self.nanos.saturating_sub(other.nanos))
    }
}

/// Shared handle to the simulation clock
///
/// Cloning yields another handle to the same timeline. The clock only moves
/// when [`advance`](KernelClock::advance) is called; readers on other
/// threads (parallel workers) observe the same monotone sequence.
#[derive(Debug, Clone, Default)]
pub struct KernelClock {
    nanos: Arc<AtomicU64>,
}

impl KernelClock {
    /// Creates a clock at the start of the timeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock starting at a specific instant
    pub fn starting_at(instant: Instant) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(instant.as_nanos())),
        }
    }

    /// Returns the current instant
    pub fn now(&self) -> Instant {
        Instant::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    /// Advances the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        self.nanos.fetch_add(duration.as_nanos(), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_conversions() {
        let d = Duration::from_secs(2);
        assert_eq!(d.as_millis(), 2000);
        assert_eq!(d.as_nanos(), 2_000_000_000);
        assert_eq!(d, Duration::from_millis(2000));
    }

    #[test]
    fn test_duration_arithmetic_saturates() {
        let short = Duration::from_millis(100);
        let long = Duration::from_millis(300);
        assert_eq!(long - short, Duration::from_millis(200));
        assert_eq!(short - long, Duration::ZERO);
    }

    #[test]
    fn test_instant_ordering_and_since() {
        let early = Instant::from_nanos(1_000);
        let late = early + Duration::from_nanos(500);
        assert!(late > early);
        assert_eq!(late.duration_since(early), Duration::from_nanos(500));
        assert_eq!(early.duration_since(late), Duration::ZERO);
    }

    #[test]
    fn test_clock_shared_between_handles() {
        let clock = KernelClock::new();
        let other = clock.clone();

        assert_eq!(clock.now(), Instant::ZERO);
        clock.advance(Duration::from_millis(16));
        assert_eq!(other.now(), Instant::from_nanos(16_000_000));
    }

    #[test]
    fn test_clock_starting_at() {
        let clock = KernelClock::starting_at(Instant::from_nanos(42));
        assert_eq!(clock.now().as_nanos(), 42);
    }
}
