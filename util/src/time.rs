//! General time utility functions
//!
//! Control components read time through the [`Clock`] trait so that the same
//! code runs against the host's monotonic clock or a manually stepped clock.

use chrono;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A time in milliseconds since some clock-specific epoch.
pub type TimeMs = u64;

/// A millisecond resolution time source.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since the clock's epoch.
    fn now_ms(&self) -> TimeMs;
}

/// Clock backed by the host's monotonic clock. The epoch is the moment the
/// clock is created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant
}

/// Clock which only moves when told to.
///
/// Used for tests and for replaying recorded runs.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> TimeMs {
        self.start.elapsed().as_millis() as TimeMs
    }
}

impl ManualClock {
    pub fn new(start_ms: TimeMs) -> Self {
        Self { now_ms: AtomicU64::new(start_ms) }
    }

    /// Set the current time.
    pub fn set_ms(&self, now_ms: TimeMs) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Move the clock forward by the given number of milliseconds.
    pub fn advance_ms(&self, delta_ms: TimeMs) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> TimeMs {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    if let Some(ns) = duration.num_nanoseconds() {
        Some(ns as f64 / NANOS_PER_SECOND as f64)
    }
    else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(5);
        assert_eq!(clock.now_ms(), 5);
        clock.advance_ms(10);
        assert_eq!(clock.now_ms(), 15);
        clock.set_ms(500);
        assert_eq!(clock.now_ms(), 500);
    }

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
    }
}
