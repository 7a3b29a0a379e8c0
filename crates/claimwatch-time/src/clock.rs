//! Clock implementations
//!
//! All timing uses local wall-clock time. Clock adjustments during a session
//! are not compensated; negative elapsed spans clamp to zero.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use claimwatch_core::Timestamp;
use parking_lot::Mutex;

/// Source of the current local time
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Local system wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Local::now().naive_local()
    }
}

/// Manually driven clock for tests and simulation
#[derive(Clone, Debug)]
pub struct ManualClock {
    value: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        ManualClock {
            value: Arc::new(Mutex::new(start)),
        }
    }

    /// Move time forward
    pub fn advance(&self, dt: Duration) {
        let mut value = self.value.lock();
        *value = shift(*value, dt);
    }

    /// Jump to an absolute time (may move backwards)
    pub fn set(&self, to: Timestamp) {
        *self.value.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.value.lock()
    }
}

/// Time elapsed from `since` to `now`, zero if the clock went backwards
#[inline]
pub fn elapsed(since: Timestamp, now: Timestamp) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

/// `at` moved forward by `dt`, saturating at the maximum representable time
pub fn shift(at: Timestamp, dt: Duration) -> Timestamp {
    chrono::Duration::from_std(dt)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(NaiveDateTime::MAX)
}

/// `at` moved back by `dt`, saturating at the minimum representable time
pub fn rewind(at: Timestamp, dt: Duration) -> Timestamp {
    chrono::Duration::from_std(dt)
        .ok()
        .and_then(|delta| at.checked_sub_signed(delta))
        .unwrap_or(NaiveDateTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(start());
        clock.advance(Duration::from_millis(1500));
        assert_eq!(elapsed(start(), clock.now()), Duration::from_millis(1500));
    }

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(start());
        let other = clock.clone();
        other.advance(Duration::from_secs(3));
        assert_eq!(clock.now(), other.now());
    }

    #[test]
    fn test_elapsed_clamps_backwards() {
        let later = shift(start(), Duration::from_secs(10));
        assert_eq!(elapsed(later, start()), Duration::ZERO);
        assert_eq!(rewind(later, Duration::from_secs(10)), start());
    }
}
