use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};

/// Wall-clock abstraction for time-of-day parameter resolution and event
/// timestamps across the stack.
///
/// - now(): returns the current wall-clock instant (UTC)
/// - minute_of_day(): helper resolving now() to minutes since midnight (0–1439)
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Minutes since midnight for the current wall-clock time.
    fn minute_of_day(&self) -> u16 {
        minute_of_day(self.now())
    }
}

/// Minutes since midnight (0–1439) for a given instant.
#[inline]
pub fn minute_of_day(t: DateTime<Utc>) -> u16 {
    (t.hour() * 60 + t.minute()) as u16
}

/// Default, real-time clock backed by `chrono::Utc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock whose time is set and advanced manually.
///
/// Used by tests and by simulation drivers that step wall-clock time
/// explicitly instead of sleeping.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Start at an arbitrary fixed midnight so minute-of-day is predictable.
    pub fn new() -> Self {
        let origin = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::starting_at(origin)
    }

    pub fn starting_at(t: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(t)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += d;
        }
    }

    /// Jump to an absolute instant (useful for time-of-day tests).
    pub fn set(&self, t: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = t;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|g| *g).unwrap_or_else(|_| Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_of_day_resolves_hours_and_minutes() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 6, 30, 15).unwrap();
        assert_eq!(minute_of_day(t), 390);
        let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(minute_of_day(midnight), 0);
        let last = Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap();
        assert_eq!(minute_of_day(last), 1439);
    }

    #[test]
    fn manual_clock_advances_without_sleeping() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now() - t0, Duration::minutes(5));
        assert_eq!(clock.minute_of_day(), 5);
    }
}
