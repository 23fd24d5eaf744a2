// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Clock abstraction for testable time handling.
//!
//! Container ids are derived from `epoch_ns()`, and cron rescheduling and
//! the watchdog both reason about elapsed wall time — all through this
//! trait, so none of it needs a real sleep to test.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn utc_now(&self) -> DateTime<Utc>;
    fn epoch_ns(&self) -> u128;
}

/// Real system clock.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn epoch_ns(&self) -> u128 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos()
    }
}

/// Fake clock for tests — advances only when told to.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockState>>,
}

struct FakeClockState {
    instant: Instant,
    utc: DateTime<Utc>,
    epoch_ns: u128,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockState {
                instant: Instant::now(),
                utc: DateTime::UNIX_EPOCH,
                epoch_ns: 1_000_000_000,
            })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock();
        state.instant += duration;
        state.utc += chrono::Duration::from_std(duration).unwrap_or_default();
        state.epoch_ns += duration.as_nanos();
    }

    pub fn set_utc(&self, utc: DateTime<Utc>) {
        self.inner.lock().utc = utc;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().instant
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.inner.lock().utc
    }

    fn epoch_ns(&self) -> u128 {
        self.inner.lock().epoch_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_all_facets_together() {
        let clock = FakeClock::new();
        let before_ns = clock.epoch_ns();
        let before_instant = clock.now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.epoch_ns() - before_ns, Duration::from_secs(5).as_nanos());
        assert_eq!(clock.now() - before_instant, Duration::from_secs(5));
    }
}
