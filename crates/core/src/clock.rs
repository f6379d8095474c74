// SPDX-License-Identifier: MIT

//! Clock abstraction so rate-limit floors, rapid-exit thresholds, and
//! grace periods can be tested without real wall-clock delay.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Source of "now" for the daemon. All timestamp comparisons in the engine
/// go through this trait rather than calling `Utc::now()` directly.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests. Starts at a fixed instant and only moves
/// when explicitly advanced.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.inner.lock() = at;
    }

    pub fn advance(&self, delta: ChronoDuration) {
        let mut guard = self.inner.lock();
        *guard += delta;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        // Arbitrary fixed epoch so tests are reproducible without needing
        // `Utc::now()` (which, like `std::time::Instant::now`, is a source
        // of nondeterminism we keep out of the engine entirely).
        Self::new(
            DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_default(),
        )
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
