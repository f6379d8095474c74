// SPDX-License-Identifier: MIT

//! `RateLimitTracker` — single source of truth for rate-limit state
//! (spec.md §4.1). Stateful; everything in `dispatch_core::rate_limit` is
//! just the plain data this module reports.

use chrono::{DateTime, Duration, Utc};
use dispatch_core::{Clock, FallbackChain, RateLimitEntry, RateLimitStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Rate-limit errors from the upstream API often parse out short-looking
/// reset times; clamping forward prevents rapid-retry thrash during a long
/// outage.
pub const MIN_FLOOR: Duration = Duration::minutes(15);

pub struct RateLimitTracker {
    clock: Arc<dyn Clock>,
    limits: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RateLimitTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            limits: Mutex::new(HashMap::new()),
        }
    }

    /// Record `executable` as limited until `resets_at`, clamped forward to
    /// `MIN_FLOOR` and propagated to every member of `chain` if
    /// `executable` belongs to it (the "plan-scope rule"). Never moves a
    /// stored `resets_at` earlier.
    pub fn mark_limited(&self, executable: &str, resets_at: DateTime<Utc>, chain: &FallbackChain) {
        let floor = self.clock.now() + MIN_FLOOR;
        let clamped = resets_at.max(floor);

        let members: Vec<&str> = if chain.iter().any(|e| e == executable) {
            chain.iter().map(String::as_str).collect()
        } else {
            vec![executable]
        };

        let mut limits = self.limits.lock();
        for member in members {
            let entry = limits.entry(member.to_string()).or_insert(clamped);
            if clamped > *entry {
                *entry = clamped;
            }
        }
    }

    /// True iff a non-expired entry exists for `executable`. Expired
    /// entries are pruned lazily on lookup.
    pub fn is_limited(&self, executable: &str) -> bool {
        let now = self.clock.now();
        let mut limits = self.limits.lock();
        match limits.get(executable) {
            Some(resets_at) if *resets_at > now => true,
            Some(_) => {
                limits.remove(executable);
                false
            }
            None => false,
        }
    }

    /// `isPaused` = every chain member is currently limited. For an empty
    /// chain, fall back to whether `default_executable` is limited.
    pub fn status(&self, chain: &FallbackChain, default_executable: &str) -> RateLimitStatus {
        let now = self.clock.now();
        let mut limits = self.limits.lock();
        limits.retain(|_, resets_at| *resets_at > now);

        let entries: Vec<RateLimitEntry> = limits
            .iter()
            .map(|(executable, resets_at)| RateLimitEntry {
                executable: executable.clone(),
                resets_at: *resets_at,
            })
            .collect();
        let soonest_reset = limits.values().min().copied();

        let is_paused = if chain.is_empty() {
            limits.contains_key(default_executable)
        } else {
            chain.iter().all(|e| limits.contains_key(e))
        };

        RateLimitStatus {
            limits: entries,
            soonest_reset,
            is_paused,
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
