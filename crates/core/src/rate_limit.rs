// SPDX-License-Identifier: MIT

//! Rate-limit domain types shared between the tracker (`engine`) and its
//! callers. The tracker itself — the stateful map of executable → reset
//! time — lives in `engine::rate_limit`; this module holds the plain data
//! it reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One executable's recorded rate-limit expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    pub executable: String,
    pub resets_at: DateTime<Utc>,
}

/// Ordered list of executable names; `chain[0]` is preferred. Rate limits
/// propagate to every member of the chain at once (spec.md §3 "plan-scope
/// rule").
pub type FallbackChain = Vec<String>;

/// Snapshot returned by `RateLimitTracker::status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub limits: Vec<RateLimitEntry>,
    pub soonest_reset: Option<DateTime<Utc>>,
    pub is_paused: bool,
}

/// What `ExecutableResolver::resolve` hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedExecutable {
    Use(String),
    AllLimited,
}
