// SPDX-License-Identifier: MIT

//! The result type every poll method returns (spec.md §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollType {
    OrphanRecovery,
    ClosedUnmergedReconciliation,
    Inbox,
    WorkerAvailability,
    WorkflowTask,
    StewardTrigger,
    PlanAutoComplete,
}

impl PollType {
    /// Dispatch polls may start new sessions and are skipped while the
    /// rate-limit tracker reports the plan is fully paused (spec.md §4.12).
    pub fn is_dispatch_poll(self) -> bool {
        matches!(self, PollType::WorkerAvailability | PollType::WorkflowTask)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResult {
    pub poll_type: PollType,
    pub started_at: DateTime<Utc>,
    pub processed: u32,
    pub errors: u32,
    pub error_messages: Vec<String>,
    pub duration_ms: u64,
}

impl PollResult {
    pub fn success(&self) -> bool {
        self.errors == 0
    }
}

/// Accumulator used while a poll method walks its task list, so the
/// per-task catch-and-continue policy (spec.md §7) is implemented once.
pub struct PollResultBuilder {
    poll_type: PollType,
    started_at: DateTime<Utc>,
    processed: u32,
    errors: u32,
    error_messages: Vec<String>,
}

impl PollResultBuilder {
    pub fn new(poll_type: PollType, started_at: DateTime<Utc>) -> Self {
        Self {
            poll_type,
            started_at,
            processed: 0,
            errors: 0,
            error_messages: Vec::new(),
        }
    }

    pub fn record_processed(&mut self) {
        self.processed += 1;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors += 1;
        self.error_messages.push(message.into());
    }

    pub fn finish(self, now: DateTime<Utc>) -> PollResult {
        let duration_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
        PollResult {
            poll_type: self.poll_type,
            started_at: self.started_at,
            processed: self.processed,
            errors: self.errors,
            error_messages: self.error_messages,
            duration_ms,
        }
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
