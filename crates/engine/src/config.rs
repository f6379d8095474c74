// SPDX-License-Identifier: MIT

//! `DispatchConfig` — per-poll enable flags, intervals, thresholds
//! (spec.md §6 "Configuration surface"). Deserializable so a host process
//! can load it from file or environment the way `oj_daemon::env` does for
//! the teacher's daemon, without the core needing to know the format.

use serde::{Deserialize, Serialize};

fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_grace_period_ms() -> i64 {
    120_000
}
fn default_max_resume_attempts() -> u32 {
    3
}
fn default_max_steward_recoveries() -> u32 {
    3
}
fn default_max_reconciliations() -> u32 {
    3
}
fn default_rapid_exit_threshold_ms() -> i64 {
    10_000
}
fn default_rapid_exit_fallback_reset_ms() -> i64 {
    3_600_000
}
fn default_escalation_steward_threshold() -> usize {
    3
}
fn default_rate_limit_session_pattern_count() -> usize {
    3
}
fn default_rate_limit_session_gap_ms() -> i64 {
    120_000
}
fn default_rate_limit_patterns() -> Vec<String> {
    vec![
        r"(?i)you've hit your limit".to_string(),
        r"(?i)weekly limit reached".to_string(),
        r"(?i)resets [0-9apm:]+".to_string(),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DispatchConfig {
    pub poll_interval_ms: u64,

    pub worker_availability_poll_enabled: bool,
    pub inbox_poll_enabled: bool,
    pub steward_trigger_poll_enabled: bool,
    pub workflow_task_poll_enabled: bool,
    pub orphan_recovery_enabled: bool,
    pub closed_unmerged_reconciliation_enabled: bool,
    pub plan_auto_complete_enabled: bool,

    pub closed_unmerged_grace_period_ms: i64,
    pub max_resume_attempts_before_recovery: u32,
    pub max_steward_recoveries: u32,
    pub max_reconciliations: u32,

    pub rapid_exit_threshold_ms: i64,
    pub rapid_exit_fallback_reset_ms: i64,
    pub escalation_steward_threshold: usize,
    pub rate_limit_session_pattern_count: usize,
    pub rate_limit_session_gap_ms: i64,

    /// **[ADDED]** Regex patterns (first match wins) an assistant message is
    /// tested against to classify a rapid exit as rate-limited (spec.md §9
    /// Open Question: "keep the regex set configurable").
    pub rate_limit_patterns: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            worker_availability_poll_enabled: default_true(),
            inbox_poll_enabled: default_true(),
            steward_trigger_poll_enabled: default_true(),
            workflow_task_poll_enabled: default_true(),
            orphan_recovery_enabled: default_true(),
            closed_unmerged_reconciliation_enabled: default_true(),
            plan_auto_complete_enabled: default_true(),
            closed_unmerged_grace_period_ms: default_grace_period_ms(),
            max_resume_attempts_before_recovery: default_max_resume_attempts(),
            max_steward_recoveries: default_max_steward_recoveries(),
            max_reconciliations: default_max_reconciliations(),
            rapid_exit_threshold_ms: default_rapid_exit_threshold_ms(),
            rapid_exit_fallback_reset_ms: default_rapid_exit_fallback_reset_ms(),
            escalation_steward_threshold: default_escalation_steward_threshold(),
            rate_limit_session_pattern_count: default_rate_limit_session_pattern_count(),
            rate_limit_session_gap_ms: default_rate_limit_session_gap_ms(),
            rate_limit_patterns: default_rate_limit_patterns(),
        }
    }
}

impl DispatchConfig {
    pub fn closed_unmerged_grace_period(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.closed_unmerged_grace_period_ms)
    }

    pub fn rapid_exit_threshold(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.rapid_exit_threshold_ms)
    }

    pub fn rapid_exit_fallback_reset(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.rapid_exit_fallback_reset_ms)
    }

    pub fn rate_limit_session_gap(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.rate_limit_session_gap_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
