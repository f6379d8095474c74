// SPDX-License-Identifier: MIT

//! Environment variable overrides for `DispatchConfig` (spec.md §6).
//! Follows the teacher's `env.rs` pattern: an env var override, else the
//! programmatic default baked into the config struct. There is no TOML
//! file, since this daemon owns no config of its own beyond these knobs —
//! everything else (the fallback chain, agent roster) comes from the host
//! platform's adapters.

use dispatch_engine::DispatchConfig;

/// Builds a `DispatchConfig` starting from its defaults and applying any
/// `DISPATCH_*` environment overrides found.
pub fn load_config() -> DispatchConfig {
    load_config_from(|name| std::env::var(name).ok())
}

/// Same as [`load_config`], but reads overrides through `lookup` instead of
/// the process environment directly, so tests don't have to mutate global
/// process state to exercise the override paths.
pub fn load_config_from(lookup: impl Fn(&str) -> Option<String>) -> DispatchConfig {
    let mut config = DispatchConfig::default();
    let u64_of = |name: &str| lookup(name).and_then(|s| s.parse::<u64>().ok());
    let bool_of = |name: &str| lookup(name).and_then(|s| s.parse::<bool>().ok());

    if let Some(v) = u64_of("DISPATCH_POLL_INTERVAL_MS") {
        config.poll_interval_ms = v;
    }
    if let Some(v) = bool_of("DISPATCH_WORKER_AVAILABILITY_POLL_ENABLED") {
        config.worker_availability_poll_enabled = v;
    }
    if let Some(v) = bool_of("DISPATCH_INBOX_POLL_ENABLED") {
        config.inbox_poll_enabled = v;
    }
    if let Some(v) = bool_of("DISPATCH_WORKFLOW_TASK_POLL_ENABLED") {
        config.workflow_task_poll_enabled = v;
    }
    if let Some(v) = bool_of("DISPATCH_ORPHAN_RECOVERY_ENABLED") {
        config.orphan_recovery_enabled = v;
    }
    if let Some(v) = bool_of("DISPATCH_CLOSED_UNMERGED_RECONCILIATION_ENABLED") {
        config.closed_unmerged_reconciliation_enabled = v;
    }
    if let Some(v) = bool_of("DISPATCH_PLAN_AUTO_COMPLETE_ENABLED") {
        config.plan_auto_complete_enabled = v;
    }
    if let Some(v) = u64_of("DISPATCH_MAX_RESUME_ATTEMPTS") {
        config.max_resume_attempts_before_recovery = v as u32;
    }
    if let Some(v) = u64_of("DISPATCH_MAX_STEWARD_RECOVERIES") {
        config.max_steward_recoveries = v as u32;
    }

    config
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
