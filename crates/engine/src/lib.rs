// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Dispatch daemon poll cycle: matches tasks to agents, recovers orphaned
//! work, forwards inbox messages, and reconciles closed-but-unmerged work,
//! all under one fixed-order scheduler (spec.md §4, §5).

mod assignment;
mod closed_unmerged_reconciler;
mod config;
mod error;
mod executable_resolver;
mod inbox_poller;
mod orphan;
mod plan_auto_complete;
mod rate_limit;
mod scheduler;
mod workflow_poller;

pub use assignment::{AssignmentEngine, RapidExitDetector};
pub use closed_unmerged_reconciler::ClosedUnmergedReconciler;
pub use config::DispatchConfig;
pub use error::RuntimeError;
pub use executable_resolver::ExecutableResolver;
pub use inbox_poller::InboxPoller;
pub use orphan::OrphanRecovery;
pub use plan_auto_complete::PlanAutoComplete;
pub use rate_limit::RateLimitTracker;
pub use scheduler::{PollCycleScheduler, PollRosters, RosterProvider};
pub use workflow_poller::WorkflowPoller;
