// SPDX-License-Identifier: MIT

//! `Daemon` — wires an `engine::PollCycleScheduler` to a concrete set of
//! adapters and owns the process-level start/stop handle (spec.md §2
//! addendum, §6). No production adapters ship in this repository; a host
//! process instantiates `Daemon` with its own `ElementApi`/`SessionManager`/
//! etc. implementations.

use dispatch_adapters::{ElementApi, InboxService, NotificationSink, SessionManager, SettingsService, WorktreeManager};
use dispatch_core::PollResult;
use dispatch_engine::{DispatchConfig, PollCycleScheduler, RosterProvider, RuntimeError};
use std::sync::Arc;

pub struct Daemon<E, SM, WT, ST, IB, N, R>
where
    E: ElementApi,
    SM: SessionManager,
    WT: WorktreeManager,
    ST: SettingsService,
    IB: InboxService,
    N: NotificationSink,
    R: RosterProvider,
{
    scheduler: Arc<PollCycleScheduler<E, SM, WT, ST, IB, N, R>>,
}

impl<E, SM, WT, ST, IB, N, R> Daemon<E, SM, WT, ST, IB, N, R>
where
    E: ElementApi,
    SM: SessionManager,
    WT: WorktreeManager,
    ST: SettingsService,
    IB: InboxService,
    N: NotificationSink,
    R: RosterProvider,
{
    pub fn new(scheduler: PollCycleScheduler<E, SM, WT, ST, IB, N, R>) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
        }
    }

    /// Runs startup orphan recovery once, then begins the periodic poll
    /// cycle (spec.md §4.12). Returns immediately; the cycle runs on a
    /// detached task until [`Daemon::stop`] is called.
    pub async fn start(&self) {
        self.scheduler.clone().start().await;
    }

    /// Stops the ticker and waits for any in-flight cycle to finish
    /// (spec.md §5).
    pub async fn stop(&self) {
        self.scheduler.stop().await;
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn config(&self) -> DispatchConfig {
        self.scheduler.config()
    }

    pub fn update_config(&self, f: impl FnOnce(&mut DispatchConfig)) {
        self.scheduler.update_config(f);
    }

    /// Runs one poll cycle immediately, outside the periodic ticker. Used
    /// by hosts that want manual control over cycle timing (spec.md §6).
    pub async fn run_cycle(&self) -> Result<Vec<PollResult>, RuntimeError> {
        self.scheduler.run_cycle().await
    }

    /// `handleRateLimitDetected` (spec.md §6).
    pub async fn handle_rate_limit_detected(
        &self,
        executable: &str,
        resets_at: chrono::DateTime<chrono::Utc>,
    ) {
        self.scheduler
            .handle_rate_limit_detected(executable, resets_at)
            .await
    }

    /// `getRateLimitStatus` (spec.md §6).
    pub async fn get_rate_limit_status(&self) -> dispatch_core::RateLimitStatus {
        self.scheduler.get_rate_limit_status().await
    }

    /// Manual poll entry points (spec.md §6).
    pub async fn poll_worker_availability(&self) -> Result<PollResult, RuntimeError> {
        self.scheduler.poll_worker_availability().await
    }

    pub async fn poll_workflow_tasks(&self) -> Result<PollResult, RuntimeError> {
        self.scheduler.poll_workflow_tasks().await
    }

    pub async fn poll_inboxes(&self) -> Result<PollResult, RuntimeError> {
        self.scheduler.poll_inboxes().await
    }

    pub async fn recover_orphaned_assignments(&self) -> Result<PollResult, RuntimeError> {
        self.scheduler.recover_orphaned_assignments().await
    }

    pub async fn reconcile_closed_unmerged_tasks(&self) -> Result<PollResult, RuntimeError> {
        self.scheduler.reconcile_closed_unmerged_tasks().await
    }

    pub async fn poll_plan_auto_complete(&self) -> Result<PollResult, RuntimeError> {
        self.scheduler.poll_plan_auto_complete().await
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
