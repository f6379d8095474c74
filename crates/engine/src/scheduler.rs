// SPDX-License-Identifier: MIT

//! `PollCycleScheduler` — the daemon's main loop (spec.md §4.12). Runs
//! startup orphan recovery once, then ticks the fixed poll order forever
//! until `stop()`. One spawned task does all of it sequentially, which is
//! what gives the non-overlap guarantee for free: there is nowhere for two
//! cycles to race because there is only ever one task running them.

use crate::assignment::AssignmentEngine;
use crate::closed_unmerged_reconciler::ClosedUnmergedReconciler;
use crate::config::DispatchConfig;
use crate::error::RuntimeError;
use crate::executable_resolver::ExecutableResolver;
use crate::inbox_poller::InboxPoller;
use crate::orphan::OrphanRecovery;
use crate::plan_auto_complete::PlanAutoComplete;
use crate::rate_limit::RateLimitTracker;
use crate::workflow_poller::WorkflowPoller;
use async_trait::async_trait;
use chrono::Utc;
use dispatch_adapters::{ElementApi, InboxService, NotificationSink, SessionManager, SettingsService, WorktreeManager};
use dispatch_core::{format_elapsed_ms, Agent, PollResult, PollResultBuilder, PollType};
use parking_lot::Mutex as SyncMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The active agents a cycle needs, refreshed by the caller each time
/// since `ElementApi` is scoped to tasks/plans and has no agent directory
/// of its own (spec.md §1 Non-goals).
#[derive(Debug, Clone, Default)]
pub struct PollRosters {
    pub workers: Vec<Agent>,
    pub merge_stewards: Vec<Agent>,
    pub recovery_stewards: Vec<Agent>,
    pub directors: Vec<Agent>,
    pub inbox_recipients: Vec<Agent>,
}

/// Supplies a fresh `PollRosters` at the start of every cycle. Backed by
/// whatever agent directory the host platform keeps; out of scope here.
#[async_trait]
pub trait RosterProvider: Send + Sync + 'static {
    async fn snapshot(&self) -> PollRosters;
}

pub struct PollCycleScheduler<E, SM, WT, ST, IB, N, R>
where
    E: ElementApi,
    SM: SessionManager,
    WT: WorktreeManager,
    ST: SettingsService,
    IB: InboxService,
    N: NotificationSink,
    R: RosterProvider,
{
    assignment: AssignmentEngine<E, SM, WT, ST>,
    workflow: WorkflowPoller<E, SM>,
    orphan: OrphanRecovery<E, SM, WT, ST, N>,
    reconciler: ClosedUnmergedReconciler<E>,
    inbox: InboxPoller<E, SM, IB, ST>,
    plan_complete: PlanAutoComplete<E>,
    resolver: ExecutableResolver<ST>,
    tracker: Arc<RateLimitTracker>,
    rosters: R,
    config: SyncMutex<DispatchConfig>,
    cycle_lock: Arc<AsyncMutex<()>>,
    running: Arc<AtomicBool>,
    task: AsyncMutex<Option<JoinHandle<()>>>,
}

#[allow(clippy::too_many_arguments)]
impl<E, SM, WT, ST, IB, N, R> PollCycleScheduler<E, SM, WT, ST, IB, N, R>
where
    E: ElementApi,
    SM: SessionManager,
    WT: WorktreeManager,
    ST: SettingsService,
    IB: InboxService,
    N: NotificationSink,
    R: RosterProvider,
{
    pub fn new(
        assignment: AssignmentEngine<E, SM, WT, ST>,
        workflow: WorkflowPoller<E, SM>,
        orphan: OrphanRecovery<E, SM, WT, ST, N>,
        reconciler: ClosedUnmergedReconciler<E>,
        inbox: InboxPoller<E, SM, IB, ST>,
        plan_complete: PlanAutoComplete<E>,
        resolver: ExecutableResolver<ST>,
        tracker: Arc<RateLimitTracker>,
        rosters: R,
        config: DispatchConfig,
    ) -> Self {
        Self {
            assignment,
            workflow,
            orphan,
            reconciler,
            inbox,
            plan_complete,
            resolver,
            tracker,
            rosters,
            config: SyncMutex::new(config),
            cycle_lock: Arc::new(AsyncMutex::new(())),
            running: Arc::new(AtomicBool::new(false)),
            task: AsyncMutex::new(None),
        }
    }

    pub fn config(&self) -> DispatchConfig {
        self.config.lock().clone()
    }

    /// `updateConfig` (spec.md §6). Only the scheduler-visible knobs — poll
    /// enables and interval — are live; per-component thresholds are fixed
    /// at construction (see DESIGN.md).
    pub fn update_config(&self, f: impl FnOnce(&mut DispatchConfig)) {
        f(&mut self.config.lock());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// `handleRateLimitDetected` (spec.md §6): records an out-of-band
    /// rate-limit report (e.g. surfaced by a host-side API client) against
    /// the tracker the same way a session's own `rate_limited` event does.
    pub async fn handle_rate_limit_detected(
        &self,
        executable: &str,
        resets_at: chrono::DateTime<Utc>,
    ) {
        let chain = self.resolver.chain().await;
        self.tracker.mark_limited(executable, resets_at, &chain);
    }

    /// `getRateLimitStatus` (spec.md §6).
    pub async fn get_rate_limit_status(&self) -> dispatch_core::RateLimitStatus {
        let chain = self.resolver.chain().await;
        let default_executable = chain.first().cloned().unwrap_or_default();
        self.tracker.status(&chain, &default_executable)
    }

    /// Manual poll entry points (spec.md §6): each runs a single subsystem
    /// immediately, outside the periodic ticker, for hosts that want
    /// fine-grained control (e.g. an admin "run now" button). The two
    /// dispatch polls still honor the rate-limit pause gate (spec.md §8
    /// "Dispatch pause" applies to the method, not just the scheduled
    /// cycle that happens to call it).
    pub async fn poll_worker_availability(&self) -> Result<PollResult, RuntimeError> {
        let now = Utc::now();
        if self.is_dispatch_paused().await {
            return Ok(empty_result(PollType::WorkerAvailability, now));
        }
        let rosters = self.rosters.snapshot().await;
        self.assignment
            .poll_worker_availability(&rosters.workers, now)
            .await
    }

    pub async fn poll_workflow_tasks(&self) -> Result<PollResult, RuntimeError> {
        let now = Utc::now();
        if self.is_dispatch_paused().await {
            return Ok(empty_result(PollType::WorkflowTask, now));
        }
        let rosters = self.rosters.snapshot().await;
        self.workflow.poll(&rosters.merge_stewards, now).await
    }

    pub async fn poll_inboxes(&self) -> Result<PollResult, RuntimeError> {
        let rosters = self.rosters.snapshot().await;
        self.inbox.poll(&rosters.inbox_recipients, Utc::now()).await
    }

    /// Serializes against any other in-flight orphan recovery, including
    /// startup recovery and the copy embedded in `run_cycle` (spec.md §4.12
    /// non-overlap invariant).
    pub async fn recover_orphaned_assignments(&self) -> Result<PollResult, RuntimeError> {
        let _guard = self.cycle_lock.lock().await;
        let rosters = self.rosters.snapshot().await;
        self.orphan
            .recover(&rosters.workers, &rosters.recovery_stewards, &rosters.directors, Utc::now())
            .await
    }

    pub async fn reconcile_closed_unmerged_tasks(&self) -> Result<PollResult, RuntimeError> {
        self.reconciler.poll(Utc::now()).await
    }

    pub async fn poll_plan_auto_complete(&self) -> Result<PollResult, RuntimeError> {
        self.plan_complete.poll(Utc::now()).await
    }

    /// Runs every enabled poll once, in the fixed order (spec.md §4.12),
    /// skipping dispatch polls while the plan is rate-limit paused.
    pub async fn run_cycle(&self) -> Result<Vec<PollResult>, RuntimeError>
    where
        Self: Sized,
    {
        let _guard = self.cycle_lock.lock().await;
        let rosters = self.rosters.snapshot().await;
        let config = self.config();
        let now = Utc::now();
        let paused = self.is_dispatch_paused().await;
        let mut results = Vec::new();

        if config.orphan_recovery_enabled {
            results.push(
                self.run_one(PollType::OrphanRecovery, || {
                    self.orphan.recover(
                        &rosters.workers,
                        &rosters.recovery_stewards,
                        &rosters.directors,
                        now,
                    )
                })
                .await,
            );
        }
        if config.closed_unmerged_reconciliation_enabled {
            results.push(
                self.run_one(PollType::ClosedUnmergedReconciliation, || {
                    self.reconciler.poll(now)
                })
                .await,
            );
        }
        if config.inbox_poll_enabled {
            results.push(
                self.run_one(PollType::Inbox, || self.inbox.poll(&rosters.inbox_recipients, now))
                    .await,
            );
        }
        if config.worker_availability_poll_enabled && !paused {
            results.push(
                self.run_one(PollType::WorkerAvailability, || {
                    self.assignment.poll_worker_availability(&rosters.workers, now)
                })
                .await,
            );
        }
        if config.workflow_task_poll_enabled && !paused {
            results.push(
                self.run_one(PollType::WorkflowTask, || self.workflow.poll(&rosters.merge_stewards, now))
                    .await,
            );
        }
        if config.steward_trigger_poll_enabled {
            // No component in the current design owns this concern; the
            // slot stays enabled-but-empty until one does.
            results.push(empty_result(PollType::StewardTrigger, now));
        }
        if config.plan_auto_complete_enabled {
            results.push(
                self.run_one(PollType::PlanAutoComplete, || self.plan_complete.poll(now))
                    .await,
            );
        }

        Ok(results)
    }

    async fn run_one<F, Fut>(&self, poll_type: PollType, f: F) -> PollResult
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<PollResult, RuntimeError>>,
    {
        info!(poll = ?poll_type, "poll:start");
        let started_at = Utc::now();
        let result = match f().await {
            Ok(result) => result,
            Err(e) => {
                let mut builder = PollResultBuilder::new(poll_type, started_at);
                builder.record_error(e.to_string());
                builder.finish(Utc::now())
            }
        };
        info!(
            poll = ?poll_type,
            processed = result.processed,
            errors = result.errors,
            elapsed = %format_elapsed_ms(result.duration_ms),
            "poll:complete"
        );
        result
    }

    async fn is_dispatch_paused(&self) -> bool {
        let chain = self.resolver.chain().await;
        let default_executable = chain.first().cloned().unwrap_or_default();
        self.tracker.status(&chain, &default_executable).is_paused
    }

    /// Runs startup orphan recovery once, then begins the periodic ticker
    /// at `config.poll_interval_ms` (spec.md §4.12). Returns immediately.
    /// Callers hold the scheduler behind an `Arc` and call
    /// `Arc::clone(&scheduler).start()`.
    pub async fn start(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = scheduler.run_startup_recovery().await {
                debug!(error = %e, "startup orphan recovery failed");
            }
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(
                scheduler.config().poll_interval_ms,
            ));
            interval.tick().await; // first tick fires immediately; already covered by startup recovery
            while scheduler.running.load(Ordering::SeqCst) {
                interval.tick().await;
                if !scheduler.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = scheduler.run_cycle().await {
                    debug!(error = %e, "poll cycle failed");
                }
            }
        });
        *self.task.lock().await = Some(handle);
    }

    async fn run_startup_recovery(&self) -> Result<PollResult, RuntimeError> {
        let _guard = self.cycle_lock.lock().await;
        let rosters = self.rosters.snapshot().await;
        self.orphan
            .recover(&rosters.workers, &rosters.recovery_stewards, &rosters.directors, Utc::now())
            .await
    }

    /// `stop()` (spec.md §5): flips the running flag, cancels the ticker,
    /// and awaits the in-flight cycle.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
    }
}

fn empty_result(poll_type: PollType, now: chrono::DateTime<Utc>) -> PollResult {
    PollResultBuilder::new(poll_type, now).finish(now)
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
