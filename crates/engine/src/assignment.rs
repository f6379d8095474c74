// SPDX-License-Identifier: MIT

//! `AssignmentEngine` — matches ready tasks to idle agents (spec.md §4.4),
//! plus the rapid-exit detector attached to every spawned session
//! (spec.md §4.5). Both live in one module because the detector only ever
//! runs in reaction to a session this engine started.

use crate::config::DispatchConfig;
use crate::error::RuntimeError;
use crate::executable_resolver::ExecutableResolver;
use crate::rate_limit::RateLimitTracker;
use chrono::Utc;
use dispatch_adapters::{
    CreateWorktreeOpts, ElementApi, SessionEvent, SessionManager, SettingsService,
    StartSessionOpts, WorktreeManager,
};
use dispatch_adapters::TaskFilter;
use dispatch_core::{
    Agent, AgentRole, PollResult, PollResultBuilder, PollType, ResolvedExecutable,
    SessionHistoryEntry, Task, TaskId, TaskStatus,
};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Watches one session's event channel from the moment `start_session`
/// returns until `exit`, classifying the exit per spec.md §4.5. Spawned as
/// a detached task immediately after dispatch, so attachment is
/// synchronous with `start_session` returning — the structural fix §9
/// calls for, since `SessionEvents` is the channel itself rather than a
/// callback registered later.
#[derive(Clone)]
pub struct RapidExitDetector<E: ElementApi> {
    elements: E,
    tracker: Arc<RateLimitTracker>,
    config: DispatchConfig,
}

impl<E: ElementApi> RapidExitDetector<E> {
    pub fn new(elements: E, tracker: Arc<RateLimitTracker>, config: DispatchConfig) -> Self {
        Self {
            elements,
            tracker,
            config,
        }
    }

    /// Drain `events` until `exit`, then apply the classification in
    /// spec.md §4.5. Spawned as a detached task per started session.
    pub async fn watch(
        self: Arc<Self>,
        agent: Agent,
        task_id: TaskId,
        started_at: chrono::DateTime<Utc>,
        mut events: dispatch_adapters::SessionEvents,
        chain: dispatch_core::FallbackChain,
    ) {
        let patterns: Vec<Regex> = self
            .config
            .rate_limit_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        let mut saw_assistant = false;
        let mut last_assistant_message: Option<String> = None;
        let mut exit_info = None;

        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Assistant { message } => {
                    saw_assistant = true;
                    last_assistant_message = Some(message);
                }
                SessionEvent::RateLimited {
                    executable_path,
                    resets_at,
                    ..
                } => {
                    self.tracker.mark_limited(
                        &executable_path,
                        resets_at.unwrap_or_else(|| {
                            Utc::now() + self.config.rapid_exit_fallback_reset()
                        }),
                        &chain,
                    );
                }
                SessionEvent::Exit { code, signal } => {
                    exit_info = Some((code, signal));
                    break;
                }
            }
        }

        let Some(_exit_info) = exit_info else {
            return;
        };
        let elapsed = Utc::now() - started_at;
        let is_rapid = elapsed < self.config.rapid_exit_threshold();

        if is_rapid && !saw_assistant {
            self.rollback_resume_count(&task_id).await;
            self.tracker.mark_limited(
                &agent.preferred_executable,
                Utc::now() + self.config.rapid_exit_fallback_reset(),
                &chain,
            );
            warn!(agent = %agent.id, task = %task_id, "silent rapid-exit classified");
            return;
        }

        if is_rapid {
            if let Some(message) = &last_assistant_message {
                if patterns.iter().any(|re| re.is_match(message)) {
                    self.rollback_resume_count(&task_id).await;
                    self.tracker.mark_limited(
                        &agent.preferred_executable,
                        Utc::now() + self.config.rapid_exit_fallback_reset(),
                        &chain,
                    );
                    warn!(agent = %agent.id, task = %task_id, "rate-limited exit classified");
                }
            }
        }
    }

    async fn rollback_resume_count(&self, task_id: &TaskId) {
        let _ = self
            .elements
            .update_task(
                task_id,
                Box::new(|t| {
                    t.orchestrator.resume_count = t.orchestrator.resume_count.saturating_sub(1);
                }),
            )
            .await;
    }
}

pub struct AssignmentEngine<E, SM, WT, ST>
where
    E: ElementApi,
    SM: SessionManager,
    WT: WorktreeManager,
    ST: SettingsService,
{
    elements: E,
    sessions: SM,
    worktrees: WT,
    resolver: ExecutableResolver<ST>,
    detector: Arc<RapidExitDetector<E>>,
}

impl<E, SM, WT, ST> AssignmentEngine<E, SM, WT, ST>
where
    E: ElementApi,
    SM: SessionManager,
    WT: WorktreeManager,
    ST: SettingsService,
{
    pub fn new(
        elements: E,
        sessions: SM,
        worktrees: WT,
        resolver: ExecutableResolver<ST>,
        detector: Arc<RapidExitDetector<E>>,
    ) -> Self {
        Self {
            elements,
            sessions,
            worktrees,
            resolver,
            detector,
        }
    }

    /// `pollWorkerAvailability` (spec.md §4.4). `workers` are the active
    /// `entity_type=worker` agents, ordered stably (caller decides the
    /// order — the engine does not query agents itself since `ElementApi`
    /// is scoped to tasks/plans).
    pub async fn poll_worker_availability(
        &self,
        workers: &[Agent],
        now: chrono::DateTime<Utc>,
    ) -> Result<PollResult, RuntimeError> {
        let mut builder = PollResultBuilder::new(PollType::WorkerAvailability, now);

        let ready_tasks = self.elements.list_tasks(TaskFilter::default()).await?;
        let mut ready_tasks: Vec<Task> = ready_tasks
            .into_iter()
            .filter(|t| t.status == TaskStatus::Open)
            .filter(|t| t.is_unassigned())
            .filter(|t| t.scheduled_for.map_or(true, |s| s <= now))
            .filter(|t| t.depends_on.is_empty())
            .collect();
        ready_tasks.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.as_str().cmp(b.id.as_str()))
        });

        for worker in workers {
            match self
                .dispatch_one(worker, &mut ready_tasks, &mut builder)
                .await
            {
                Ok(_) | Err(DispatchOutcome::NoEligibleTask) | Err(DispatchOutcome::AllLimited) => {}
                Err(DispatchOutcome::Error(message)) => builder.record_error(message),
            }
        }

        Ok(builder.finish(Utc::now()))
    }

    async fn dispatch_one(
        &self,
        worker: &Agent,
        ready_tasks: &mut Vec<Task>,
        builder: &mut PollResultBuilder,
    ) -> Result<(), DispatchOutcome> {
        if self
            .sessions
            .get_active_session(&worker.id)
            .await
            .map_err(|e| DispatchOutcome::Error(e.to_string()))?
            .is_some()
        {
            return Err(DispatchOutcome::NoEligibleTask);
        }

        let resolved = self.resolver.resolve(worker).await;
        let executable = match resolved {
            ResolvedExecutable::AllLimited => return Err(DispatchOutcome::AllLimited),
            ResolvedExecutable::Use(exe) => exe,
        };
        debug!(worker = %worker.id, executable, "resolved executable");

        if ready_tasks.is_empty() {
            return Err(DispatchOutcome::NoEligibleTask);
        }
        let task = ready_tasks.remove(0);

        let worktree = self
            .resolve_worktree(worker, &task)
            .await
            .map_err(|e| DispatchOutcome::Error(e.to_string()))?;

        let patch_worker = worker.id.clone();
        let patch_branch = worktree.branch.clone();
        let patch_path = worktree.path.clone();
        self.elements
            .update_task(
                &task.id,
                Box::new(move |t| {
                    t.status = TaskStatus::InProgress;
                    t.assign(patch_worker);
                    t.orchestrator.branch = Some(patch_branch);
                    t.orchestrator.worktree = Some(patch_path);
                }),
            )
            .await
            .map_err(|e| DispatchOutcome::Error(e.to_string()))?;

        let start_result = self
            .sessions
            .start_session(
                &worker.id,
                StartSessionOpts {
                    working_directory: Some(worktree.path.clone()),
                    interactive: true,
                },
            )
            .await;

        let (handle, events) = match start_result {
            Ok(pair) => pair,
            Err(e) => {
                builder.record_error(e.to_string());
                return Ok(());
            }
        };

        // Attach the rapid-exit detector before any other await (spec.md
        // §4.4 step 8): `events` is the channel itself, already receiving,
        // so there is no scheduling gap for the provider to race.
        let chain = self.resolver.chain().await;
        tokio::spawn(
            self.detector
                .clone()
                .watch(worker.clone(), task.id.clone(), Utc::now(), events, chain),
        );

        let session_id = handle.id.clone();
        let history_entry = SessionHistoryEntry {
            session_id: session_id.clone(),
            agent_id: worker.id.clone(),
            agent_name: worker.name.clone(),
            agent_role: AgentRole::Worker,
            started_at: Utc::now(),
            ended_at: None,
        };
        let now = Utc::now();
        let write_result = self
            .elements
            .update_task(
                &task.id,
                Box::new(move |t| {
                    t.orchestrator.session_id = Some(session_id);
                    t.orchestrator.push_session(history_entry, now);
                }),
            )
            .await;

        if write_result.is_err() {
            let _ = self.sessions.stop_session(&worker.id).await;
            builder.record_error("metadata write failed after session start; session stopped");
            return Ok(());
        }

        info!(worker = %worker.id, task = %task.id, "dispatched worker");
        builder.record_processed();
        Ok(())
    }

    async fn resolve_worktree(
        &self,
        worker: &Agent,
        task: &Task,
    ) -> Result<dispatch_adapters::WorktreeInfo, RuntimeError> {
        if let Some(handoff) = &task.orchestrator.handoff_worktree {
            if self.worktrees.worktree_exists(handoff).await? {
                let branch = task
                    .orchestrator
                    .handoff_branch
                    .clone()
                    .unwrap_or_else(|| format!("task/{}", task.id.as_str()));
                return Ok(dispatch_adapters::WorktreeInfo {
                    path: handoff.clone(),
                    branch,
                });
            }
        }
        Ok(self
            .worktrees
            .create_worktree(CreateWorktreeOpts {
                agent_id: worker.id.clone(),
                task_id: task.id.clone(),
            })
            .await?)
    }
}

enum DispatchOutcome {
    NoEligibleTask,
    AllLimited,
    Error(String),
}

#[cfg(test)]
#[path = "assignment_tests.rs"]
mod tests;
