// SPDX-License-Identifier: MIT

//! `OrphanRecovery` — three-phase recovery for tasks whose assignee has no
//! active session (spec.md §4.6), plus the atomic worker-to-steward
//! transfer protocol (spec.md §4.7). One struct because all three phases
//! share the same collaborators and run in a fixed order within one poll.

use crate::config::DispatchConfig;
use crate::error::RuntimeError;
use crate::executable_resolver::ExecutableResolver;
use chrono::Utc;
use dispatch_adapters::{
    CreateWorktreeOpts, ElementApi, NotificationSink, ResumeSessionOpts, SessionManager,
    SettingsService, StartSessionOpts, TaskFilter, WorktreeManager,
};
use dispatch_core::{
    Agent, AgentRole, MergeStatus, Notification, NotificationKind, PollResult, PollResultBuilder,
    PollType, ResolvedExecutable, SessionHistoryEntry, StewardFocus, Task, TaskStatus,
};
use tracing::{info, warn};

pub struct OrphanRecovery<E, SM, WT, ST, N>
where
    E: ElementApi,
    SM: SessionManager,
    WT: WorktreeManager,
    ST: SettingsService,
    N: NotificationSink,
{
    elements: E,
    sessions: SM,
    worktrees: WT,
    resolver: ExecutableResolver<ST>,
    notifications: N,
    config: DispatchConfig,
}

impl<E, SM, WT, ST, N> OrphanRecovery<E, SM, WT, ST, N>
where
    E: ElementApi,
    SM: SessionManager,
    WT: WorktreeManager,
    ST: SettingsService,
    N: NotificationSink,
{
    pub fn new(
        elements: E,
        sessions: SM,
        worktrees: WT,
        resolver: ExecutableResolver<ST>,
        notifications: N,
        config: DispatchConfig,
    ) -> Self {
        Self {
            elements,
            sessions,
            worktrees,
            resolver,
            notifications,
            config,
        }
    }

    /// Runs all three phases in order (spec.md §4.6). `workers` and
    /// `recovery_stewards` are the active agents of those kinds;
    /// `directors` are candidates for escalation notifications. The
    /// engine does not query agents itself (`ElementApi` is scoped to
    /// tasks/plans), so callers supply the rosters each cycle.
    pub async fn recover(
        &self,
        workers: &[Agent],
        recovery_stewards: &[Agent],
        directors: &[Agent],
        now: chrono::DateTime<Utc>,
    ) -> Result<PollResult, RuntimeError> {
        let mut builder = PollResultBuilder::new(PollType::OrphanRecovery, now);
        self.recover_stuck_workers(workers, recovery_stewards, now, &mut builder)
            .await?;
        self.recover_orphaned_stewards(now, &mut builder).await?;
        self.recover_orphaned_recovery_stewards(recovery_stewards, directors, now, &mut builder)
            .await?;
        Ok(builder.finish(Utc::now()))
    }

    /// Phase 1: tasks assigned to a worker with no active session.
    pub async fn recover_stuck_workers(
        &self,
        workers: &[Agent],
        recovery_stewards: &[Agent],
        now: chrono::DateTime<Utc>,
        builder: &mut PollResultBuilder,
    ) -> Result<(), RuntimeError> {
        let tasks = self.elements.list_tasks(TaskFilter::default()).await?;
        for task in tasks {
            if !matches!(task.status, TaskStatus::Open | TaskStatus::InProgress) {
                continue;
            }
            let Some(assigned) = task.orchestrator.assigned_agent.clone() else {
                continue;
            };
            let Some(worker) = workers.iter().find(|a| a.id == assigned) else {
                continue;
            };
            if self.sessions.get_active_session(&worker.id).await?.is_some() {
                continue;
            }

            if self.resolver.resolve(worker).await == ResolvedExecutable::AllLimited {
                // The outage is the cause of the orphan, not a reason to
                // escalate; leave it for the next cycle.
                continue;
            }

            if task.orchestrator.resume_count < self.config.max_resume_attempts_before_recovery {
                self.resume_or_respawn_worker(worker, &task, now, builder)
                    .await?;
            } else {
                self.delegate_to_recovery_steward(worker, &task, recovery_stewards, now, builder)
                    .await?;
            }
        }
        Ok(())
    }

    async fn resume_or_respawn_worker(
        &self,
        worker: &Agent,
        task: &Task,
        now: chrono::DateTime<Utc>,
        builder: &mut PollResultBuilder,
    ) -> Result<(), RuntimeError> {
        let spawn_outcome = if let Some(stale_session_id) = &task.orchestrator.session_id {
            match self
                .sessions
                .resume_session(
                    &worker.id,
                    ResumeSessionOpts {
                        provider_session_id: stale_session_id.as_str().to_string(),
                        check_ready_queue: false,
                    },
                )
                .await
            {
                Ok((handle, _events)) => Ok((handle, None)),
                Err(_) => {
                    // Stale resume (spec.md §7 item 2): clear it and fall
                    // back to a fresh spawn.
                    self.spawn_fresh_worker(worker, task).await
                }
            }
        } else {
            self.spawn_fresh_worker(worker, task).await
        };

        let (handle, worktree_path) = match spawn_outcome {
            Ok(pair) => pair,
            Err(e) => {
                builder.record_error(e.to_string());
                return Ok(());
            }
        };

        let worker_id = worker.id.clone();
        let worker_name = worker.name.clone();
        let session_id = handle.id.clone();
        let history_entry = SessionHistoryEntry {
            session_id: session_id.clone(),
            agent_id: worker_id.clone(),
            agent_name: worker_name,
            agent_role: AgentRole::Worker,
            started_at: now,
            ended_at: None,
        };
        let write_result = self
            .elements
            .update_task(
                &task.id,
                Box::new(move |t| {
                    t.orchestrator.session_id = Some(session_id);
                    if let Some(path) = worktree_path {
                        t.orchestrator.worktree = Some(path);
                    }
                    t.orchestrator.resume_count += 1;
                    t.orchestrator.push_session(history_entry, now);
                }),
            )
            .await;

        match write_result {
            Ok(_) => {
                builder.record_processed();
            }
            Err(e) => {
                let _ = self.sessions.stop_session(&worker_id).await;
                builder.record_error(e.to_string());
            }
        }
        Ok(())
    }

    /// Spawns a fresh session for `worker`, reusing the recorded worktree
    /// if it still exists and creating a new one otherwise. Returns the
    /// worktree path only when it changed, so the caller can decide
    /// whether to overwrite `metadata.orchestrator.worktree`.
    async fn spawn_fresh_worker(
        &self,
        worker: &Agent,
        task: &Task,
    ) -> Result<(dispatch_adapters::SessionHandle, Option<String>), RuntimeError> {
        let (working_directory, new_path) = match &task.orchestrator.worktree {
            Some(path) if self.worktrees.worktree_exists(path).await? => (path.clone(), None),
            _ => {
                let created = self
                    .worktrees
                    .create_worktree(CreateWorktreeOpts {
                        agent_id: worker.id.clone(),
                        task_id: task.id.clone(),
                    })
                    .await?;
                (created.path.clone(), Some(created.path))
            }
        };

        let (handle, _events) = self
            .sessions
            .start_session(
                &worker.id,
                StartSessionOpts {
                    working_directory: Some(working_directory),
                    interactive: true,
                },
            )
            .await?;
        Ok((handle, new_path))
    }

    /// Section 4.7: atomic worker-to-steward transfer, delegated to when a
    /// worker has exhausted its resume budget.
    async fn delegate_to_recovery_steward(
        &self,
        worker: &Agent,
        task: &Task,
        recovery_stewards: &[Agent],
        now: chrono::DateTime<Utc>,
        builder: &mut PollResultBuilder,
    ) -> Result<(), RuntimeError> {
        if task.orchestrator.has_rapid_exit_pattern(
            self.config.rate_limit_session_pattern_count,
            self.config.rate_limit_session_gap(),
        ) {
            // No steward will help with an upstream outage; wait it out.
            return Ok(());
        }

        let mut free_steward = None;
        for candidate in recovery_stewards {
            if !candidate.has_focus(StewardFocus::Recovery) || !candidate.is_active() {
                continue;
            }
            let assigned = self
                .elements
                .list_tasks(TaskFilter {
                    assignee: Some(candidate.id.clone()),
                    ..Default::default()
                })
                .await?;
            if assigned.is_empty() {
                free_steward = Some(candidate);
                break;
            }
        }
        let Some(steward) = free_steward else {
            // No free recovery steward this cycle; safe to retry later.
            return Ok(());
        };

        let handle = match self
            .sessions
            .start_session(
                &steward.id,
                StartSessionOpts {
                    working_directory: task.orchestrator.worktree.clone(),
                    interactive: false,
                },
            )
            .await
        {
            Ok((handle, _events)) => handle,
            Err(e) => {
                builder.record_error(e.to_string());
                return Ok(());
            }
        };

        let steward_id = steward.id.clone();
        let steward_name = steward.name.clone();
        let session_id = handle.id.clone();
        let history_entry = SessionHistoryEntry {
            session_id: session_id.clone(),
            agent_id: steward_id.clone(),
            agent_name: steward_name,
            agent_role: AgentRole::Steward,
            started_at: now,
            ended_at: None,
        };
        let write_result = self
            .elements
            .update_task(
                &task.id,
                Box::new(move |t| {
                    t.assign(steward_id);
                    t.orchestrator.session_id = Some(session_id);
                    t.orchestrator.push_session(history_entry, now);
                }),
            )
            .await;

        match write_result {
            Ok(_) => {
                info!(worker = %worker.id, steward = %steward.id, task = %task.id, "transferred to recovery steward");
                builder.record_processed();
            }
            Err(e) => {
                let _ = self.sessions.stop_session(&steward.id).await;
                builder.record_error(e.to_string());
            }
        }
        Ok(())
    }

    /// Phase 2: `REVIEW` tasks assigned to a merge steward with no active
    /// session.
    pub async fn recover_orphaned_stewards(
        &self,
        now: chrono::DateTime<Utc>,
        builder: &mut PollResultBuilder,
    ) -> Result<(), RuntimeError> {
        let tasks = self
            .elements
            .list_tasks(TaskFilter {
                status: Some(TaskStatus::Review),
                ..Default::default()
            })
            .await?;

        for task in tasks {
            let Some(steward_id) = task.orchestrator.assigned_agent.clone() else {
                continue;
            };
            if let Some(status) = task.orchestrator.merge_status {
                if status.is_terminal() {
                    continue;
                }
            }
            if self
                .sessions
                .get_active_session(&steward_id)
                .await?
                .is_some()
            {
                continue;
            }

            let new_count = task.orchestrator.steward_recovery_count + 1;
            if new_count >= self.config.max_steward_recoveries {
                let reason = format!(
                    "Steward recovery limit reached ({})",
                    self.config.max_steward_recoveries
                );
                self.elements
                    .update_task(
                        &task.id,
                        Box::new(move |t| {
                            t.orchestrator.steward_recovery_count = new_count;
                            t.orchestrator.merge_status = Some(MergeStatus::Failed);
                            t.orchestrator.merge_failure_reason = Some(reason);
                            t.clear_assignment();
                        }),
                    )
                    .await?;
                builder.record_processed();
                continue;
            }

            let spawn_result = self
                .sessions
                .start_session(
                    &steward_id,
                    StartSessionOpts {
                        working_directory: task.orchestrator.worktree.clone(),
                        interactive: false,
                    },
                )
                .await;
            let handle = match spawn_result {
                Ok((handle, _events)) => handle,
                Err(e) => {
                    builder.record_error(e.to_string());
                    continue;
                }
            };

            let session_id = handle.id.clone();
            let history_entry = SessionHistoryEntry {
                session_id: session_id.clone(),
                agent_id: steward_id.clone(),
                agent_name: String::new(),
                agent_role: AgentRole::Steward,
                started_at: now,
                ended_at: None,
            };
            let write_result = self
                .elements
                .update_task(
                    &task.id,
                    Box::new(move |t| {
                        t.orchestrator.session_id = Some(session_id);
                        t.orchestrator.steward_recovery_count = new_count;
                        t.orchestrator.push_session(history_entry, now);
                    }),
                )
                .await;
            match write_result {
                Ok(_) => builder.record_processed(),
                Err(e) => {
                    let _ = self.sessions.stop_session(&steward_id).await;
                    builder.record_error(e.to_string());
                }
            }
        }
        Ok(())
    }

    /// Phase 3: tasks left assigned to a recovery steward with no active
    /// session. Normally unassigned and given a clean `resumeCount`;
    /// escalated to a director instead once the recovery hierarchy itself
    /// has cycled through enough stewards.
    pub async fn recover_orphaned_recovery_stewards(
        &self,
        recovery_stewards: &[Agent],
        directors: &[Agent],
        now: chrono::DateTime<Utc>,
        builder: &mut PollResultBuilder,
    ) -> Result<(), RuntimeError> {
        let tasks = self.elements.list_tasks(TaskFilter::default()).await?;

        for task in tasks {
            let Some(assigned) = task.orchestrator.assigned_agent.clone() else {
                continue;
            };
            let is_recovery_steward = recovery_stewards
                .iter()
                .any(|s| s.id == assigned && s.has_focus(StewardFocus::Recovery));
            if !is_recovery_steward {
                continue;
            }
            if self.sessions.get_active_session(&assigned).await?.is_some() {
                continue;
            }

            let escalate = task
                .orchestrator
                .history_count_for_role(AgentRole::Steward)
                >= self.config.escalation_steward_threshold;

            if escalate {
                if let Some(director) = directors.iter().find(|a| a.is_active()) {
                    self.notifications
                        .notify(Notification {
                            kind: NotificationKind::Escalation,
                            task_id: task.id.clone(),
                            director_id: director.id.clone(),
                            message: format!(
                                "task {} exhausted the recovery hierarchy ({} steward sessions)",
                                task.id,
                                task.orchestrator.history_count_for_role(AgentRole::Steward)
                            ),
                            created_at: now,
                        })
                        .await?;
                } else {
                    warn!(task = %task.id, "escalation triggered but no director available");
                }
                builder.record_processed();
                continue;
            }

            self.elements
                .update_task(
                    &task.id,
                    Box::new(|t| {
                        t.clear_assignment();
                        t.orchestrator.resume_count = 0;
                    }),
                )
                .await?;
            builder.record_processed();
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "orphan_tests.rs"]
mod tests;
