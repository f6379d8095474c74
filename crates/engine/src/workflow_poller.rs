// SPDX-License-Identifier: MIT

//! `WorkflowPoller` — dispatches `REVIEW` tasks to a free merge steward
//! (spec.md §4.8). The counterpart to `AssignmentEngine` for the merge
//! side of the pipeline: same shape, different roster and status filter.

use crate::error::RuntimeError;
use chrono::Utc;
use dispatch_adapters::{ElementApi, SessionManager, StartSessionOpts, TaskFilter};
use dispatch_core::{
    Agent, AgentRole, MergeStatus, PollResult, PollResultBuilder, PollType, SessionHistoryEntry,
    StewardFocus, Task, TaskStatus,
};
use tracing::info;

pub struct WorkflowPoller<E, SM>
where
    E: ElementApi,
    SM: SessionManager,
{
    elements: E,
    sessions: SM,
}

impl<E, SM> WorkflowPoller<E, SM>
where
    E: ElementApi,
    SM: SessionManager,
{
    pub fn new(elements: E, sessions: SM) -> Self {
        Self { elements, sessions }
    }

    /// `workflowTaskPoll` (spec.md §4.8). `merge_stewards` are the active
    /// `entity_type=steward, stewardFocus=merge` agents.
    pub async fn poll(
        &self,
        merge_stewards: &[Agent],
        now: chrono::DateTime<Utc>,
    ) -> Result<PollResult, RuntimeError> {
        let mut builder = PollResultBuilder::new(PollType::WorkflowTask, now);

        let mut candidates: Vec<Task> = self
            .elements
            .list_tasks(TaskFilter {
                status: Some(TaskStatus::Review),
                ..Default::default()
            })
            .await?
            .into_iter()
            .filter(|t| t.orchestrator.worktree.is_some())
            .filter(|t| {
                t.orchestrator
                    .merge_status
                    .map_or(true, |s| s == MergeStatus::Pending)
            })
            .filter(|t| t.is_unassigned())
            .collect();
        candidates.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.as_str().cmp(b.id.as_str()))
        });

        for task in candidates {
            let Some(steward) = self.free_merge_steward(merge_stewards).await? else {
                break;
            };
            match self.dispatch_to_steward(&steward, &task, now).await {
                Ok(()) => builder.record_processed(),
                Err(e) => builder.record_error(e.to_string()),
            }
        }

        Ok(builder.finish(Utc::now()))
    }

    async fn free_merge_steward(&self, stewards: &[Agent]) -> Result<Option<Agent>, RuntimeError> {
        for candidate in stewards {
            if !candidate.has_focus(StewardFocus::Merge) || !candidate.is_active() {
                continue;
            }
            if self
                .sessions
                .get_active_session(&candidate.id)
                .await?
                .is_some()
            {
                continue;
            }
            return Ok(Some(candidate.clone()));
        }
        Ok(None)
    }

    async fn dispatch_to_steward(
        &self,
        steward: &Agent,
        task: &Task,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), RuntimeError> {
        let (handle, _events) = self
            .sessions
            .start_session(
                &steward.id,
                StartSessionOpts {
                    working_directory: task.orchestrator.worktree.clone(),
                    interactive: false,
                },
            )
            .await?;

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
                    t.orchestrator.merge_status = Some(MergeStatus::Testing);
                    t.orchestrator.push_session(history_entry, now);
                }),
            )
            .await;

        if let Err(e) = write_result {
            let _ = self.sessions.stop_session(&steward.id).await;
            return Err(e.into());
        }

        info!(steward = %steward.id, task = %task.id, "dispatched to merge steward");
        Ok(())
    }
}

#[cfg(test)]
#[path = "workflow_poller_tests.rs"]
mod tests;
