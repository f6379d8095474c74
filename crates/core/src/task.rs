// SPDX-License-Identifier: MIT

//! Task state machine and the orchestrator's private per-task metadata.

use crate::agent::AgentId;
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    pub struct TaskId;
}

/// Task lifecycle state (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Review,
    Closed,
    Deferred,
    Tombstone,
}

impl TaskStatus {
    /// `Deferred` and `Tombstone` are terminal for the core's purposes and
    /// are filtered out of every dispatch query.
    pub fn is_dispatchable(self) -> bool {
        !matches!(self, TaskStatus::Deferred | TaskStatus::Tombstone)
    }
}

/// Where a task's worktree stands relative to the trunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    Pending,
    Testing,
    Merged,
    Failed,
    Conflict,
    TestFailed,
}

impl MergeStatus {
    /// A task whose merge already failed/succeeded/conflicted should not be
    /// re-dispatched or "recovered" as if it were still in flight.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MergeStatus::Merged
                | MergeStatus::Failed
                | MergeStatus::Conflict
                | MergeStatus::TestFailed
        )
    }
}

/// Which kind of agent ran a session, for escalation-pattern detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Worker,
    Steward,
    Director,
    System,
    Human,
    Agent,
}

/// One entry in a task's append-only session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHistoryEntry {
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub agent_role: AgentRole,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionHistoryEntry {
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// The daemon's private per-task state (spec.md §3, `metadata.orchestrator`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub resume_count: u32,
    #[serde(default)]
    pub steward_recovery_count: u32,
    #[serde(default)]
    pub reconciliation_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_status: Option<MergeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_failure_reason: Option<String>,
    #[serde(default)]
    pub session_history: Vec<SessionHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_worktree: Option<String>,
}

impl OrchestratorMeta {
    /// Append a new session-history entry, first closing out whichever
    /// entry is still running. A task only ever has one live session at a
    /// time, so this keeps the append-only log consistent across resumes.
    pub fn push_session(&mut self, entry: SessionHistoryEntry, now: DateTime<Utc>) {
        if let Some(running) = self.session_history.iter_mut().find(|e| e.is_running()) {
            running.ended_at = Some(now);
        }
        self.session_history.push(entry);
    }

    /// Count of `session_history` entries run by an agent with the given role.
    pub fn history_count_for_role(&self, role: AgentRole) -> usize {
        self.session_history
            .iter()
            .filter(|e| e.agent_role == role)
            .count()
    }

    /// True when the last `n` history entries are all within `gap` of each
    /// other and none of them ever ended — the signature of a provider
    /// outage killing sessions the instant they start (spec.md §4.6).
    pub fn has_rapid_exit_pattern(&self, n: usize, gap: chrono::Duration) -> bool {
        if self.session_history.len() < n {
            return false;
        }
        let tail = &self.session_history[self.session_history.len() - n..];
        if tail.iter().any(|e| !e.is_running()) {
            return false;
        }
        tail.windows(2)
            .all(|w| (w[1].started_at - w[0].started_at).abs() <= gap)
    }
}

/// A task stored in the durable element store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    /// 1 (lowest) to 5 (highest).
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<AgentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub orchestrator: OrchestratorMeta,
}

impl Task {
    /// Assign this task to `agent`, keeping `assignee` and
    /// `metadata.orchestrator.assigned_agent` in lockstep (spec.md §3
    /// invariant).
    pub fn assign(&mut self, agent: AgentId) {
        self.orchestrator.assigned_agent = Some(agent.clone());
        self.assignee = Some(agent);
    }

    /// Clear the assignment on both sides of the invariant.
    pub fn clear_assignment(&mut self) {
        self.orchestrator.assigned_agent = None;
        self.assignee = None;
    }

    pub fn is_unassigned(&self) -> bool {
        self.assignee.is_none() && self.orchestrator.assigned_agent.is_none()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
