// SPDX-License-Identifier: MIT

//! Agent identity and role types.
//!
//! An agent is a named entity that can own a session: a worker that
//! executes tasks, a steward that merges or recovers them, a director that
//! receives escalations, or a human/system account that only appears as an
//! inbox recipient.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an agent.
    pub struct AgentId;
}

/// What kind of entity an agent is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Worker,
    Steward,
    Director,
    System,
    Human,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
}

/// Whether a worker is recycled after each task (`Ephemeral`) or kept
/// running across assignments (`Persistent`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    Ephemeral,
    Persistent,
}

/// What a steward-role agent specializes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StewardFocus {
    Merge,
    Recovery,
    Triage,
}

/// A named entity that can be assigned a task and own a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub entity_type: EntityType,
    pub status: AgentStatus,
    /// Set only when `entity_type == Worker`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_mode: Option<WorkerMode>,
    /// Set only when `entity_type == Steward`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steward_focus: Option<StewardFocus>,
    /// How many tasks this agent may be assignee of at once.
    pub max_concurrent_tasks: u32,
    /// The executable this agent prefers, before fallback resolution.
    pub preferred_executable: String,
}

impl Agent {
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    pub fn is_worker(&self) -> bool {
        self.entity_type == EntityType::Worker
    }

    pub fn is_steward(&self) -> bool {
        self.entity_type == EntityType::Steward
    }

    pub fn has_focus(&self, focus: StewardFocus) -> bool {
        self.is_steward() && self.steward_focus == Some(focus)
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
