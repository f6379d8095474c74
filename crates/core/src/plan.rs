// SPDX-License-Identifier: MIT

//! Plans group tasks; the daemon only ever auto-completes them.

use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    pub struct PlanId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub status: PlanStatus,
    pub child_task_ids: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Plan {
    pub fn has_children(&self) -> bool {
        !self.child_task_ids.is_empty()
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
