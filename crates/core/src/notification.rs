// SPDX-License-Identifier: MIT

//! `daemon:notification` payloads (spec.md §4.6, §6). The daemon never sends
//! these itself; `NotificationSink` in `dispatch_adapters` is the narrow
//! capability that delivers them.

use crate::agent::AgentId;
use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Escalation,
}

/// Emitted when the recovery hierarchy can no longer make progress on a
/// task without a human (spec.md §4.6 Phase 3 escalation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub task_id: TaskId,
    pub director_id: AgentId,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "notification_tests.rs"]
mod tests;
