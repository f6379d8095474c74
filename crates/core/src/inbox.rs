// SPDX-License-Identifier: MIT

//! Inbox item types consumed by `InboxPoller`.

use crate::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxSourceType {
    Direct,
    Mention,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    Unread,
    Read,
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxItem {
    pub recipient_id: AgentId,
    pub message_id: String,
    pub channel_id: String,
    pub source_type: InboxSourceType,
    pub status: InboxStatus,
    pub created_at: DateTime<Utc>,
}

impl InboxItem {
    /// Key used by the in-memory "already forwarding" guard set
    /// (spec.md §4.11).
    pub fn forwarding_key(&self) -> String {
        format!("{}:{}", self.recipient_id.as_str(), self.message_id)
    }
}

#[cfg(test)]
#[path = "inbox_tests.rs"]
mod tests;
