// SPDX-License-Identifier: MIT

use super::*;
use crate::agent::AgentId;

#[test]
fn forwarding_key_combines_recipient_and_message() {
    let item = InboxItem {
        recipient_id: AgentId::new("agent-1"),
        message_id: "msg-42".to_string(),
        channel_id: "chan-1".to_string(),
        source_type: InboxSourceType::Direct,
        status: InboxStatus::Unread,
        created_at: chrono::Utc::now(),
    };
    assert_eq!(item.forwarding_key(), "agent-1:msg-42");
}
