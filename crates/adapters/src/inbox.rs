// SPDX-License-Identifier: MIT

//! `InboxService` — the message queue `InboxPoller` drains (spec.md §4.11,
//! §6).

use async_trait::async_trait;
use dispatch_core::{AgentId, InboxItem, InboxStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("item not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Default)]
pub struct InboxFilter {
    pub status: Option<InboxStatus>,
}

#[async_trait]
pub trait InboxService: Clone + Send + Sync + 'static {
    async fn get_inbox(
        &self,
        recipient_id: &AgentId,
        filter: InboxFilter,
    ) -> Result<Vec<InboxItem>, InboxError>;

    async fn add_to_inbox(&self, item: InboxItem) -> Result<(), InboxError>;

    async fn mark_status(
        &self,
        recipient_id: &AgentId,
        message_id: &str,
        status: InboxStatus,
    ) -> Result<(), InboxError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FakeInboxState {
        items: Vec<InboxItem>,
    }

    #[derive(Clone)]
    pub struct FakeInboxService {
        inner: Arc<Mutex<FakeInboxState>>,
    }

    impl Default for FakeInboxService {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeInboxState { items: Vec::new() })),
            }
        }
    }

    impl FakeInboxService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, item: InboxItem) {
            self.inner.lock().items.push(item);
        }

        pub fn all(&self) -> Vec<InboxItem> {
            self.inner.lock().items.clone()
        }
    }

    #[async_trait]
    impl InboxService for FakeInboxService {
        async fn get_inbox(
            &self,
            recipient_id: &AgentId,
            filter: InboxFilter,
        ) -> Result<Vec<InboxItem>, InboxError> {
            let inner = self.inner.lock();
            Ok(inner
                .items
                .iter()
                .filter(|i| &i.recipient_id == recipient_id)
                .filter(|i| filter.status.map_or(true, |s| i.status == s))
                .cloned()
                .collect())
        }

        async fn add_to_inbox(&self, item: InboxItem) -> Result<(), InboxError> {
            self.inner.lock().items.push(item);
            Ok(())
        }

        async fn mark_status(
            &self,
            recipient_id: &AgentId,
            message_id: &str,
            status: InboxStatus,
        ) -> Result<(), InboxError> {
            let mut inner = self.inner.lock();
            let item = inner
                .items
                .iter_mut()
                .find(|i| &i.recipient_id == recipient_id && i.message_id == message_id)
                .ok_or_else(|| InboxError::NotFound(message_id.to_string()))?;
            item.status = status;
            Ok(())
        }
    }

    #[cfg(test)]
    #[path = "inbox_tests.rs"]
    mod tests;
}
