// SPDX-License-Identifier: MIT

//! `NotificationSink` — delivers `daemon:notification` payloads (spec.md
//! §4.6, §6) to whatever channel a human watches. The daemon only knows it
//! can send one; desktop alerts, webhooks, etc. are external collaborators.

use async_trait::async_trait;
use dispatch_core::Notification;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

#[async_trait]
pub trait NotificationSink: Clone + Send + Sync + 'static {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FakeNotificationState {
        calls: Vec<Notification>,
    }

    /// Records every notification sent, for assertions on escalation tests.
    #[derive(Clone)]
    pub struct FakeNotificationSink {
        inner: Arc<Mutex<FakeNotificationState>>,
    }

    impl Default for FakeNotificationSink {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeNotificationState { calls: Vec::new() })),
            }
        }
    }

    impl FakeNotificationSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<Notification> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl NotificationSink for FakeNotificationSink {
        async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
            self.inner.lock().calls.push(notification);
            Ok(())
        }
    }

    #[cfg(test)]
    #[path = "notify_tests.rs"]
    mod tests;
}
