// SPDX-License-Identifier: MIT

//! `InboxPoller` — forwards unread inbox items to a running session or
//! spawns a triage session for the recipient (spec.md §4.11). `InboxApi`
//! is scoped per-recipient, so the caller supplies the roster the same way
//! it does for `AssignmentEngine`/`OrphanRecovery`.

use crate::assignment::RapidExitDetector;
use crate::error::RuntimeError;
use crate::executable_resolver::ExecutableResolver;
use chrono::Utc;
use dispatch_adapters::{
    ElementApi, InboxFilter, InboxService, SessionManager, SettingsService, StartSessionOpts,
};
use dispatch_core::{
    Agent, InboxItem, InboxStatus, PollResult, PollResultBuilder, PollType, ResolvedExecutable,
    TaskId,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Spawning a triage session reuses the same detector the worker-dispatch
/// path uses, since a triage session is itself a worker session and can
/// rapid-exit into a rate limit the same way (spec.md §4.5).
pub struct InboxPoller<E, SM, IB, ST>
where
    E: ElementApi,
    SM: SessionManager,
    IB: InboxService,
    ST: SettingsService,
{
    elements: E,
    sessions: SM,
    inbox: IB,
    resolver: ExecutableResolver<ST>,
    detector: Arc<RapidExitDetector<E>>,
    forwarding: Arc<Mutex<HashSet<String>>>,
}

impl<E, SM, IB, ST> InboxPoller<E, SM, IB, ST>
where
    E: ElementApi,
    SM: SessionManager,
    IB: InboxService,
    ST: SettingsService,
{
    pub fn new(
        elements: E,
        sessions: SM,
        inbox: IB,
        resolver: ExecutableResolver<ST>,
        detector: Arc<RapidExitDetector<E>>,
    ) -> Self {
        Self {
            elements,
            sessions,
            inbox,
            resolver,
            detector,
            forwarding: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// `inboxPoll` (spec.md §4.11). `recipients` are the active agents that
    /// might have mail; `ElementApi`/`InboxApi` scope queries by recipient.
    pub async fn poll(
        &self,
        recipients: &[Agent],
        now: chrono::DateTime<Utc>,
    ) -> Result<PollResult, RuntimeError> {
        let mut builder = PollResultBuilder::new(PollType::Inbox, now);

        for recipient in recipients {
            let items = self
                .inbox
                .get_inbox(
                    &recipient.id,
                    InboxFilter {
                        status: Some(InboxStatus::Unread),
                    },
                )
                .await?;

            for item in items {
                let key = item.forwarding_key();
                {
                    let mut forwarding = self.forwarding.lock();
                    if forwarding.contains(&key) {
                        continue;
                    }
                    forwarding.insert(key.clone());
                }
                let outcome = self.deliver_one(recipient, &item, now).await;
                self.forwarding.lock().remove(&key);
                match outcome {
                    Ok(true) => builder.record_processed(),
                    Ok(false) => {}
                    Err(e) => builder.record_error(e.to_string()),
                }
            }
        }

        Ok(builder.finish(Utc::now()))
    }

    /// Returns `Ok(true)` when the item was actually forwarded or a triage
    /// session spawned, `Ok(false)` when it was left for a later cycle.
    async fn deliver_one(
        &self,
        recipient: &Agent,
        item: &InboxItem,
        now: chrono::DateTime<Utc>,
    ) -> Result<bool, RuntimeError> {
        if self
            .sessions
            .get_active_session(&recipient.id)
            .await?
            .is_some()
        {
            self.sessions
                .message_session(&recipient.id, &inbox_message(item))
                .await?;
            self.inbox
                .mark_status(&recipient.id, &item.message_id, InboxStatus::Read)
                .await?;
            return Ok(true);
        }

        if self.resolver.resolve(recipient).await == ResolvedExecutable::AllLimited {
            debug!(recipient = %recipient.id, "triage session deferred, all executables limited");
            return Ok(false);
        }

        let (_handle, events) = self
            .sessions
            .start_session(
                &recipient.id,
                StartSessionOpts {
                    working_directory: None,
                    interactive: true,
                },
            )
            .await?;

        let chain = self.resolver.chain().await;
        tokio::spawn(self.detector.clone().watch(
            recipient.clone(),
            // Triage sessions have no associated task; the detector's
            // rollback path becomes a harmless no-op (task not found).
            TaskId::new(format!("inbox:{}", item.message_id)),
            now,
            events,
            chain,
        ));

        self.inbox
            .mark_status(&recipient.id, &item.message_id, InboxStatus::Read)
            .await?;
        warn!(recipient = %recipient.id, message = %item.message_id, "spawned triage session");
        Ok(true)
    }
}

fn inbox_message(item: &InboxItem) -> String {
    format!("new message on channel {}", item.channel_id)
}

#[cfg(test)]
#[path = "inbox_poller_tests.rs"]
mod tests;
