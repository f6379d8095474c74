// SPDX-License-Identifier: MIT

//! `ClosedUnmergedReconciler` — reopens `CLOSED` tasks whose worktree never
//! merged (spec.md §4.9). The grace period guards against a task that
//! closes and merges in the same beat from bouncing back to `REVIEW`
//! before the merge status has had a chance to land.

use crate::config::DispatchConfig;
use crate::error::RuntimeError;
use chrono::Utc;
use dispatch_adapters::{ElementApi, TaskFilter};
use dispatch_core::{MergeStatus, PollResult, PollResultBuilder, PollType, TaskStatus};

pub struct ClosedUnmergedReconciler<E: ElementApi> {
    elements: E,
    config: DispatchConfig,
}

impl<E: ElementApi> ClosedUnmergedReconciler<E> {
    pub fn new(elements: E, config: DispatchConfig) -> Self {
        Self { elements, config }
    }

    /// `closedUnmergedReconciliationPoll` (spec.md §4.9).
    pub async fn poll(&self, now: chrono::DateTime<Utc>) -> Result<PollResult, RuntimeError> {
        let mut builder = PollResultBuilder::new(PollType::ClosedUnmergedReconciliation, now);

        let candidates = self
            .elements
            .list_tasks(TaskFilter {
                status: Some(TaskStatus::Closed),
                ..Default::default()
            })
            .await?
            .into_iter()
            .filter(|t| t.orchestrator.merge_status != Some(MergeStatus::Merged))
            .filter(|t| t.orchestrator.reconciliation_count < self.config.max_reconciliations);

        for task in candidates {
            let Some(closed_at) = task.closed_at else { continue };
            if now - closed_at < self.config.closed_unmerged_grace_period() {
                continue;
            }
            self.elements
                .update_task(
                    &task.id,
                    Box::new(|t| {
                        t.closed_at = None;
                        t.close_reason = None;
                        t.status = TaskStatus::Review;
                        t.orchestrator.reconciliation_count += 1;
                    }),
                )
                .await?;
            builder.record_processed();
        }

        Ok(builder.finish(Utc::now()))
    }
}

#[cfg(test)]
#[path = "closed_unmerged_reconciler_tests.rs"]
mod tests;
