// SPDX-License-Identifier: MIT

//! `PlanAutoComplete` — marks an active plan `completed` once every child
//! task has closed (spec.md §4.10).

use crate::error::RuntimeError;
use chrono::Utc;
use dispatch_adapters::ElementApi;
use dispatch_core::{PlanStatus, PollResult, PollResultBuilder, PollType, TaskStatus};

pub struct PlanAutoComplete<E: ElementApi> {
    elements: E,
}

impl<E: ElementApi> PlanAutoComplete<E> {
    pub fn new(elements: E) -> Self {
        Self { elements }
    }

    /// `planAutoCompletePoll` (spec.md §4.10). A plan with no children, or
    /// one still missing a closed child, is skipped untouched.
    pub async fn poll(&self, now: chrono::DateTime<Utc>) -> Result<PollResult, RuntimeError> {
        let mut builder = PollResultBuilder::new(PollType::PlanAutoComplete, now);

        for plan in self.elements.list_plans().await? {
            if plan.status != PlanStatus::Active || !plan.has_children() {
                continue;
            }
            let mut all_closed = true;
            for task_id in &plan.child_task_ids {
                match self.elements.get_task(task_id).await? {
                    Some(task) if task.status == TaskStatus::Closed => {}
                    _ => {
                        all_closed = false;
                        break;
                    }
                }
            }
            if !all_closed {
                continue;
            }
            self.elements
                .update_plan(
                    &plan.id,
                    Box::new(move |p| {
                        p.status = PlanStatus::Completed;
                        p.completed_at = Some(now);
                    }),
                )
                .await?;
            builder.record_processed();
        }

        Ok(builder.finish(Utc::now()))
    }
}

#[cfg(test)]
#[path = "plan_auto_complete_tests.rs"]
mod tests;
