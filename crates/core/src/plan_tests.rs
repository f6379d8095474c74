// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn has_children_reflects_child_task_ids() {
    let mut plan = Plan {
        id: PlanId::new("plan-1"),
        status: PlanStatus::Draft,
        child_task_ids: Vec::new(),
        completed_at: None,
    };
    assert!(!plan.has_children());

    plan.child_task_ids.push(TaskId::new("task-1"));
    assert!(plan.has_children());
}
