// SPDX-License-Identifier: MIT

use super::*;
use dispatch_adapters::FakeElementStore;
use dispatch_core::{OrchestratorMeta, Plan, PlanId, Task, TaskId};

fn closed_task(id: &str) -> Task {
    let now = Utc::now();
    Task {
        id: TaskId::new(id),
        title: "done".to_string(),
        status: TaskStatus::Closed,
        priority: 3,
        assignee: None,
        created_at: now,
        updated_at: now,
        closed_at: Some(now),
        close_reason: None,
        scheduled_for: None,
        depends_on: Vec::new(),
        namespace: String::new(),
        orchestrator: OrchestratorMeta::default(),
    }
}

fn open_task(id: &str) -> Task {
    let mut task = closed_task(id);
    task.status = TaskStatus::Open;
    task.closed_at = None;
    task
}

#[tokio::test]
async fn completes_active_plan_once_every_child_is_closed() {
    let elements = FakeElementStore::new();
    elements.seed_task(closed_task("t1"));
    elements.seed_task(closed_task("t2"));
    elements.seed_plan(Plan {
        id: PlanId::new("p1"),
        status: PlanStatus::Active,
        child_task_ids: vec![TaskId::new("t1"), TaskId::new("t2")],
        completed_at: None,
    });
    let completer = PlanAutoComplete::new(elements.clone());

    let now = Utc::now();
    let result = completer.poll(now).await.unwrap();

    assert_eq!(result.processed, 1);
    let plan = elements.get_plan(&PlanId::new("p1")).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(plan.completed_at, Some(now));
}

#[tokio::test]
async fn mixed_status_children_leaves_plan_active() {
    let elements = FakeElementStore::new();
    elements.seed_task(closed_task("t1"));
    elements.seed_task(open_task("t2"));
    elements.seed_plan(Plan {
        id: PlanId::new("p1"),
        status: PlanStatus::Active,
        child_task_ids: vec![TaskId::new("t1"), TaskId::new("t2")],
        completed_at: None,
    });
    let completer = PlanAutoComplete::new(elements.clone());

    let result = completer.poll(Utc::now()).await.unwrap();

    assert_eq!(result.processed, 0);
    let plan = elements.get_plan(&PlanId::new("p1")).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Active);
}

#[tokio::test]
async fn plan_with_no_children_is_skipped() {
    let elements = FakeElementStore::new();
    elements.seed_plan(Plan {
        id: PlanId::new("p1"),
        status: PlanStatus::Active,
        child_task_ids: Vec::new(),
        completed_at: None,
    });
    let completer = PlanAutoComplete::new(elements.clone());

    let result = completer.poll(Utc::now()).await.unwrap();

    assert_eq!(result.processed, 0);
}

#[tokio::test]
async fn draft_plan_is_never_completed() {
    let elements = FakeElementStore::new();
    elements.seed_task(closed_task("t1"));
    elements.seed_plan(Plan {
        id: PlanId::new("p1"),
        status: PlanStatus::Draft,
        child_task_ids: vec![TaskId::new("t1")],
        completed_at: None,
    });
    let completer = PlanAutoComplete::new(elements.clone());

    let result = completer.poll(Utc::now()).await.unwrap();

    assert_eq!(result.processed, 0);
}
