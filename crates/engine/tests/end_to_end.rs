// SPDX-License-Identifier: MIT

//! Concrete end-to-end scenarios assembled from more than one subsystem
//! against the same store, the way a real poll cycle would touch them.

use chrono::Utc;
use dispatch_adapters::{
    ElementApi, FakeElementStore, FakeNotificationSink, FakeSessionManager, FakeSettingsService,
    FakeWorktreeManager, SessionCall, SessionEvent, SessionManager, WorktreeCall,
};
use dispatch_core::{
    Agent, AgentId, AgentStatus, EntityType, FakeClock, OrchestratorMeta, Plan, PlanId,
    PlanStatus, Task, TaskId, TaskStatus, WorkerMode,
};
use dispatch_engine::{
    AssignmentEngine, DispatchConfig, ExecutableResolver, OrphanRecovery, PlanAutoComplete,
    RapidExitDetector, RateLimitTracker,
};
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn worker(name: &str, executable: &str) -> Agent {
    Agent {
        id: AgentId::new(name),
        name: name.to_string(),
        entity_type: EntityType::Worker,
        status: AgentStatus::Active,
        worker_mode: Some(WorkerMode::Ephemeral),
        steward_focus: None,
        max_concurrent_tasks: 1,
        preferred_executable: executable.to_string(),
    }
}

fn merge_steward(name: &str) -> Agent {
    Agent {
        id: AgentId::new(name),
        name: name.to_string(),
        entity_type: EntityType::Steward,
        status: AgentStatus::Active,
        worker_mode: None,
        steward_focus: Some(dispatch_core::StewardFocus::Merge),
        max_concurrent_tasks: 1,
        preferred_executable: "claude".to_string(),
    }
}

fn open_task(id: &str, priority: u8) -> Task {
    let now = Utc::now();
    Task {
        id: TaskId::new(id),
        title: "do the thing".to_string(),
        status: TaskStatus::Open,
        priority,
        assignee: None,
        created_at: now,
        updated_at: now,
        closed_at: None,
        close_reason: None,
        scheduled_for: None,
        depends_on: Vec::new(),
        namespace: String::new(),
        orchestrator: OrchestratorMeta::default(),
    }
}

struct Harness {
    elements: FakeElementStore,
    sessions: FakeSessionManager,
    worktrees: FakeWorktreeManager,
    tracker: Arc<RateLimitTracker>,
    assignment: AssignmentEngine<FakeElementStore, FakeSessionManager, FakeWorktreeManager, FakeSettingsService>,
    orphan: OrphanRecovery<FakeElementStore, FakeSessionManager, FakeWorktreeManager, FakeSettingsService, FakeNotificationSink>,
}

fn harness_with_chain(chain: Vec<String>) -> Harness {
    let elements = FakeElementStore::new();
    let sessions = FakeSessionManager::new();
    let worktrees = FakeWorktreeManager::new();
    let notifications = FakeNotificationSink::new();
    let settings = FakeSettingsService::with_chain(chain);
    let clock = Arc::new(FakeClock::default());
    let tracker = Arc::new(RateLimitTracker::new(clock));
    let config = DispatchConfig::default();

    let detector = Arc::new(RapidExitDetector::new(
        elements.clone(),
        tracker.clone(),
        config.clone(),
    ));
    let assignment = AssignmentEngine::new(
        elements.clone(),
        sessions.clone(),
        worktrees.clone(),
        ExecutableResolver::new(settings.clone(), tracker.clone()),
        detector,
    );
    let orphan = OrphanRecovery::new(
        elements.clone(),
        sessions.clone(),
        worktrees.clone(),
        ExecutableResolver::new(settings, tracker.clone()),
        notifications,
        config,
    );

    Harness {
        elements,
        sessions,
        worktrees,
        tracker,
        assignment,
        orphan,
    }
}

fn harness() -> Harness {
    harness_with_chain(vec!["claude".to_string()])
}

#[tokio::test]
async fn scenario_basic_dispatch() {
    let h = harness();
    h.elements.seed_task(open_task("t1", 3));

    let result = h
        .assignment
        .poll_worker_availability(&[worker("w1", "claude")], Utc::now())
        .await
        .unwrap();

    assert_eq!(result.processed, 1);
    let task = h.elements.task(&TaskId::new("t1")).unwrap();
    assert_eq!(task.assignee, Some(AgentId::new("w1")));
    assert!(h
        .sessions
        .get_active_session(&AgentId::new("w1"))
        .await
        .unwrap()
        .is_some());
    assert_eq!(h.worktrees.calls().len(), 1);
}

#[tokio::test]
async fn scenario_handoff_reuse() {
    let h = harness();
    h.worktrees.seed_existing("/w/x");
    let mut task = open_task("t1", 3);
    task.orchestrator.handoff_worktree = Some("/w/x".to_string());
    h.elements.seed_task(task);

    h.assignment
        .poll_worker_availability(&[worker("w1", "claude")], Utc::now())
        .await
        .unwrap();

    assert!(h
        .worktrees
        .calls()
        .iter()
        .all(|c| !matches!(c, WorktreeCall::Create { .. })));
    let started = h
        .sessions
        .calls()
        .into_iter()
        .find_map(|c| match c {
            SessionCall::Start { opts, .. } => Some(opts.working_directory),
            _ => None,
        })
        .unwrap();
    assert_eq!(started, Some("/w/x".to_string()));
}

#[tokio::test]
async fn scenario_rate_limit_pause() {
    let h = harness_with_chain(vec!["a".to_string(), "b".to_string()]);
    h.elements.seed_task(open_task("t1", 3));
    h.tracker
        .mark_limited("a", Utc::now() + chrono::Duration::seconds(60), &vec!["a".to_string(), "b".to_string()]);

    let result = h
        .assignment
        .poll_worker_availability(&[worker("w1", "a")], Utc::now())
        .await
        .unwrap();

    assert_eq!(result.processed, 0);
    assert!(h
        .sessions
        .calls()
        .iter()
        .all(|c| !matches!(c, SessionCall::Start { .. })));
    let status = h.tracker.status(&vec!["a".to_string(), "b".to_string()], "a");
    assert!(status.is_paused);
    assert_eq!(status.limits.len(), 2);
}

#[tokio::test]
async fn scenario_orphan_resume_fallback() {
    let h = harness();
    let mut task = open_task("t1", 3);
    task.status = TaskStatus::InProgress;
    task.assign(AgentId::new("w1"));
    task.orchestrator.session_id = Some(dispatch_core::SessionId::new("stale"));
    task.orchestrator.resume_count = 1;
    h.elements.seed_task(task);
    h.sessions
        .fail_next_resume(AgentId::new("w1"), "stale session gone");

    h.orphan
        .recover(&[worker("w1", "claude")], &[], &[], Utc::now())
        .await
        .unwrap();

    let task = h.elements.task(&TaskId::new("t1")).unwrap();
    assert_eq!(task.orchestrator.resume_count, 2);
    assert_ne!(
        task.orchestrator.session_id,
        Some(dispatch_core::SessionId::new("stale"))
    );
    assert!(h
        .sessions
        .calls()
        .iter()
        .any(|c| matches!(c, SessionCall::Start { .. })));
}

#[tokio::test]
async fn scenario_rapid_silent_exit() {
    let h = harness();
    h.elements.seed_task(open_task("t1", 3));

    h.assignment
        .poll_worker_availability(&[worker("w1", "claude")], Utc::now())
        .await
        .unwrap();

    h.sessions.emit(
        &AgentId::new("w1"),
        SessionEvent::Exit {
            code: Some(1),
            signal: None,
        },
    );
    tokio::time::sleep(StdDuration::from_millis(20)).await;

    let task = h.elements.task(&TaskId::new("t1")).unwrap();
    assert_eq!(task.orchestrator.resume_count, 0);
    assert!(h.tracker.is_limited("claude"));
}

#[tokio::test]
async fn scenario_steward_recovery_cap() {
    let h = harness();
    let mut task = open_task("t1", 3);
    task.status = TaskStatus::Review;
    task.assign(AgentId::new("s1"));
    task.orchestrator.steward_recovery_count = 3;
    h.elements.seed_task(task);

    h.orphan
        .recover(&[], &[merge_steward("s1")], &[], Utc::now())
        .await
        .unwrap();

    let task = h.elements.task(&TaskId::new("t1")).unwrap();
    assert!(task.is_unassigned());
    assert_eq!(task.orchestrator.merge_status, Some(dispatch_core::MergeStatus::Failed));
    let reason = task.orchestrator.merge_failure_reason.unwrap();
    assert!(reason.contains("Steward recovery limit reached"));
    assert!(reason.contains('3'));
    assert!(h
        .sessions
        .calls()
        .iter()
        .all(|c| !matches!(c, SessionCall::Start { .. })));
}

#[tokio::test]
async fn scenario_plan_auto_complete() {
    let elements = FakeElementStore::new();
    let completer = PlanAutoComplete::new(elements.clone());

    let mut done_child = open_task("t1", 1);
    done_child.status = TaskStatus::Closed;
    elements.seed_task(done_child);
    elements.seed_plan(Plan {
        id: PlanId::new("p1"),
        status: PlanStatus::Active,
        child_task_ids: vec![TaskId::new("t1")],
        completed_at: None,
    });

    elements.seed_task(open_task("t2", 1));
    elements.seed_plan(Plan {
        id: PlanId::new("p2"),
        status: PlanStatus::Active,
        child_task_ids: vec![TaskId::new("t2")],
        completed_at: None,
    });

    let now = Utc::now();
    completer.poll(now).await.unwrap();

    let p1 = elements.get_plan(&PlanId::new("p1")).await.unwrap().unwrap();
    assert_eq!(p1.status, PlanStatus::Completed);
    assert_eq!(p1.completed_at, Some(now));

    let p2 = elements.get_plan(&PlanId::new("p2")).await.unwrap().unwrap();
    assert_eq!(p2.status, PlanStatus::Active);
}
