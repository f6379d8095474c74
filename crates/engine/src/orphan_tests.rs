// SPDX-License-Identifier: MIT

use super::*;
use crate::rate_limit::RateLimitTracker;
use dispatch_adapters::{
    FakeElementStore, FakeNotificationSink, FakeSessionManager, FakeSettingsService,
    FakeWorktreeManager,
};
use dispatch_core::{AgentId, AgentStatus, EntityType, FakeClock, OrchestratorMeta, TaskId};
use std::sync::Arc;

fn worker(name: &str) -> Agent {
    Agent {
        id: AgentId::new(name),
        name: name.to_string(),
        entity_type: EntityType::Worker,
        status: AgentStatus::Active,
        worker_mode: Some(dispatch_core::WorkerMode::Ephemeral),
        steward_focus: None,
        max_concurrent_tasks: 1,
        preferred_executable: "claude".to_string(),
    }
}

fn recovery_steward(name: &str) -> Agent {
    Agent {
        id: AgentId::new(name),
        name: name.to_string(),
        entity_type: EntityType::Steward,
        status: AgentStatus::Active,
        worker_mode: None,
        steward_focus: Some(StewardFocus::Recovery),
        max_concurrent_tasks: 1,
        preferred_executable: "claude".to_string(),
    }
}

fn director(name: &str) -> Agent {
    Agent {
        id: AgentId::new(name),
        name: name.to_string(),
        entity_type: EntityType::Director,
        status: AgentStatus::Active,
        worker_mode: None,
        steward_focus: None,
        max_concurrent_tasks: 0,
        preferred_executable: String::new(),
    }
}

fn assigned_task(id: &str, assignee: &AgentId, status: TaskStatus) -> Task {
    let now = Utc::now();
    let mut orchestrator = OrchestratorMeta::default();
    orchestrator.assigned_agent = Some(assignee.clone());
    Task {
        id: TaskId::new(id),
        title: "recover me".to_string(),
        status,
        priority: 3,
        assignee: Some(assignee.clone()),
        created_at: now,
        updated_at: now,
        closed_at: None,
        close_reason: None,
        scheduled_for: None,
        depends_on: Vec::new(),
        namespace: String::new(),
        orchestrator,
    }
}

#[allow(clippy::type_complexity)]
fn harness() -> (
    OrphanRecovery<
        FakeElementStore,
        FakeSessionManager,
        FakeWorktreeManager,
        FakeSettingsService,
        FakeNotificationSink,
    >,
    FakeElementStore,
    FakeSessionManager,
    FakeNotificationSink,
) {
    let elements = FakeElementStore::new();
    let sessions = FakeSessionManager::new();
    let worktrees = FakeWorktreeManager::new();
    let settings = FakeSettingsService::with_chain(vec!["claude".into()]);
    let notifications = FakeNotificationSink::new();
    let clock = Arc::new(FakeClock::default());
    let tracker = Arc::new(RateLimitTracker::new(clock));
    let resolver = ExecutableResolver::new(settings, tracker);
    let config = DispatchConfig::default();
    let recovery = OrphanRecovery::new(
        elements.clone(),
        sessions.clone(),
        worktrees,
        resolver,
        notifications.clone(),
        config,
    );
    (recovery, elements, sessions, notifications)
}

#[tokio::test]
async fn stuck_worker_resumes_from_stale_session_on_failure_and_respawns_fresh() {
    let (recovery, elements, sessions, _notifications) = harness();
    let w = worker("w1");
    let mut task = assigned_task("t1", &w.id, TaskStatus::InProgress);
    task.orchestrator.session_id = Some(dispatch_core::SessionId::new("stale"));
    task.orchestrator.resume_count = 1;
    elements.seed_task(task);

    sessions.fail_next_resume(w.id.clone(), "session not found");

    let result = recovery
        .recover(&[w.clone()], &[], &[], Utc::now())
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.processed, 1);
    let task = elements.task(&TaskId::new("t1")).unwrap();
    assert_eq!(task.orchestrator.resume_count, 2);
    assert!(sessions
        .calls()
        .iter()
        .any(|c| matches!(c, dispatch_adapters::SessionCall::Start { .. })));
}

#[tokio::test]
async fn all_limited_worker_is_left_for_next_cycle() {
    let elements = FakeElementStore::new();
    let sessions = FakeSessionManager::new();
    let worktrees = FakeWorktreeManager::new();
    let settings = FakeSettingsService::with_chain(vec!["claude".into()]);
    let clock = Arc::new(FakeClock::default());
    let tracker = Arc::new(RateLimitTracker::new(clock));
    tracker.mark_limited("claude", Utc::now() + chrono::Duration::hours(1), &vec!["claude".to_string()]);
    let resolver = ExecutableResolver::new(settings, tracker);
    let recovery = OrphanRecovery::new(
        elements.clone(),
        sessions.clone(),
        worktrees,
        resolver,
        FakeNotificationSink::new(),
        DispatchConfig::default(),
    );

    let w = worker("w1");
    elements.seed_task(assigned_task("t1", &w.id, TaskStatus::InProgress));

    let result = recovery
        .recover(&[w], &[], &[], Utc::now())
        .await
        .unwrap();

    assert_eq!(result.processed, 0);
    assert!(sessions
        .calls()
        .iter()
        .all(|c| !matches!(c, dispatch_adapters::SessionCall::Start { .. })));
}

#[tokio::test]
async fn resume_budget_exhausted_delegates_to_free_recovery_steward() {
    let (recovery, elements, sessions, _notifications) = harness();
    let w = worker("w1");
    let mut task = assigned_task("t1", &w.id, TaskStatus::InProgress);
    task.orchestrator.resume_count = 3;
    elements.seed_task(task);

    let steward = recovery_steward("rs1");
    let result = recovery
        .recover(&[w.clone()], &[steward.clone()], &[], Utc::now())
        .await
        .unwrap();

    assert_eq!(result.processed, 1);
    let task = elements.task(&TaskId::new("t1")).unwrap();
    assert_eq!(task.assignee, Some(steward.id.clone()));
    assert!(sessions.calls().iter().any(|c| matches!(
        c,
        dispatch_adapters::SessionCall::Start { agent_id, .. } if *agent_id == steward.id
    )));
}

#[tokio::test]
async fn steward_recovery_cap_marks_failed_and_clears_assignee() {
    let (recovery, elements, _sessions, _notifications) = harness();
    let steward_id = AgentId::new("steward-1");
    let mut task = assigned_task("t1", &steward_id, TaskStatus::Review);
    task.orchestrator.steward_recovery_count = 2;
    elements.seed_task(task);

    let mut builder = PollResultBuilder::new(PollType::OrphanRecovery, Utc::now());
    recovery
        .recover_orphaned_stewards(Utc::now(), &mut builder)
        .await
        .unwrap();
    let result = builder.finish(Utc::now());

    assert_eq!(result.processed, 1);
    let task = elements.task(&TaskId::new("t1")).unwrap();
    assert_eq!(task.orchestrator.merge_status, Some(MergeStatus::Failed));
    assert!(task
        .orchestrator
        .merge_failure_reason
        .as_ref()
        .unwrap()
        .contains("3"));
    assert!(task.is_unassigned());
}

#[tokio::test]
async fn orphaned_recovery_steward_unassigned_and_resume_count_reset() {
    let (recovery, elements, _sessions, _notifications) = harness();
    let steward = recovery_steward("rs1");
    let mut task = assigned_task("t1", &steward.id, TaskStatus::InProgress);
    task.orchestrator.resume_count = 3;
    elements.seed_task(task);

    let mut builder = PollResultBuilder::new(PollType::OrphanRecovery, Utc::now());
    recovery
        .recover_orphaned_recovery_stewards(&[steward], &[], Utc::now(), &mut builder)
        .await
        .unwrap();
    let result = builder.finish(Utc::now());

    assert_eq!(result.processed, 1);
    let task = elements.task(&TaskId::new("t1")).unwrap();
    assert!(task.is_unassigned());
    assert_eq!(task.orchestrator.resume_count, 0);
}

#[tokio::test]
async fn escalation_fires_when_steward_history_reaches_threshold() {
    let (recovery, elements, _sessions, notifications) = harness();
    let steward = recovery_steward("rs1");
    let mut task = assigned_task("t1", &steward.id, TaskStatus::InProgress);
    for i in 0..3 {
        task.orchestrator.session_history.push(dispatch_core::SessionHistoryEntry {
            session_id: dispatch_core::SessionId::new(format!("s{i}")),
            agent_id: steward.id.clone(),
            agent_name: steward.name.clone(),
            agent_role: AgentRole::Steward,
            started_at: Utc::now(),
            ended_at: Some(Utc::now()),
        });
    }
    elements.seed_task(task);

    let boss = director("director-1");
    let mut builder = PollResultBuilder::new(PollType::OrphanRecovery, Utc::now());
    recovery
        .recover_orphaned_recovery_stewards(&[steward], &[boss.clone()], Utc::now(), &mut builder)
        .await
        .unwrap();

    let calls = notifications.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].director_id, boss.id);
    // resume_count must be untouched since we escalated instead of resetting
    let task = elements.task(&TaskId::new("t1")).unwrap();
    assert_eq!(task.assignee, Some(AgentId::new("rs1")));
}
