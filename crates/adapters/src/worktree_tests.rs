// SPDX-License-Identifier: MIT

use super::*;

#[tokio::test]
async fn worktree_exists_is_false_until_seeded_or_created() {
    let wt = FakeWorktreeManager::new();
    assert!(!wt.worktree_exists("/worktrees/x").await.unwrap());

    wt.seed_existing("/worktrees/x");
    assert!(wt.worktree_exists("/worktrees/x").await.unwrap());
}

#[tokio::test]
async fn create_worktree_registers_the_new_path() {
    let wt = FakeWorktreeManager::new();
    let info = wt
        .create_worktree(CreateWorktreeOpts {
            agent_id: AgentId::new("worker-1"),
            task_id: TaskId::new("task-1"),
        })
        .await
        .unwrap();
    assert!(wt.worktree_exists(&info.path).await.unwrap());
}
