// SPDX-License-Identifier: MIT

//! `WorktreeManager` — the git-worktree abstraction (spec.md §1 Non-goals).
//! The daemon only ever checks existence and requests creation; it never
//! inspects the filesystem directly.

use async_trait::async_trait;
use dispatch_core::{AgentId, TaskId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("create failed: {0}")]
    CreateFailed(String),
}

#[derive(Debug, Clone)]
pub struct CreateWorktreeOpts {
    pub agent_id: AgentId,
    pub task_id: TaskId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: String,
    pub branch: String,
}

#[async_trait]
pub trait WorktreeManager: Clone + Send + Sync + 'static {
    async fn create_worktree(
        &self,
        opts: CreateWorktreeOpts,
    ) -> Result<WorktreeInfo, WorktreeError>;

    async fn worktree_exists(&self, path: &str) -> Result<bool, WorktreeError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    pub enum WorktreeCall {
        Create { task_id: TaskId },
        Exists { path: String },
    }

    struct FakeWorktreeState {
        existing: HashSet<String>,
        calls: Vec<WorktreeCall>,
        next_id: u64,
    }

    #[derive(Clone)]
    pub struct FakeWorktreeManager {
        inner: Arc<Mutex<FakeWorktreeState>>,
    }

    impl Default for FakeWorktreeManager {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeWorktreeState {
                    existing: HashSet::new(),
                    calls: Vec::new(),
                    next_id: 0,
                })),
            }
        }
    }

    impl FakeWorktreeManager {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<WorktreeCall> {
            self.inner.lock().calls.clone()
        }

        /// Seed a path as already present on disk, e.g. a handoff worktree
        /// left by a previous worker run (spec.md §4.4 step 5).
        pub fn seed_existing(&self, path: impl Into<String>) {
            self.inner.lock().existing.insert(path.into());
        }
    }

    #[async_trait]
    impl WorktreeManager for FakeWorktreeManager {
        async fn create_worktree(
            &self,
            opts: CreateWorktreeOpts,
        ) -> Result<WorktreeInfo, WorktreeError> {
            let mut inner = self.inner.lock();
            inner.calls.push(WorktreeCall::Create {
                task_id: opts.task_id.clone(),
            });
            inner.next_id += 1;
            let path = format!("/worktrees/{}-{}", opts.task_id.as_str(), inner.next_id);
            let branch = format!("task/{}", opts.task_id.as_str());
            inner.existing.insert(path.clone());
            Ok(WorktreeInfo { path, branch })
        }

        async fn worktree_exists(&self, path: &str) -> Result<bool, WorktreeError> {
            let mut inner = self.inner.lock();
            inner.calls.push(WorktreeCall::Exists {
                path: path.to_string(),
            });
            Ok(inner.existing.contains(path))
        }
    }

    #[cfg(test)]
    #[path = "worktree_tests.rs"]
    mod tests;
}
