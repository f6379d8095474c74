// SPDX-License-Identifier: MIT

//! `ElementApi` — the durable element store, as seen by the daemon.
//!
//! The daemon only ever sees tasks and plans through this trait; the actual
//! storage engine, schema, and CRUD semantics are out of scope (spec.md §1
//! Non-goals). `update` must be effectively atomic per element: a partial
//! failure must never leave a task half-written.

use async_trait::async_trait;
use dispatch_core::{Plan, PlanId, Task, TaskId, TaskStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElementError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("plan not found: {0}")]
    PlanNotFound(PlanId),
    #[error("update failed: {0}")]
    UpdateFailed(String),
}

/// Filter applied by `ElementApi::list_tasks`. `None` fields are
/// unconstrained.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee: Option<dispatch_core::AgentId>,
    pub unassigned_only: bool,
}

/// A function applied to a task to produce its next state. Adapters apply
/// this under whatever locking/transaction scheme the real store uses;
/// fakes apply it under a mutex.
pub type TaskPatch = Box<dyn FnOnce(&mut Task) + Send>;

/// A function applied to a plan to produce its next state. See [`TaskPatch`].
pub type PlanPatch = Box<dyn FnOnce(&mut Plan) + Send>;

#[async_trait]
pub trait ElementApi: Clone + Send + Sync + 'static {
    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, ElementError>;
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, ElementError>;
    async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, ElementError>;
    async fn create_task(&self, task: Task) -> Result<Task, ElementError>;

    async fn get_plan(&self, id: &PlanId) -> Result<Option<Plan>, ElementError>;
    async fn list_plans(&self) -> Result<Vec<Plan>, ElementError>;
    async fn update_plan(&self, id: &PlanId, patch: PlanPatch) -> Result<Plan, ElementError>;
}

#[cfg(any(test, feature = "test-support"))]
#[path = "."]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    pub enum ElementCall {
        GetTask(TaskId),
        ListTasks(TaskFilter),
        UpdateTask(TaskId),
        CreateTask(TaskId),
        GetPlan(PlanId),
        ListPlans,
        UpdatePlan(PlanId),
    }

    struct FakeElementState {
        tasks: HashMap<TaskId, Task>,
        plans: HashMap<PlanId, Plan>,
        calls: Vec<ElementCall>,
    }

    /// In-memory element store used by every engine test.
    #[derive(Clone)]
    pub struct FakeElementStore {
        inner: Arc<Mutex<FakeElementState>>,
    }

    impl Default for FakeElementStore {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeElementState {
                    tasks: HashMap::new(),
                    plans: HashMap::new(),
                    calls: Vec::new(),
                })),
            }
        }
    }

    impl FakeElementStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<ElementCall> {
            self.inner.lock().calls.clone()
        }

        pub fn seed_task(&self, task: Task) {
            self.inner.lock().tasks.insert(task.id.clone(), task);
        }

        pub fn seed_plan(&self, plan: Plan) {
            self.inner.lock().plans.insert(plan.id.clone(), plan);
        }

        pub fn task(&self, id: &TaskId) -> Option<Task> {
            self.inner.lock().tasks.get(id).cloned()
        }
    }

    #[async_trait]
    impl ElementApi for FakeElementStore {
        async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, ElementError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ElementCall::GetTask(id.clone()));
            Ok(inner.tasks.get(id).cloned())
        }

        async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, ElementError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ElementCall::ListTasks(filter.clone()));
            let tasks = inner
                .tasks
                .values()
                .filter(|t| filter.status.map_or(true, |s| t.status == s))
                .filter(|t| {
                    filter
                        .assignee
                        .as_ref()
                        .map_or(true, |a| t.assignee.as_ref() == Some(a))
                })
                .filter(|t| !filter.unassigned_only || t.is_unassigned())
                .cloned()
                .collect();
            Ok(tasks)
        }

        async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, ElementError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ElementCall::UpdateTask(id.clone()));
            let task = inner
                .tasks
                .get_mut(id)
                .ok_or_else(|| ElementError::TaskNotFound(id.clone()))?;
            patch(task);
            Ok(task.clone())
        }

        async fn create_task(&self, task: Task) -> Result<Task, ElementError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ElementCall::CreateTask(task.id.clone()));
            inner.tasks.insert(task.id.clone(), task.clone());
            Ok(task)
        }

        async fn get_plan(&self, id: &PlanId) -> Result<Option<Plan>, ElementError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ElementCall::GetPlan(id.clone()));
            Ok(inner.plans.get(id).cloned())
        }

        async fn list_plans(&self) -> Result<Vec<Plan>, ElementError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ElementCall::ListPlans);
            Ok(inner.plans.values().cloned().collect())
        }

        async fn update_plan(&self, id: &PlanId, patch: PlanPatch) -> Result<Plan, ElementError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ElementCall::UpdatePlan(id.clone()));
            let plan = inner
                .plans
                .get_mut(id)
                .ok_or_else(|| ElementError::PlanNotFound(id.clone()))?;
            patch(plan);
            Ok(plan.clone())
        }
    }

    #[cfg(test)]
    #[path = "element_tests.rs"]
    mod tests;
}
