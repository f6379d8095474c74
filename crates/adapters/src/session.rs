// SPDX-License-Identifier: MIT

//! `SessionManager` — the opaque session-spawning mechanism (spec.md §1
//! Non-goals: "the underlying session-spawning mechanism"). The daemon
//! never inspects a session's process; it only starts, resumes, stops, and
//! messages one, and listens to the event channel handed back synchronously
//! from `start_session`/`resume_session`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dispatch_core::AgentId;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Debug, Error)]
pub enum SessionManagerError {
    #[error("session not found for agent {0}")]
    NotFound(AgentId),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("resume failed: {0}")]
    ResumeFailed(String),
}

/// Opaque handle to a running session. The daemon stores only
/// `SessionHandle::id` (as `core::SessionId`) in task metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: dispatch_core::SessionId,
}

/// One event emitted on a session's channel. Mirrors spec.md §6's
/// `event`/`rate_limited`/`exit` emitter contract.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Assistant { message: String },
    RateLimited {
        executable_path: String,
        resets_at: Option<DateTime<Utc>>,
        message: String,
    },
    Exit { code: Option<i32>, signal: Option<String> },
}

pub type SessionEvents = UnboundedReceiver<SessionEvent>;

/// Options passed to `start_session`.
#[derive(Debug, Clone, Default)]
pub struct StartSessionOpts {
    pub working_directory: Option<String>,
    pub interactive: bool,
}

/// Options passed to `resume_session`.
#[derive(Debug, Clone)]
pub struct ResumeSessionOpts {
    pub provider_session_id: String,
    pub check_ready_queue: bool,
}

#[async_trait]
pub trait SessionManager: Clone + Send + Sync + 'static {
    /// Start a session. The returned receiver must already be wired to the
    /// session's event source by the time this call returns — callers rely
    /// on attaching to it with no gap (spec.md §4.4 step 8, §9).
    async fn start_session(
        &self,
        agent_id: &AgentId,
        opts: StartSessionOpts,
    ) -> Result<(SessionHandle, SessionEvents), SessionManagerError>;

    async fn resume_session(
        &self,
        agent_id: &AgentId,
        opts: ResumeSessionOpts,
    ) -> Result<(SessionHandle, SessionEvents), SessionManagerError>;

    async fn stop_session(&self, agent_id: &AgentId) -> Result<(), SessionManagerError>;

    async fn get_active_session(
        &self,
        agent_id: &AgentId,
    ) -> Result<Option<SessionHandle>, SessionManagerError>;

    async fn message_session(
        &self,
        agent_id: &AgentId,
        message: &str,
    ) -> Result<(), SessionManagerError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone)]
    pub enum SessionCall {
        Start { agent_id: AgentId, opts: StartSessionOpts },
        Resume { agent_id: AgentId, opts: ResumeSessionOpts },
        Stop { agent_id: AgentId },
        GetActive { agent_id: AgentId },
        Message { agent_id: AgentId, message: String },
    }

    struct FakeSessionState {
        active: HashMap<AgentId, SessionHandle>,
        calls: Vec<SessionCall>,
        next_id: u64,
        /// Agents whose next `start_session`/`resume_session` call should fail.
        fail_start: HashMap<AgentId, String>,
        fail_resume: HashMap<AgentId, String>,
        senders: HashMap<AgentId, mpsc::UnboundedSender<SessionEvent>>,
    }

    /// In-memory `SessionManager` used by every engine test. Sessions never
    /// really run anything; tests drive behavior by pushing events onto the
    /// channel returned from `start_session`/`resume_session`, or by calling
    /// `fail_next_start`/`fail_next_resume` before dispatching.
    #[derive(Clone)]
    pub struct FakeSessionManager {
        inner: Arc<Mutex<FakeSessionState>>,
    }

    impl Default for FakeSessionManager {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeSessionState {
                    active: HashMap::new(),
                    calls: Vec::new(),
                    next_id: 0,
                    fail_start: HashMap::new(),
                    fail_resume: HashMap::new(),
                    senders: HashMap::new(),
                })),
            }
        }
    }

    impl FakeSessionManager {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<SessionCall> {
            self.inner.lock().calls.clone()
        }

        pub fn fail_next_start(&self, agent_id: AgentId, reason: impl Into<String>) {
            self.inner.lock().fail_start.insert(agent_id, reason.into());
        }

        pub fn fail_next_resume(&self, agent_id: AgentId, reason: impl Into<String>) {
            self.inner.lock().fail_resume.insert(agent_id, reason.into());
        }

        /// Push an event onto a running session's channel, as if the
        /// process emitted it.
        pub fn emit(&self, agent_id: &AgentId, event: SessionEvent) {
            if let Some(tx) = self.inner.lock().senders.get(agent_id) {
                let _ = tx.send(event);
            }
        }

        fn spawn_locked(inner: &mut FakeSessionState, agent_id: &AgentId) -> (SessionHandle, SessionEvents) {
            inner.next_id += 1;
            let handle = SessionHandle {
                id: dispatch_core::SessionId::new(format!("fake-session-{}", inner.next_id)),
            };
            let (tx, rx) = mpsc::unbounded_channel();
            inner.senders.insert(agent_id.clone(), tx);
            inner.active.insert(agent_id.clone(), handle.clone());
            (handle, rx)
        }
    }

    #[async_trait]
    impl SessionManager for FakeSessionManager {
        async fn start_session(
            &self,
            agent_id: &AgentId,
            opts: StartSessionOpts,
        ) -> Result<(SessionHandle, SessionEvents), SessionManagerError> {
            let mut inner = self.inner.lock();
            inner.calls.push(SessionCall::Start {
                agent_id: agent_id.clone(),
                opts,
            });
            if let Some(reason) = inner.fail_start.remove(agent_id) {
                return Err(SessionManagerError::SpawnFailed(reason));
            }
            Ok(Self::spawn_locked(&mut inner, agent_id))
        }

        async fn resume_session(
            &self,
            agent_id: &AgentId,
            opts: ResumeSessionOpts,
        ) -> Result<(SessionHandle, SessionEvents), SessionManagerError> {
            let mut inner = self.inner.lock();
            inner.calls.push(SessionCall::Resume {
                agent_id: agent_id.clone(),
                opts,
            });
            if let Some(reason) = inner.fail_resume.remove(agent_id) {
                return Err(SessionManagerError::ResumeFailed(reason));
            }
            Ok(Self::spawn_locked(&mut inner, agent_id))
        }

        async fn stop_session(&self, agent_id: &AgentId) -> Result<(), SessionManagerError> {
            let mut inner = self.inner.lock();
            inner.calls.push(SessionCall::Stop {
                agent_id: agent_id.clone(),
            });
            inner.active.remove(agent_id);
            inner.senders.remove(agent_id);
            Ok(())
        }

        async fn get_active_session(
            &self,
            agent_id: &AgentId,
        ) -> Result<Option<SessionHandle>, SessionManagerError> {
            let mut inner = self.inner.lock();
            inner.calls.push(SessionCall::GetActive {
                agent_id: agent_id.clone(),
            });
            Ok(inner.active.get(agent_id).cloned())
        }

        async fn message_session(
            &self,
            agent_id: &AgentId,
            message: &str,
        ) -> Result<(), SessionManagerError> {
            let mut inner = self.inner.lock();
            inner.calls.push(SessionCall::Message {
                agent_id: agent_id.clone(),
                message: message.to_string(),
            });
            if !inner.active.contains_key(agent_id) {
                return Err(SessionManagerError::NotFound(agent_id.clone()));
            }
            Ok(())
        }
    }

    #[cfg(test)]
    #[path = "session_tests.rs"]
    mod tests;
}
