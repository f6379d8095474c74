// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Narrow capability traits the dispatch engine consumes, plus in-memory
//! fakes for every one of them. No concrete production adapter ships here —
//! the real element store, session-spawning mechanism, and git-worktree
//! management are external collaborators (spec Non-goals).

pub mod element;
pub mod inbox;
pub mod notify;
pub mod session;
pub mod settings;
pub mod worktree;

pub use element::{ElementApi, ElementError, TaskFilter};
pub use inbox::{InboxError, InboxFilter, InboxService};
pub use notify::{NotificationError, NotificationSink};
pub use session::{
    ResumeSessionOpts, SessionEvent, SessionEvents, SessionHandle, SessionManager,
    SessionManagerError, StartSessionOpts,
};
pub use settings::{SettingsError, SettingsService};
pub use worktree::{CreateWorktreeOpts, WorktreeError, WorktreeInfo, WorktreeManager};

#[cfg(any(test, feature = "test-support"))]
pub use element::fake::{ElementCall, FakeElementStore};
#[cfg(any(test, feature = "test-support"))]
pub use inbox::fake::FakeInboxService;
#[cfg(any(test, feature = "test-support"))]
pub use notify::fake::FakeNotificationSink;
#[cfg(any(test, feature = "test-support"))]
pub use session::fake::{FakeSessionManager, SessionCall};
#[cfg(any(test, feature = "test-support"))]
pub use settings::fake::FakeSettingsService;
#[cfg(any(test, feature = "test-support"))]
pub use worktree::fake::{FakeWorktreeManager, WorktreeCall};
