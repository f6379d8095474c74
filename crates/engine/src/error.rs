// SPDX-License-Identifier: MIT

//! Error types for the dispatch engine.

use dispatch_adapters::{
    ElementError, InboxError, NotificationError, SessionManagerError, SettingsError,
    WorktreeError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("element store error: {0}")]
    Element(#[from] ElementError),
    #[error("session manager error: {0}")]
    Session(#[from] SessionManagerError),
    #[error("worktree error: {0}")]
    Worktree(#[from] WorktreeError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("inbox error: {0}")]
    Inbox(#[from] InboxError),
    #[error("notification error: {0}")]
    Notification(#[from] NotificationError),
    #[error("no free agent available")]
    NoFreeAgent,
}
