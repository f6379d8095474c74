// SPDX-License-Identifier: MIT

//! `ExecutableResolver` — chooses an agent's executable, walking the
//! fallback chain when the preferred one is limited (spec.md §4.2).

use crate::rate_limit::RateLimitTracker;
use dispatch_adapters::{SettingsError, SettingsService};
use dispatch_core::{Agent, ResolvedExecutable};
use std::sync::Arc;

pub struct ExecutableResolver<S: SettingsService> {
    settings: S,
    tracker: Arc<RateLimitTracker>,
}

impl<S: SettingsService> ExecutableResolver<S> {
    pub fn new(settings: S, tracker: Arc<RateLimitTracker>) -> Self {
        Self { settings, tracker }
    }

    /// The fallback chain as currently configured, or empty if unavailable
    /// (configuration errors are treated conservatively, spec.md §7 item 5).
    pub async fn chain(&self) -> dispatch_core::FallbackChain {
        self.settings.fallback_chain().await.unwrap_or_default()
    }

    /// Resolve `agent`'s executable. Configuration errors (missing
    /// fallback chain) are treated conservatively as `AllLimited` rather
    /// than surfaced, per spec.md §7 item 5.
    pub async fn resolve(&self, agent: &Agent) -> ResolvedExecutable {
        let chain = match self.settings.fallback_chain().await {
            Ok(chain) => chain,
            Err(SettingsError::Unavailable(_)) => return ResolvedExecutable::AllLimited,
        };

        if !self.tracker.is_limited(&agent.preferred_executable) {
            return ResolvedExecutable::Use(agent.preferred_executable.clone());
        }

        for executable in &chain {
            if !self.tracker.is_limited(executable) {
                return ResolvedExecutable::Use(executable.clone());
            }
        }

        ResolvedExecutable::AllLimited
    }
}

#[cfg(test)]
#[path = "executable_resolver_tests.rs"]
mod tests;
