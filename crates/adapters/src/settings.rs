// SPDX-License-Identifier: MIT

//! `SettingsService` — supplies the fallback chain and per-provider default
//! executables (spec.md §6). Backed by whatever configuration store the
//! host platform uses; out of scope here.

use async_trait::async_trait;
use dispatch_core::FallbackChain;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SettingsService: Clone + Send + Sync + 'static {
    async fn fallback_chain(&self) -> Result<FallbackChain, SettingsError>;

    /// The default executable for a provider, if configured.
    async fn default_executable(&self, provider: &str) -> Result<Option<String>, SettingsError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct FakeSettingsState {
        chain: FallbackChain,
        defaults: HashMap<String, String>,
    }

    #[derive(Clone)]
    pub struct FakeSettingsService {
        inner: Arc<Mutex<FakeSettingsState>>,
    }

    impl Default for FakeSettingsService {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeSettingsState {
                    chain: Vec::new(),
                    defaults: HashMap::new(),
                })),
            }
        }
    }

    impl FakeSettingsService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_chain(chain: FallbackChain) -> Self {
            let s = Self::new();
            s.set_chain(chain);
            s
        }

        pub fn set_chain(&self, chain: FallbackChain) {
            self.inner.lock().chain = chain;
        }

        pub fn set_default(&self, provider: impl Into<String>, executable: impl Into<String>) {
            self.inner
                .lock()
                .defaults
                .insert(provider.into(), executable.into());
        }
    }

    #[async_trait]
    impl SettingsService for FakeSettingsService {
        async fn fallback_chain(&self) -> Result<FallbackChain, SettingsError> {
            Ok(self.inner.lock().chain.clone())
        }

        async fn default_executable(&self, provider: &str) -> Result<Option<String>, SettingsError> {
            Ok(self.inner.lock().defaults.get(provider).cloned())
        }
    }

    #[cfg(test)]
    #[path = "settings_tests.rs"]
    mod tests;
}
