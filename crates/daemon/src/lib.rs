// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Process-level wiring for the dispatch daemon: a `Daemon` handle over
//! `engine::PollCycleScheduler`, environment-driven configuration, and
//! `tracing` subscriber setup. No production adapters ship here; a host
//! binary supplies its own `ElementApi`/`SessionManager`/etc.
//! implementations and constructs a `Daemon` with them.

mod daemon;
mod env;
mod logging;

pub use daemon::Daemon;
pub use env::{load_config, load_config_from};
pub use logging::init as init_logging;
