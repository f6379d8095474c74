// SPDX-License-Identifier: MIT

//! Subscriber initialization (spec.md §2 addendum). One call, made once by
//! whatever process embeds this crate; the daemon itself never reaches for
//! `tracing`'s global subscriber elsewhere.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a `tracing-subscriber` registry writing to stdout, filtered by
/// `RUST_LOG` and defaulting to `info` when unset.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
