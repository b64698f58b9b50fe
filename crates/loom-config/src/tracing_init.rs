// SPDX-License-Identifier: MIT
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Install a stderr `tracing` subscriber honouring `RUST_LOG` if set,
/// falling back to `filter` otherwise. Idempotent — a second call is a
/// harmless no-op if a subscriber is already installed.
pub fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(env_filter)
        .try_init();
}
