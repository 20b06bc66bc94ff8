// SPDX-License-Identifier: Apache-2.0

//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber. Safe to call more than once; later
/// calls are no-ops. Filter defaults to `biquery=info`, overridable via
/// `RUST_LOG`.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("biquery=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
