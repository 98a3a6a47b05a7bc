//! Process-wide logging setup for embedders that don't bring their own
//! subscriber.
//!
//! Entirely optional: every module emits through `tracing`, so an
//! application with its own subscriber configuration should skip this and
//! install what it needs.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set.
pub fn init() {
    init_with_filter(EnvFilter::from_default_env());
}

/// Install a formatting subscriber with an explicit filter.
pub fn init_with_filter(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
