//! Tracing setup for processes embedding the scheduler core.

use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_DIRECTIVE: &str = "prometheus_event_scheduler=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_LOG_DIRECTIVE`]. Does nothing if a global subscriber already exists.
pub fn init_tracing() {
    init_tracing_with(DEFAULT_LOG_DIRECTIVE);
}

/// Same as [`init_tracing`] with a caller-chosen fallback directive.
pub fn init_tracing_with(default_directive: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
