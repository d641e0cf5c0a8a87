//! Subscriber setup for `tracing` output
//!
//! The engine only emits events; hosts decide where they go. `RUST_LOG`
//! overrides the default `info` filter in both helpers.

use crate::result::{LinecovError, LinecovResult};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a global subscriber writing compact text or JSON lines to stderr
///
/// # Errors
///
/// Returns error if a global subscriber is already installed
pub fn init_logging(json: bool) -> LinecovResult<()> {
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
    });
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter())
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| LinecovError::Logging {
            message: e.to_string(),
        })
}

/// Initialize logging for tests
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_test_writer()
                .compact(),
        )
        .try_init();
}
