//! Log subscriber setup for test binaries and demos.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the caller. These helpers read `RUST_LOG` and fall back to the given
//! filter, writing to stderr so test output stays readable.

use tracing_subscriber::EnvFilter;

fn filter_or(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install a human-readable subscriber.
///
/// Returns `false` when a global subscriber was already installed, so calling
/// this from several tests is harmless.
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter_or(default_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Install a JSON subscriber, one object per event
pub fn init_tracing_json(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter_or(default_filter))
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
