//! Tracing setup shared by the rehab binary and the core tests.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging for the command line
///
/// Log lines go to:
/// - stderr, leaving stdout to command output
/// - a compact formatter, filtered by RUST_LOG
///
/// Without RUST_LOG only warnings and errors are shown.
pub fn init() {
    init_with_level("warn")
}

/// Initialize logging with `default_level` unless RUST_LOG is set
///
/// A second call is a no-op.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

/// Debug-level logging routed through the test harness
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
