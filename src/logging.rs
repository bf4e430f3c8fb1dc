//! Tracing subscriber setup.
//!
//! The engine itself only emits `tracing` events; installing a subscriber
//! is left to the embedding application. These helpers cover the common
//! cases.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global fmt subscriber.
///
/// # Environment
/// - `RUST_LOG`: filter directives (default: `info`),
///   e.g. `RUST_LOG=u_roster=debug`.
///
/// # Example
/// ```no_run
/// u_roster::logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// Installs a debug-level subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call takes effect.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
