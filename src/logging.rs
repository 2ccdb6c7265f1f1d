//! Structured logging setup.
//!
//! The container logs through [`tracing`] and never installs a subscriber by
//! itself. Applications that don't have one yet can call [`try_init`].

use crate::BoxError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Installs a global subscriber that prints to stdout. The filter is read
/// from `RUST_LOG`, falling back to `default_directive` (for example
/// `"runtime_container=info"`).
///
/// Fails if the directive is malformed or a global subscriber is already
/// installed.
pub fn try_init(default_directive: &str) -> Result<(), BoxError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)?,
    };
    let stdout = fmt::layer()
        .with_target(true)
        .with_thread_names(true);
    Registry::default().with(filter).with(stdout).try_init()?;
    Ok(())
}

/// Installs a subscriber that writes through the test harness, so output is
/// only shown for failing tests. Does nothing if one is already installed.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("runtime_container=debug"));
    let _ = Registry::default()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}
