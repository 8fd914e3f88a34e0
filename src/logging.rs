//! Structured logging setup.
//!
//! The library itself only emits `tracing` events. Applications that do not
//! install their own subscriber can call [`init`].

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Installs a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `config.filter`.
///
/// Returns `false` if a global subscriber was already set.
pub fn init(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(false)
        .try_init()
        .is_ok()
}
