//! Structured logging setup.
//!
//! The framework only emits `tracing` events; installing a subscriber is up
//! to the binary. [`init`] installs one suited to Lambda: no timestamps
//! (CloudWatch adds its own), no module targets, plain text or JSON lines.
//! `RUST_LOG`, when set, wins over the configured level.

use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogConfig, LogFormat};

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer().with_target(false).without_time();
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    }
}
