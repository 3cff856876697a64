//! Structured logging setup.
//!
//! The library itself only emits `tracing` events. Applications call
//! [`init_logging`] once at startup to install a formatter for them.
//! `RUST_LOG` directives, when set, take precedence over the configured level.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Build the filter for `config`, honouring `RUST_LOG`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy()
}

/// Install the global subscriber.
///
/// Fails with `ConfigError` if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| {
        ProtocolError::ConfigError(format!("Failed to install logging subscriber: {e}"))
    })?;

    tracing::info!(app = %config.app_name, level = %config.log_level, "logging initialized");
    Ok(())
}
