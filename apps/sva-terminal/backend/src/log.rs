//! Logging for the SVA terminal.
//!
//! The terminal uses the `tracing` library for logging. After calling
//! [`setup`], screen changes, rejected actions and biometric faults are
//! printed to `stdout`.
//!
//! You may use the `RUST_LOG` environment variable to configure logging at
//! runtime (see [`EnvFilter`][`tracing_subscriber::EnvFilter`]), e.g.
//! `RUST_LOG=sva_terminal=trace` to also see stale completions being dropped.

use tracing_subscriber::{prelude::*, util::SubscriberInitExt};

use crate::config::Config;

/// Sets up logging for the application. Call this early in the process
/// lifecycle to ensure logs are not silently ignored.
pub fn setup(config: &Config) -> color_eyre::Result<()> {
    color_eyre::install()?;
    let stdout_log = tracing_subscriber::fmt::layer().pretty();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_directive(config).parse()?)
                .from_env_lossy(),
        )
        .with(stdout_log)
        .init();
    Ok(())
}

fn default_directive(config: &Config) -> String {
    format!("sva_terminal={}", config.log_level)
}
