//! Logging setup for applications embedding the console.

use anyhow::{anyhow, Context};
use tracing_subscriber::EnvFilter;

/// Install a `tracing` fmt subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Fails if `level` is not a valid
/// filter or a global subscriber is already installed.
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{level}'"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::debug!("Logging initialised at '{}'", level);
    Ok(())
}
