use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber used by every binary.
///
/// `verbose` raises the default level from INFO to DEBUG; `RUST_LOG`, when
/// set, takes precedence over both.
pub fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},sqlx=warn,mongodb=warn")));

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}
