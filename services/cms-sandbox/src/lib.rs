//! Shared plumbing for the command line tools: flag sets, connecting to the
//! destination, and the small bits of terminal interaction they all use.

use std::io::{BufRead, Write};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use cms_common::{init_tracing, redact_url, require_url};
use cms_database::PgStore;
use cms_source::Collection;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Flags every maintenance tool takes.
#[derive(Debug, Clone, Args)]
pub struct DestinationArgs {
    /// PostgreSQL connection string
    #[arg(short = 'p', long, env = "DATABASE_URL", hide_env_values = true)]
    pub postgres_url: Option<String>,

    /// Report what would change without writing anything
    #[arg(short, long)]
    pub dry_run: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl DestinationArgs {
    /// Installs logging and connects, failing if no URL was given.
    pub async fn connect(&self) -> Result<PgStore> {
        init_tracing(self.verbose)?;
        let url = require_url(self.postgres_url.clone(), "--postgres-url", "DATABASE_URL")?;
        connect_destination(&url).await
    }
}

/// Connects to PostgreSQL and logs the server it reached.
pub async fn connect_destination(url: &str) -> Result<PgStore> {
    info!("Connecting to {}", redact_url(url));
    let store = PgStore::connect(url)
        .await
        .with_context(|| format!("Failed to connect to {}", redact_url(url)))?;

    info!("Checking database connectivity...");
    let server = store
        .health_check()
        .await
        .context("Failed to connect to database")?;
    info!("Database health check passed:");
    info!("  Version: {}", server.version);
    info!("  Database: {}", server.database);
    info!("  User: {}", server.user);
    Ok(store)
}

/// Accepts a collection tag (`monthlyReports`) or any namespace spelling
/// the dump might use (`monthly_reports`, `reports`).
pub fn parse_collection(value: &str) -> Result<Collection, String> {
    Collection::from_str(value)
        .ok()
        .or_else(|| Collection::from_namespace(value))
        .ok_or_else(|| format!("unknown collection '{}'", value))
}

/// Asks the operator to type `CONFIRM`. Anything else cancels.
pub fn confirm(warning: &str, input: &mut impl BufRead) -> Result<bool> {
    println!("\n⚠️  WARNING: {}", warning);
    println!("\nType 'CONFIRM' to proceed:");
    std::io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim() == "CONFIRM")
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_string());
    pb
}

/// Prefix for summary lines of a dry run.
pub fn mode_label(dry_run: bool) -> &'static str {
    if dry_run {
        "[dry run] "
    } else {
        ""
    }
}
