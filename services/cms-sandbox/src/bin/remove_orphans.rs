//! Clears or deletes rows whose foreign keys point at rows that no longer
//! exist.

use anyhow::Result;
use clap::Parser;
use cms_common::load_dotenv;
use cms_migrator::maintenance::{default_orphan_rules, remove_orphans};
use cms_sandbox::{mode_label, DestinationArgs};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "remove_orphans", about = "Fix dangling foreign keys")]
struct Args {
    #[command(flatten)]
    destination: DestinationArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    let store = args.destination.connect().await?;

    let rules = default_orphan_rules();
    info!("🚀 Checking {} references", rules.len());
    let summary = remove_orphans(&store, &rules, args.destination.dry_run).await?;

    info!("{}", "=".repeat(60));
    for (reference, count) in summary.per_rule.iter().filter(|(_, n)| *n > 0) {
        info!("  {:<40} {:>6} orphans", reference, count);
    }
    info!(
        "{}{} rows checked, {} references cleared, {} rows deleted",
        mode_label(args.destination.dry_run),
        summary.checked,
        summary.nulled,
        summary.deleted
    );
    info!("{}", "=".repeat(60));
    Ok(())
}
