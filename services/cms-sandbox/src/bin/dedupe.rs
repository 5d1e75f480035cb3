//! Removes duplicate rows left by earlier migrations, keeping the oldest
//! row of each key and pointing references at it.

use anyhow::Result;
use clap::Parser;
use cms_common::load_dotenv;
use cms_migrator::maintenance::{dedupe, default_dedupe_rules};
use cms_sandbox::{mode_label, DestinationArgs};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "dedupe", about = "Remove duplicate users, students, industries and reports")]
struct Args {
    #[command(flatten)]
    destination: DestinationArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    let store = args.destination.connect().await?;

    info!("🚀 Looking for duplicates");
    let summary = dedupe(&store, &default_dedupe_rules(), args.destination.dry_run).await?;

    info!("{}", "=".repeat(60));
    for (table, count) in &summary.per_table {
        info!("  {:<24} {:>6} duplicates", table, count);
    }
    info!(
        "{}{} duplicates, {} references repointed, {} rows deleted",
        mode_label(args.destination.dry_run),
        summary.duplicates,
        summary.repointed,
        summary.deleted
    );
    info!("{}", "=".repeat(60));
    Ok(())
}
