use anyhow::Result;
use clap::Parser;
use cms_common::load_dotenv;
use cms_migrator::maintenance::normalize_branches;
use cms_sandbox::{mode_label, DestinationArgs};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "normalize_branches",
    about = "Rename branches to their canonical names and merge duplicates"
)]
struct Args {
    #[command(flatten)]
    destination: DestinationArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    let store = args.destination.connect().await?;

    info!("🚀 Normalizing branch names");
    let summary = normalize_branches(&store, args.destination.dry_run).await?;
    info!(
        "{}✅ {} branches examined: {} renamed, {} merged, {} references repointed",
        mode_label(args.destination.dry_run),
        summary.examined,
        summary.renamed,
        summary.merged,
        summary.repointed
    );
    Ok(())
}
