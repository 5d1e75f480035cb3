use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use cms_common::load_dotenv;
use cms_database::{schema, DestinationStore};
use cms_sandbox::{confirm, DestinationArgs};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "reset_db", about = "Empty every CMS table")]
struct Args {
    #[command(flatten)]
    destination: DestinationArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    let store = args.destination.connect().await?;

    for table in schema::ALL_TABLES {
        let rows = store
            .count(table)
            .await
            .with_context(|| format!("Failed to count {}", table))?;
        info!("  {:<28} {:>8} rows", table, rows);
    }

    if args.destination.dry_run {
        info!("[dry run] would truncate {} tables", schema::ALL_TABLES.len());
        return Ok(());
    }

    if !args.yes {
        let warning = format!("this empties all {} CMS tables!", schema::ALL_TABLES.len());
        if !confirm(&warning, &mut std::io::stdin().lock())? {
            info!("Reset cancelled by user");
            return Ok(());
        }
    }

    let started = Instant::now();
    let mut tables: Vec<&str> = schema::ALL_TABLES.to_vec();
    tables.reverse();
    store.truncate(&tables).await.context("Failed to truncate tables")?;
    info!("✅ Database reset in {:.2?}", started.elapsed());
    Ok(())
}
