//! Moves the CMS out of MongoDB and into PostgreSQL.
//!
//! The source is either a `mongodump --archive` file (`--backup`) or a live
//! MongoDB (`--mongodb-url`). Every document is classified into one of the
//! CMS collections, then the entity migrators run in dependency order.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cms_common::{init_tracing, load_dotenv, redact_url, require_url};
use cms_database::{DestinationStore, MemoryStore};
use cms_migrator::{entities, Executor, ExecutorOptions, MigrationContext, MigrationPlan};
use cms_sandbox::{connect_destination, parse_collection, spinner};
use cms_source::{read_archive, Classifier, Collection, CollectionStore, MongoSource};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "migrate", about = "Migrate the CMS from MongoDB to PostgreSQL")]
struct Args {
    /// Path to a mongodump archive (gzip or raw)
    #[arg(short = 'b', long)]
    backup: Option<PathBuf>,

    /// Read from a running MongoDB instead of a dump
    #[arg(short = 'm', long, env = "MONGODB_URL", hide_env_values = true)]
    mongodb_url: Option<String>,

    /// Database to read when the MongoDB URL names none
    #[arg(long, env = "MONGODB_DATABASE")]
    mongodb_database: Option<String>,

    /// PostgreSQL connection string
    #[arg(short = 'p', long, env = "DATABASE_URL", hide_env_values = true)]
    postgres_url: Option<String>,

    /// Classify and count, but write nothing
    #[arg(short, long)]
    dry_run: bool,

    /// Log at debug level and print every skipped record
    #[arg(short, long)]
    verbose: bool,

    /// Keep rows already in the destination tables
    #[arg(short, long)]
    skip_clear: bool,

    /// Cursor batch size when reading a live MongoDB
    #[arg(long, default_value_t = 500)]
    batch_size: u32,

    /// Failures listed in the final report
    #[arg(long, default_value_t = 25)]
    max_errors: usize,

    /// Write every failure to this file as JSON
    #[arg(long)]
    failures_out: Option<PathBuf>,

    /// Migrate only these collections (repeatable)
    #[arg(long = "only", value_name = "COLLECTION", value_parser = parse_collection)]
    only: Vec<Collection>,
}

async fn load_source(args: &Args, classifier: &Classifier) -> Result<CollectionStore> {
    if let Some(path) = &args.backup {
        if args.mongodb_url.is_some() {
            warn!("Both a backup and a MongoDB URL were given; reading {}", path.display());
        }
        info!("📦 Reading archive {}", path.display());
        let buf = read_archive(path)?;
        let pb = spinner(&format!("Scanning {} bytes", buf.len()));
        let store = CollectionStore::from_archive(&buf, classifier);
        pb.finish_and_clear();
        return Ok(store);
    }

    let url = require_url(args.mongodb_url.clone(), "--backup or --mongodb-url", "MONGODB_URL")?;
    info!("Connecting to {}", redact_url(&url));
    let mongo = MongoSource::connect(&url, args.mongodb_database.as_deref())
        .await
        .context("Failed to connect to MongoDB")?;
    let pb = spinner(&format!("Reading {}", mongo.database_name()));
    let store = mongo.load(classifier, args.batch_size).await;
    pb.finish_and_clear();
    Ok(store?)
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    init_tracing(args.verbose)?;
    let overall_start = Instant::now();

    info!("🚀 Starting CMS migration{}", if args.dry_run { " (dry run)" } else { "" });
    if args.backup.is_none() && args.mongodb_url.is_none() {
        bail!("No source given: pass --backup <path> or --mongodb-url (or set MONGODB_URL)");
    }

    // A dry run never touches the destination, so it may run without one.
    let destination: Box<dyn DestinationStore> = match (&args.postgres_url, args.dry_run) {
        (None, true) => {
            warn!("No DATABASE_URL given; planning without a destination");
            Box::new(MemoryStore::new())
        }
        _ => {
            let url = require_url(args.postgres_url.clone(), "--postgres-url", "DATABASE_URL")?;
            Box::new(connect_destination(&url).await?)
        }
    };

    let source = load_source(&args, &Classifier::default()).await?;
    info!("✅ Loaded {} documents", source.len());
    for (collection, count) in source.counts() {
        info!("   {:<24} {:>8}", collection.as_str(), count);
    }
    source.unidentified().log_summary(10);

    let plan = if args.only.is_empty() {
        MigrationPlan::new(entities::all())?
    } else {
        MigrationPlan::select(entities::all(), &args.only)?
    };
    info!(
        "📋 Migration order: {}",
        plan.collections().iter().map(|c| c.as_str()).collect::<Vec<_>>().join(" → ")
    );

    let options = ExecutorOptions {
        dry_run: args.dry_run,
        skip_clear: args.skip_clear,
        progress: true,
        verbose: args.verbose,
    };
    let mut ctx = MigrationContext::default();
    let report = Executor::new(destination.as_ref(), options)
        .run(&plan, &source, &mut ctx)
        .await?;

    let colour = colored::control::SHOULD_COLORIZE.should_colorize();
    println!("{}", report.render(args.max_errors, colour));

    if let Some(path) = &args.failures_out {
        report.write_failures(path)?;
    }

    let totals = report.totals();
    if report.has_errors() {
        warn!("⚠️  Finished with {} failed records", totals.errors);
    } else {
        info!("✅ Migration finished");
    }
    info!("Total time: {:.2?}", overall_start.elapsed());
    Ok(())
}
