//! Creates the default institution, the system administrator and the
//! engineering department a fresh destination needs.

use anyhow::Result;
use clap::Parser;
use cms_common::{get_current_timestamp, load_dotenv};
use cms_migrator::maintenance::{seed, SeedConfig};
use cms_sandbox::{mode_label, DestinationArgs};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Insert the rows a fresh CMS database needs")]
struct Args {
    #[command(flatten)]
    destination: DestinationArgs,

    /// E-mail of the system administrator
    #[arg(long, env = "SEED_ADMIN_EMAIL")]
    admin_email: String,

    /// Password hash stored for the administrator, as the CMS expects it
    #[arg(long, env = "SEED_ADMIN_PASSWORD_HASH", hide_env_values = true)]
    admin_password_hash: String,

    #[arg(long, env = "SEED_INSTITUTION_NAME")]
    institution_name: Option<String>,

    #[arg(long, env = "SEED_INSTITUTION_CODE")]
    institution_code: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    let store = args.destination.connect().await?;

    let mut config = SeedConfig::new(&args.admin_email, &args.admin_password_hash);
    if let Some(name) = args.institution_name {
        config.institution_name = name;
    }
    if let Some(code) = args.institution_code {
        config.institution_code = code;
    }

    info!("🚀 Seeding {}", config.institution_code);
    let summary = seed(&store, &config, args.destination.dry_run, get_current_timestamp()).await?;
    info!(
        "{}✅ {} rows created, {} already present",
        mode_label(args.destination.dry_run),
        summary.created.len(),
        summary.existing
    );
    Ok(())
}
