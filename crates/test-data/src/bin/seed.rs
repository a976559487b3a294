//! Seeds (or cleans) the tinybots fixture data.
//!
//! Run with:
//! ```
//! cargo run -p test-data --bin seed -- --scope=ci
//! cargo run -p test-data --bin seed -- --scope=micro-manager-triggered
//! cargo run -p test-data --bin seed -- --clean
//! ```

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use test_data::prelude::*;

#[derive(Debug, Parser)]
#[command(author, version, about = "Seed fixture data into the tinybots database")]
struct Args {
    /// Run label used to namespace generated names
    #[arg(long, default_value = "")]
    scope: String,

    /// Delete every fixture row instead of seeding
    #[arg(long, conflicts_with = "dry_run")]
    clean: bool,

    /// Describe the units that would run without touching the database
    #[arg(long)]
    dry_run: bool,

    /// Apply the bundled schema migrations first
    #[arg(long)]
    migrate: bool,
}

impl Args {
    fn mode(&self) -> Mode {
        if self.clean {
            Mode::Clean
        } else if self.dry_run {
            Mode::DryRun
        } else {
            Mode::Seed
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = SeedConfig::from_env()?;
    let mode = args.mode();

    let ctx = open_context(&config, &args.scope, args.migrate).await?;

    let executions = config.executions.clone();
    let snapshot = ctx
        .scoped(move |ctx| Box::pin(async move { execute(ctx, mode, &executions).await }))
        .await?;

    if let Some(snapshot) = snapshot {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    info!("Seed {:?} completed", mode);

    Ok(())
}
