mod refine;
mod seeds;
mod tag;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use huetag_pipeline::{PgStore, PipelineSettings, TaggingService};
use tracing_subscriber::EnvFilter;

use crate::refine::RefineCommands;
use crate::seeds::SeedsCommands;
use crate::tag::TagCommands;

#[derive(Debug, Parser)]
#[command(name = "huetag-cli")]
#[command(about = "Palette tagging and refinement command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Manage the palette seed registry
    Seeds {
        #[command(subcommand)]
        command: SeedsCommands,
    },
    /// Multi-provider tagging sweeps
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Consensus refinement, single seed or batch
    Refine {
        #[command(subcommand)]
        command: RefineCommands,
    },
}

fn init_tracing() -> anyhow::Result<()> {
    let fallback = std::env::var("HUETAG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

/// Wire the pipeline to Postgres and the configured providers.
///
/// # Errors
///
/// Returns an error if configuration is invalid, a provider credential is
/// missing, or the database is unreachable.
async fn build_service() -> anyhow::Result<TaggingService<PgStore>> {
    let config = huetag_core::load_app_config()?;
    let pool_config = huetag_db::PoolConfig::from_app_config(&config);
    let pool = huetag_db::connect_pool(&config.database_url, pool_config).await?;

    Ok(TaggingService::new(
        PgStore::new(pool),
        huetag_providers::build_tag_providers(&config)?,
        Arc::new(huetag_providers::build_refiner(&config)?),
        Arc::new(huetag_providers::build_batch_client(&config)?),
        PipelineSettings::from_app_config(&config),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Migrate) => {
            let pool = huetag_db::connect_pool_from_env().await?;
            let applied = huetag_db::run_migrations(&pool).await?;
            println!("migrations applied: {applied}");
        }
        Some(Commands::Seeds { command }) => {
            let pool = huetag_db::connect_pool_from_env().await?;
            match command {
                SeedsCommands::Import { path } => seeds::run_seeds_import(&pool, &path).await?,
            }
        }
        Some(Commands::Tag { command }) => {
            let service = build_service().await?;
            match command {
                TagCommands::Status => tag::run_tag_status(&service).await?,
                TagCommands::Sweep => tag::run_tag_sweep(&service).await?,
                TagCommands::Show { seed } => tag::run_tag_show(&service, &seed).await?,
            }
        }
        Some(Commands::Refine { command }) => {
            let service = build_service().await?;
            refine::dispatch(&service, command).await?;
        }
        None => println!("huetag-cli: run with --help for available commands"),
    }

    Ok(())
}
