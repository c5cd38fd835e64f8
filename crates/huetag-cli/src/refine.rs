use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use huetag_pipeline::{CorrelationMap, TagStore, TaggingService};

/// Sub-commands available under `refine`.
#[derive(Debug, Subcommand)]
pub enum RefineCommands {
    /// Show refinement coverage for the current tagging prompt version
    Status,
    /// Refine one seed synchronously
    Seed {
        /// Palette seed identifier
        seed: String,
        /// Tagging prompt version to build consensus from (defaults to current)
        #[arg(long)]
        source_version: Option<String>,
    },
    /// Print the latest stored refinement for a seed
    Show {
        /// Palette seed identifier
        seed: String,
    },
    /// Submit pending seeds as one message batch
    BatchStart {
        /// Maximum number of seeds to include
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
    /// Show processing status of a submitted batch
    BatchStatus {
        /// Batch identifier returned by `batch-start`
        batch_id: String,
    },
    /// Download and store results of an ended batch
    BatchProcess {
        /// Batch identifier returned by `batch-start`
        batch_id: String,
        /// JSON file mapping custom ids to seeds; overrides the stored map
        #[arg(long)]
        map: Option<PathBuf>,
    },
}

pub(crate) async fn dispatch<S: TagStore>(
    service: &TaggingService<S>,
    command: RefineCommands,
) -> anyhow::Result<()> {
    match command {
        RefineCommands::Status => run_refine_status(service).await,
        RefineCommands::Seed {
            seed,
            source_version,
        } => run_refine_seed(service, &seed, source_version.as_deref()).await,
        RefineCommands::Show { seed } => run_refine_show(service, &seed).await,
        RefineCommands::BatchStart { limit } => run_batch_start(service, limit).await,
        RefineCommands::BatchStatus { batch_id } => run_batch_status(service, &batch_id).await,
        RefineCommands::BatchProcess { batch_id, map } => {
            run_batch_process(service, &batch_id, map.as_deref()).await
        }
    }
}

async fn run_refine_status<S: TagStore>(service: &TaggingService<S>) -> anyhow::Result<()> {
    let status = service.refinement_status().await?;

    println!(
        "source {} -> refinement {} ({})",
        status.source_prompt_version, status.refinement_prompt_version, status.model
    );
    println!("{:<12} {:>10}", "tagged", status.tagged_seeds);
    println!("{:<12} {:>10}", "refined", status.refined);
    println!("{:<12} {:>10}", "errors", status.errors);
    println!("{:<12} {:>10}", "pending", status.pending);

    Ok(())
}

async fn run_refine_seed<S: TagStore>(
    service: &TaggingService<S>,
    seed: &str,
    source_version: Option<&str>,
) -> anyhow::Result<()> {
    let outcome = service.refine_single(seed, source_version).await?;
    if let Some(error) = &outcome.error {
        tracing::warn!(seed, error = %error, "refinement stored as error");
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run_refine_show<S: TagStore>(
    service: &TaggingService<S>,
    seed: &str,
) -> anyhow::Result<()> {
    let row = service.refinement_result(seed).await?;
    println!("{}", serde_json::to_string_pretty(&row)?);
    Ok(())
}

async fn run_batch_start<S: TagStore>(
    service: &TaggingService<S>,
    limit: u32,
) -> anyhow::Result<()> {
    let submission = service.start_batch_refinement(limit).await?;

    println!(
        "submitted batch {} with {} requests (source {})",
        submission.batch_id,
        submission.correlation_map.len(),
        submission.source_prompt_version
    );
    if !submission.persisted {
        println!("warning: batch record not saved; pass this map to batch-process --map");
    }
    println!("{}", serde_json::to_string_pretty(&submission.correlation_map)?);

    Ok(())
}

async fn run_batch_status<S: TagStore>(
    service: &TaggingService<S>,
    batch_id: &str,
) -> anyhow::Result<()> {
    let status = service.batch_status(batch_id).await?;
    let counts = &status.request_counts;

    println!("batch {}: {}", status.id, status.processing_status);
    println!("{:<12} {:>8}", "processing", counts.processing);
    println!("{:<12} {:>8}", "succeeded", counts.succeeded);
    println!("{:<12} {:>8}", "errored", counts.errored);
    println!("{:<12} {:>8}", "canceled", counts.canceled);
    println!("{:<12} {:>8}", "expired", counts.expired);

    Ok(())
}

/// Load a correlation map written by `batch-start` or by hand.
pub(crate) async fn read_correlation_map(path: &Path) -> anyhow::Result<CorrelationMap> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read correlation map {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid correlation map in {}", path.display()))
}

async fn run_batch_process<S: TagStore>(
    service: &TaggingService<S>,
    batch_id: &str,
    map_path: Option<&Path>,
) -> anyhow::Result<()> {
    let map = match map_path {
        Some(path) => Some(read_correlation_map(path).await?),
        None => None,
    };
    let report = service.process_batch_results(batch_id, map).await?;

    println!(
        "batch {}: {} stored, {} errors, {} skipped",
        report.batch_id, report.stored, report.errors, report.skipped
    );

    Ok(())
}
