use clap::Subcommand;
use huetag_pipeline::{TagStore, TaggingService};

/// Sub-commands available under `tag`.
#[derive(Debug, Subcommand)]
pub enum TagCommands {
    /// Show the current run, seed coverage and stored result count
    Status,
    /// Tag every seed still missing a provider result in the current run
    Sweep,
    /// Print every stored result and the consensus for one seed
    Show {
        /// Palette seed identifier
        seed: String,
    },
}

/// # Errors
///
/// Returns an error if the status cannot be loaded from the store.
pub(crate) async fn run_tag_status<S: TagStore>(
    service: &TaggingService<S>,
) -> anyhow::Result<()> {
    let status = service.tagging_status().await?;

    println!("prompt version: {}", status.prompt_version);
    println!("run:            {}", status.run_number);
    println!("{:<12} {:>10}", "seeds", status.total_seeds);
    println!("{:<12} {:>10}", "completed", status.completed);
    println!("{:<12} {:>10}", "pending", status.pending);
    println!("{:<12} {:>10}", "results", status.total_results);

    Ok(())
}

/// # Errors
///
/// Returns an error if the sweep cannot plan its run or write to the store.
/// Individual provider failures are recorded, not returned.
pub(crate) async fn run_tag_sweep<S: TagStore>(service: &TaggingService<S>) -> anyhow::Result<()> {
    let report = service.generate_tags().await?;

    println!(
        "run {} ({}): {} seeds processed, {} results stored, {} failures",
        report.run_number,
        report.prompt_version,
        report.seeds_processed,
        report.results_stored,
        report.failures
    );

    Ok(())
}

/// # Errors
///
/// Returns an error if the results cannot be loaded or serialized.
pub(crate) async fn run_tag_show<S: TagStore>(
    service: &TaggingService<S>,
    seed: &str,
) -> anyhow::Result<()> {
    let results = service.results_for_seed(seed).await?;

    if results.runs.is_empty() {
        println!(
            "no results for {seed} under prompt version {}",
            results.prompt_version
        );
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
