//! Run-number derivation and pending-seed planning.
//!
//! Nothing here keeps state between calls: the plan is recomputed from the
//! store every time, which makes sweeps resumable after a crash at provider
//! granularity.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::error::PipelineError;
use crate::store::TagStore;

/// A seed that still needs results from some providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSeed {
    pub seed: String,
    /// Configured providers with no result yet for this run.
    pub missing_providers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    pub run_number: i32,
    pub pending: Vec<PendingSeed>,
}

/// Providers already recorded per seed for one `(run, version)`.
pub type CompletedProviders = HashMap<String, BTreeSet<String>>;

/// The run a version's results belong to: its latest run, or one past the
/// global maximum when the version has no results yet.
#[must_use]
pub fn current_run(max_for_version: i32, max_overall: i32) -> i32 {
    if max_for_version == 0 {
        max_overall + 1
    } else {
        max_for_version
    }
}

/// Seeds lacking a result from at least one of `providers`, in seed order.
#[must_use]
pub fn pending_seeds(
    seeds: &[String],
    completed: &CompletedProviders,
    providers: &[&str],
) -> Vec<PendingSeed> {
    seeds
        .iter()
        .filter_map(|seed| {
            let done = completed.get(seed);
            let missing: Vec<String> = providers
                .iter()
                .filter(|p| done.is_none_or(|d| !d.contains(**p)))
                .map(|p| (*p).to_owned())
                .collect();
            (!missing.is_empty()).then(|| PendingSeed {
                seed: seed.clone(),
                missing_providers: missing,
            })
        })
        .collect()
}

/// Plan the next sweep for `run_number`.
///
/// When every seed is already fully tagged the sweep moves on to
/// `run_number + 1` with all seeds and all providers pending. An empty seed
/// registry never advances the run.
#[must_use]
pub fn plan_run(
    run_number: i32,
    seeds: &[String],
    completed: &CompletedProviders,
    providers: &[&str],
) -> RunPlan {
    let pending = pending_seeds(seeds, completed, providers);
    if pending.is_empty() && !seeds.is_empty() {
        return RunPlan {
            run_number: run_number + 1,
            pending: pending_seeds(seeds, &CompletedProviders::new(), providers),
        };
    }
    RunPlan {
        run_number,
        pending,
    }
}

/// Store-derived inputs for one planning pass.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub run_number: i32,
    pub seeds: Vec<String>,
    pub completed: CompletedProviders,
}

/// Read the current run, known seeds and completed providers from the store.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if any store query fails.
pub async fn load_snapshot(
    store: &dyn TagStore,
    prompt_version: &str,
) -> Result<RunSnapshot, PipelineError> {
    let max_for_version = store.max_run_number(Some(prompt_version)).await?;
    let max_overall = store.max_run_number(None).await?;
    let run_number = current_run(max_for_version, max_overall);

    let seeds = store.list_seeds().await?;
    let mut completed = CompletedProviders::new();
    for (seed, provider) in store
        .list_completed_providers(run_number, prompt_version)
        .await?
    {
        completed.entry(seed).or_default().insert(provider);
    }

    Ok(RunSnapshot {
        run_number,
        seeds,
        completed,
    })
}
