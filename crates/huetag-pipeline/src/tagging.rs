//! Tagging sweeps, status, and the per-seed results view.

use std::collections::BTreeMap;
use std::sync::Arc;

use huetag_core::{describe_seed, TAGGING_INSTRUCTIONS};
use huetag_db::{NewTagResult, TagResultRow};
use huetag_providers::TagProvider;
use serde::Serialize;

use crate::consensus::{aggregate, TagSummary};
use crate::error::PipelineError;
use crate::orchestrator::tag_with_providers;
use crate::runs::{load_snapshot, pending_seeds, plan_run};
use crate::service::TaggingService;
use crate::store::TagStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggingStatus {
    pub run_number: i32,
    pub prompt_version: String,
    pub total_seeds: usize,
    /// Seeds with a result from every configured provider in `run_number`.
    pub completed: usize,
    pub pending: usize,
    /// All result rows at this prompt version, across runs.
    pub total_results: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub run_number: i32,
    pub prompt_version: String,
    pub seeds_processed: usize,
    pub results_stored: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResults {
    pub run_number: i32,
    pub results: Vec<TagResultRow>,
}

/// Everything stored for one seed at the current prompt version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedResults {
    pub seed: String,
    pub prompt_version: String,
    pub runs: Vec<RunResults>,
    pub consensus: TagSummary,
}

impl<S: TagStore> TaggingService<S> {
    /// Progress of the current run at the active prompt version.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Db`] if a store query fails.
    pub async fn tagging_status(&self) -> Result<TaggingStatus, PipelineError> {
        let version = self.tagging_version.as_str();
        let snapshot = load_snapshot(&self.store, version).await?;
        let pending = pending_seeds(&snapshot.seeds, &snapshot.completed, &self.provider_names());
        let total_results = self.store.count_tag_results(version).await?;

        Ok(TaggingStatus {
            run_number: snapshot.run_number,
            prompt_version: version.to_owned(),
            total_seeds: snapshot.seeds.len(),
            completed: snapshot.seeds.len() - pending.len(),
            pending: pending.len(),
            total_results,
        })
    }

    /// Tag every pending seed, one seed at a time.
    ///
    /// Provider failures become error rows and never abort the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Db`] if planning or persisting fails.
    pub async fn generate_tags(&self) -> Result<SweepReport, PipelineError> {
        let version = self.tagging_version.as_str();
        let snapshot = load_snapshot(&self.store, version).await?;
        let plan = plan_run(
            snapshot.run_number,
            &snapshot.seeds,
            &snapshot.completed,
            &self.provider_names(),
        );

        tracing::info!(
            run = plan.run_number,
            prompt_version = version,
            pending = plan.pending.len(),
            "starting tagging sweep"
        );

        let mut report = SweepReport {
            run_number: plan.run_number,
            prompt_version: version.to_owned(),
            ..SweepReport::default()
        };

        for (index, pending) in plan.pending.iter().enumerate() {
            if index > 0 && !self.settings.inter_seed_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_seed_delay).await;
            }

            let providers: Vec<Arc<dyn TagProvider>> = self
                .providers
                .iter()
                .filter(|p| pending.missing_providers.iter().any(|m| m == p.name()))
                .cloned()
                .collect();
            let description = describe_seed(&pending.seed).to_prompt_text();
            let outcomes = tag_with_providers(
                &providers,
                &description,
                TAGGING_INSTRUCTIONS,
                self.settings.retry,
            )
            .await;

            for outcome in outcomes {
                let (tags, error) = match outcome.result {
                    Ok(tags) => (Some(serde_json::to_value(&tags)?), None),
                    Err(message) => {
                        tracing::warn!(
                            seed = %pending.seed,
                            provider = %outcome.provider,
                            error = %message,
                            "provider failed; recording error result"
                        );
                        report.failures += 1;
                        (None, Some(message))
                    }
                };
                self.store
                    .insert_tag_result(&NewTagResult {
                        seed: pending.seed.clone(),
                        provider: outcome.provider,
                        model: outcome.model,
                        run_number: plan.run_number,
                        prompt_version: version.to_owned(),
                        tags,
                        error,
                    })
                    .await?;
                report.results_stored += 1;
            }

            report.seeds_processed += 1;
            tracing::info!(
                seed = %pending.seed,
                run = plan.run_number,
                done = report.seeds_processed,
                total = plan.pending.len(),
                "seed tagged"
            );
        }

        Ok(report)
    }

    /// Stored results for `seed` grouped by run, plus the current consensus.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Db`] if the store query fails.
    pub async fn results_for_seed(&self, seed: &str) -> Result<SeedResults, PipelineError> {
        let version = self.tagging_version.as_str();
        let rows = self.store.list_tag_results_for_seed(seed, version).await?;
        let consensus = aggregate(&rows);

        let mut by_run: BTreeMap<i32, Vec<TagResultRow>> = BTreeMap::new();
        for row in rows {
            by_run.entry(row.run_number).or_default().push(row);
        }

        Ok(SeedResults {
            seed: seed.to_owned(),
            prompt_version: version.to_owned(),
            runs: by_run
                .into_iter()
                .map(|(run_number, results)| RunResults {
                    run_number,
                    results,
                })
                .collect(),
            consensus,
        })
    }
}
