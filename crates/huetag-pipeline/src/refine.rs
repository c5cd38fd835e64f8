//! Single-seed refinement and refinement status.

use huetag_core::{describe_seed, RefinedTags, REFINEMENT_INSTRUCTIONS};
use huetag_db::{NewRefinement, RefinementRow};
use serde::Serialize;

use crate::consensus::{aggregate, refinement_prompt, TagSummary, AUDIT_TOP_N};
use crate::error::PipelineError;
use crate::service::TaggingService;
use crate::store::TagStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefinementStatus {
    pub source_prompt_version: String,
    pub refinement_prompt_version: String,
    pub model: String,
    /// Seeds with at least one valid tag result at the source version.
    pub tagged_seeds: i64,
    pub refined: i64,
    pub errors: i64,
    pub pending: i64,
}

/// Result of one refinement attempt that was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefinementOutcome {
    pub id: i64,
    pub seed: String,
    pub source_prompt_version: String,
    pub tags: Option<RefinedTags>,
    pub error: Option<String>,
}

/// Consensus for `seed`, or [`PipelineError::NoValidTags`] when nothing valid is stored.
pub(crate) async fn load_summary(
    store: &dyn TagStore,
    seed: &str,
    source_version: &str,
) -> Result<TagSummary, PipelineError> {
    let rows = store.list_tag_results_for_seed(seed, source_version).await?;
    let summary = aggregate(&rows);
    if summary.total_valid_responses == 0 {
        return Err(PipelineError::NoValidTags {
            seed: seed.to_owned(),
            version: source_version.to_owned(),
        });
    }
    Ok(summary)
}

pub(crate) fn build_prompt(seed: &str, summary: &TagSummary) -> String {
    refinement_prompt(&describe_seed(seed).to_prompt_text(), summary)
}

/// Inputs for persisting one refinement row.
pub(crate) struct RefinementRecord<'a> {
    pub seed: &'a str,
    pub source_version: &'a str,
    pub refinement_version: &'a str,
    pub model: &'a str,
    pub summary: &'a TagSummary,
    pub batch_id: Option<&'a str>,
}

/// Persist a success or error row. `Ok(None)` means a row for
/// `(seed, source_version)` already existed.
pub(crate) async fn persist_refinement(
    store: &dyn TagStore,
    record: &RefinementRecord<'_>,
    result: Result<RefinedTags, String>,
) -> Result<Option<RefinementOutcome>, PipelineError> {
    let (tags, error) = match &result {
        Ok(tags) => (Some(serde_json::to_value(tags)?), None),
        Err(message) => (None, Some(message.clone())),
    };
    let inserted = store
        .insert_refinement(&NewRefinement {
            seed: record.seed.to_owned(),
            source_prompt_version: record.source_version.to_owned(),
            refinement_prompt_version: record.refinement_version.to_owned(),
            model: record.model.to_owned(),
            tags,
            error,
            consensus: serde_json::to_value(record.summary.trimmed(AUDIT_TOP_N))?,
            batch_id: record.batch_id.map(str::to_owned),
        })
        .await?;

    Ok(inserted.map(|id| {
        let (tags, error) = match result {
            Ok(tags) => (Some(tags), None),
            Err(message) => (None, Some(message)),
        };
        RefinementOutcome {
            id,
            seed: record.seed.to_owned(),
            source_prompt_version: record.source_version.to_owned(),
            tags,
            error,
        }
    }))
}

impl<S: TagStore> TaggingService<S> {
    /// Counts of refined and failed seeds at the current tagging version.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Db`] if a store query fails.
    pub async fn refinement_status(&self) -> Result<RefinementStatus, PipelineError> {
        let version = self.tagging_version.as_str();
        let tagged_seeds = self.store.count_seeds_with_valid_tags(version).await?;
        let counts = self.store.count_refinements(version).await?;

        Ok(RefinementStatus {
            source_prompt_version: version.to_owned(),
            refinement_prompt_version: self.refinement_version.to_string(),
            model: self.refiner.model().to_owned(),
            tagged_seeds,
            refined: counts.refined,
            errors: counts.errors,
            pending: (tagged_seeds - counts.refined - counts.errors).max(0),
        })
    }

    /// Refine one seed synchronously.
    ///
    /// `source_version` defaults to the active tagging version. A model or
    /// validation failure is stored as an error row and returned as `Ok`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::DuplicateRefinement`] if the seed was already refined
    ///   at that version.
    /// - [`PipelineError::NoValidTags`] if no valid tags exist at that version.
    /// - [`PipelineError::Db`] on store failures.
    pub async fn refine_single(
        &self,
        seed: &str,
        source_version: Option<&str>,
    ) -> Result<RefinementOutcome, PipelineError> {
        let source_version = source_version.unwrap_or(self.tagging_version.as_str());
        let duplicate = || PipelineError::DuplicateRefinement {
            seed: seed.to_owned(),
            version: source_version.to_owned(),
        };

        if self.store.refinement_exists(seed, source_version).await? {
            return Err(duplicate());
        }
        let summary = load_summary(&self.store, seed, source_version).await?;
        let prompt = build_prompt(seed, &summary);

        let result = self
            .refiner
            .curate(&prompt, REFINEMENT_INSTRUCTIONS)
            .await
            .map_err(|e| {
                tracing::warn!(seed, error = %e, "refinement failed; recording error");
                e.to_string()
            });

        let record = RefinementRecord {
            seed,
            source_version,
            refinement_version: self.refinement_version.as_str(),
            model: self.refiner.model(),
            summary: &summary,
            batch_id: None,
        };
        let outcome = persist_refinement(&self.store, &record, result)
            .await?
            .ok_or_else(duplicate)?;

        tracing::info!(
            seed,
            source_prompt_version = source_version,
            ok = outcome.error.is_none(),
            "refinement stored"
        );
        Ok(outcome)
    }

    /// Most recent refinement for `seed` at any source version.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::RefinementNotFound`] if the seed has none.
    pub async fn refinement_result(&self, seed: &str) -> Result<RefinementRow, PipelineError> {
        self.store
            .get_latest_refinement(seed)
            .await?
            .ok_or_else(|| PipelineError::RefinementNotFound(seed.to_owned()))
    }
}

