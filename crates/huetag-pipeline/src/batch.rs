//! Batch refinement: submit many seeds at once, poll, then reconcile results.
//!
//! Requests are identified by short correlation ids (`idx_0`, `idx_1`, ...).
//! The `id -> seed` map is returned to the caller and also stored with the
//! batch record, so reconciliation works without the caller keeping it.

use std::collections::BTreeMap;

use huetag_core::REFINEMENT_INSTRUCTIONS;
use huetag_providers::extract::parse_refined_output;
use huetag_providers::{BatchRequest, BatchStatus};
use serde::Serialize;

use crate::error::PipelineError;
use crate::refine::{build_prompt, load_summary, persist_refinement, RefinementRecord};
use crate::service::TaggingService;
use crate::store::TagStore;

pub type CorrelationMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSubmission {
    pub batch_id: String,
    pub source_prompt_version: String,
    pub correlation_map: CorrelationMap,
    /// False when the batch record could not be written. The caller must
    /// then supply `correlation_map` when processing results.
    pub persisted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReconciliation {
    pub batch_id: String,
    /// Refinements stored with curated tags.
    pub stored: usize,
    /// Refinements stored as error rows.
    pub errors: usize,
    /// Malformed or unmapped lines, or lines whose seed was already refined.
    pub skipped: usize,
}

#[must_use]
pub fn correlation_id(index: usize) -> String {
    format!("idx_{index}")
}

impl<S: TagStore> TaggingService<S> {
    /// Submit up to `limit` pending seeds as one batch.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidRequest`] if `limit` is zero.
    /// - [`PipelineError::NothingToRefine`] if no seed is pending.
    /// - [`PipelineError::Provider`] if the batch API rejects the submission.
    /// - [`PipelineError::Db`] if pending seeds cannot be read. A failure to
    ///   record the submitted batch is logged and reported through
    ///   [`BatchSubmission::persisted`] instead.
    pub async fn start_batch_refinement(
        &self,
        limit: u32,
    ) -> Result<BatchSubmission, PipelineError> {
        if limit == 0 {
            return Err(PipelineError::InvalidRequest(
                "limit must be at least 1".to_owned(),
            ));
        }
        let version = self.tagging_version.as_str();
        let seeds = self
            .store
            .list_seeds_pending_refinement(version, i64::from(limit))
            .await?;

        let mut requests = Vec::with_capacity(seeds.len());
        let mut correlation_map = CorrelationMap::new();
        for seed in seeds {
            let summary = match load_summary(&self.store, &seed, version).await {
                Ok(summary) => summary,
                Err(PipelineError::NoValidTags { .. }) => continue,
                Err(e) => return Err(e),
            };
            let custom_id = correlation_id(requests.len());
            requests.push(BatchRequest {
                custom_id: custom_id.clone(),
                prompt: build_prompt(&seed, &summary),
            });
            correlation_map.insert(custom_id, seed);
        }

        if requests.is_empty() {
            return Err(PipelineError::NothingToRefine(version.to_owned()));
        }

        let map_value = serde_json::to_value(&correlation_map)?;
        let status = self
            .batch_api
            .submit(&requests, REFINEMENT_INSTRUCTIONS)
            .await?;
        let request_count = i32::try_from(requests.len()).unwrap_or(i32::MAX);

        // The batch already exists upstream, so a failed write must not hide
        // its id and map from the caller.
        let persisted = match self
            .store
            .insert_refinement_batch(&status.id, version, &map_value, request_count)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    batch_id = %status.id,
                    error = %e,
                    "failed to record submitted refinement batch; keep the returned correlation map"
                );
                false
            }
        };

        tracing::info!(
            batch_id = %status.id,
            requests = request_count,
            source_prompt_version = version,
            persisted,
            "refinement batch submitted"
        );

        Ok(BatchSubmission {
            batch_id: status.id,
            source_prompt_version: version.to_owned(),
            correlation_map,
            persisted,
        })
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Provider`] if the batch API call fails.
    pub async fn batch_status(&self, batch_id: &str) -> Result<BatchStatus, PipelineError> {
        Ok(self.batch_api.status(batch_id).await?)
    }

    /// Store refinements for every line of a finished batch.
    ///
    /// `correlation_map` overrides the map stored at submission time. Lines
    /// whose id is not in the map are logged and skipped.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::UnknownBatch`] if the batch was never recorded and
    ///   no map was supplied.
    /// - [`PipelineError::BatchNotReady`] if the batch has not ended.
    /// - [`PipelineError::Provider`] / [`PipelineError::Db`] on API or store
    ///   failures.
    pub async fn process_batch_results(
        &self,
        batch_id: &str,
        correlation_map: Option<CorrelationMap>,
    ) -> Result<BatchReconciliation, PipelineError> {
        let record = self.store.get_refinement_batch(batch_id).await?;
        let map = match (correlation_map, &record) {
            (Some(map), _) => map,
            (None, Some(record)) => serde_json::from_value(record.correlation_map.clone())?,
            (None, None) => return Err(PipelineError::UnknownBatch(batch_id.to_owned())),
        };
        let source_version = record.as_ref().map_or_else(
            || self.tagging_version.to_string(),
            |r| r.source_prompt_version.clone(),
        );

        let status = self.batch_api.status(batch_id).await?;
        if !status.is_ended() {
            return Err(PipelineError::BatchNotReady {
                batch_id: batch_id.to_owned(),
                status: status.processing_status,
            });
        }

        let results = self.batch_api.fetch_results(batch_id).await?;
        let mut report = BatchReconciliation {
            batch_id: batch_id.to_owned(),
            skipped: results.malformed,
            ..BatchReconciliation::default()
        };
        if results.malformed > 0 {
            tracing::warn!(
                batch_id,
                malformed = results.malformed,
                "malformed batch result lines skipped"
            );
        }

        for line in results.lines {
            let Some(seed) = map.get(&line.custom_id) else {
                tracing::warn!(batch_id, custom_id = %line.custom_id, "unmapped batch result line; skipping");
                report.skipped += 1;
                continue;
            };

            let summary = match load_summary(&self.store, seed, &source_version).await {
                Ok(summary) => summary,
                Err(PipelineError::NoValidTags { .. }) => {
                    tracing::warn!(batch_id, seed = %seed, "no valid tags left for batch line; skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let result = line
                .outcome
                .and_then(|text| parse_refined_output(&text).map_err(|e| e.to_string()));
            let ok = result.is_ok();
            let record = RefinementRecord {
                seed,
                source_version: &source_version,
                refinement_version: self.refinement_version.as_str(),
                model: self.batch_api.model(),
                summary: &summary,
                batch_id: Some(batch_id),
            };

            match persist_refinement(&self.store, &record, result).await? {
                Some(_) if ok => report.stored += 1,
                Some(_) => report.errors += 1,
                None => {
                    tracing::warn!(batch_id, seed = %seed, "seed already refined; skipping batch line");
                    report.skipped += 1;
                }
            }
        }

        if record.is_some() {
            self.store.mark_refinement_batch_processed(batch_id).await?;
        }

        tracing::info!(
            batch_id,
            stored = report.stored,
            errors = report.errors,
            skipped = report.skipped,
            "refinement batch reconciled"
        );
        Ok(report)
    }
}
