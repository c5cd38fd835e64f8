//! In-process [`TagStore`] used by tests.
//!
//! Applies the same constraints the Postgres schema does: one refinement
//! per `(seed, source_prompt_version)`, unique batch ids, and success XOR
//! error on every row.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use huetag_db::{
    DbError, NewRefinement, NewTagResult, RefinementBatchRow, RefinementCounts, RefinementRow,
    TagResultRow,
};
use serde_json::Value;

use crate::store::TagStore;

#[derive(Default)]
struct Tables {
    seeds: BTreeSet<String>,
    tag_results: Vec<TagResultRow>,
    refinements: Vec<RefinementRow>,
    batches: Vec<RefinementBatchRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_seeds<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        store.lock().seeds.extend(seeds.into_iter().map(Into::into));
        store
    }

    /// Snapshot of every stored tag result, in insertion order.
    #[must_use]
    pub fn tag_results(&self) -> Vec<TagResultRow> {
        self.lock().tag_results.clone()
    }

    #[must_use]
    pub fn refinements(&self) -> Vec<RefinementRow> {
        self.lock().refinements.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn next_id(len: usize) -> i64 {
    i64::try_from(len).map_or(i64::MAX, |n| n + 1)
}

fn check_exclusive(has_tags: bool, has_error: bool) -> Result<(), DbError> {
    if has_tags == has_error {
        return Err(DbError::Sqlx(sqlx::Error::Protocol(
            "exactly one of tags / error must be set".to_owned(),
        )));
    }
    Ok(())
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn list_seeds(&self) -> Result<Vec<String>, DbError> {
        Ok(self.lock().seeds.iter().cloned().collect())
    }

    async fn insert_tag_result(&self, result: &NewTagResult) -> Result<i64, DbError> {
        check_exclusive(result.tags.is_some(), result.error.is_some())?;
        let mut tables = self.lock();
        let id = next_id(tables.tag_results.len());
        tables.tag_results.push(TagResultRow {
            id,
            seed: result.seed.clone(),
            provider: result.provider.clone(),
            model: result.model.clone(),
            run_number: result.run_number,
            prompt_version: result.prompt_version.clone(),
            tags: result.tags.clone(),
            error: result.error.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_tag_results_for_seed(
        &self,
        seed: &str,
        prompt_version: &str,
    ) -> Result<Vec<TagResultRow>, DbError> {
        let mut rows: Vec<TagResultRow> = self
            .lock()
            .tag_results
            .iter()
            .filter(|r| r.seed == seed && r.prompt_version == prompt_version)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.run_number, &a.provider, a.id).cmp(&(b.run_number, &b.provider, b.id))
        });
        Ok(rows)
    }

    async fn max_run_number(&self, prompt_version: Option<&str>) -> Result<i32, DbError> {
        Ok(self
            .lock()
            .tag_results
            .iter()
            .filter(|r| prompt_version.is_none_or(|v| r.prompt_version == v))
            .map(|r| r.run_number)
            .max()
            .unwrap_or(0))
    }

    async fn list_completed_providers(
        &self,
        run_number: i32,
        prompt_version: &str,
    ) -> Result<Vec<(String, String)>, DbError> {
        let pairs: BTreeSet<(String, String)> = self
            .lock()
            .tag_results
            .iter()
            .filter(|r| r.run_number == run_number && r.prompt_version == prompt_version)
            .map(|r| (r.seed.clone(), r.provider.clone()))
            .collect();
        Ok(pairs.into_iter().collect())
    }

    async fn count_tag_results(&self, prompt_version: &str) -> Result<i64, DbError> {
        let count = self
            .lock()
            .tag_results
            .iter()
            .filter(|r| r.prompt_version == prompt_version)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn count_seeds_with_valid_tags(&self, prompt_version: &str) -> Result<i64, DbError> {
        let tables = self.lock();
        let seeds: BTreeSet<&str> = tables
            .tag_results
            .iter()
            .filter(|r| r.prompt_version == prompt_version && r.tags.is_some())
            .map(|r| r.seed.as_str())
            .collect();
        Ok(i64::try_from(seeds.len()).unwrap_or(i64::MAX))
    }

    async fn insert_refinement(
        &self,
        refinement: &NewRefinement,
    ) -> Result<Option<i64>, DbError> {
        check_exclusive(refinement.tags.is_some(), refinement.error.is_some())?;
        let mut tables = self.lock();
        let duplicate = tables.refinements.iter().any(|r| {
            r.seed == refinement.seed
                && r.source_prompt_version == refinement.source_prompt_version
        });
        if duplicate {
            return Ok(None);
        }
        let id = next_id(tables.refinements.len());
        tables.refinements.push(RefinementRow {
            id,
            seed: refinement.seed.clone(),
            source_prompt_version: refinement.source_prompt_version.clone(),
            refinement_prompt_version: refinement.refinement_prompt_version.clone(),
            model: refinement.model.clone(),
            tags: refinement.tags.clone(),
            error: refinement.error.clone(),
            consensus: refinement.consensus.clone(),
            batch_id: refinement.batch_id.clone(),
            created_at: Utc::now(),
        });
        Ok(Some(id))
    }

    async fn refinement_exists(
        &self,
        seed: &str,
        source_prompt_version: &str,
    ) -> Result<bool, DbError> {
        Ok(self
            .lock()
            .refinements
            .iter()
            .any(|r| r.seed == seed && r.source_prompt_version == source_prompt_version))
    }

    async fn get_latest_refinement(&self, seed: &str) -> Result<Option<RefinementRow>, DbError> {
        Ok(self
            .lock()
            .refinements
            .iter()
            .filter(|r| r.seed == seed)
            .max_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    async fn list_seeds_pending_refinement(
        &self,
        prompt_version: &str,
        limit: i64,
    ) -> Result<Vec<String>, DbError> {
        let tables = self.lock();
        let tagged: BTreeSet<&str> = tables
            .tag_results
            .iter()
            .filter(|r| r.prompt_version == prompt_version && r.tags.is_some())
            .map(|r| r.seed.as_str())
            .collect();
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(tagged
            .into_iter()
            .filter(|seed| {
                !tables
                    .refinements
                    .iter()
                    .any(|r| r.seed == *seed && r.source_prompt_version == prompt_version)
            })
            .take(limit)
            .map(str::to_owned)
            .collect())
    }

    async fn count_refinements(
        &self,
        source_prompt_version: &str,
    ) -> Result<RefinementCounts, DbError> {
        let tables = self.lock();
        let mut counts = RefinementCounts::default();
        for row in tables
            .refinements
            .iter()
            .filter(|r| r.source_prompt_version == source_prompt_version)
        {
            if row.tags.is_some() {
                counts.refined += 1;
            } else {
                counts.errors += 1;
            }
        }
        Ok(counts)
    }

    async fn insert_refinement_batch(
        &self,
        batch_id: &str,
        source_prompt_version: &str,
        correlation_map: &Value,
        request_count: i32,
    ) -> Result<(), DbError> {
        let mut tables = self.lock();
        if tables.batches.iter().any(|b| b.batch_id == batch_id) {
            return Err(DbError::Sqlx(sqlx::Error::Protocol(format!(
                "duplicate batch_id {batch_id}"
            ))));
        }
        tables.batches.push(RefinementBatchRow {
            batch_id: batch_id.to_owned(),
            source_prompt_version: source_prompt_version.to_owned(),
            correlation_map: correlation_map.clone(),
            request_count,
            submitted_at: Utc::now(),
            processed_at: None,
        });
        Ok(())
    }

    async fn get_refinement_batch(
        &self,
        batch_id: &str,
    ) -> Result<Option<RefinementBatchRow>, DbError> {
        Ok(self
            .lock()
            .batches
            .iter()
            .find(|b| b.batch_id == batch_id)
            .cloned())
    }

    async fn mark_refinement_batch_processed(&self, batch_id: &str) -> Result<(), DbError> {
        let mut tables = self.lock();
        let batch = tables
            .batches
            .iter_mut()
            .find(|b| b.batch_id == batch_id)
            .ok_or(DbError::NotFound)?;
        batch.processed_at = Some(Utc::now());
        Ok(())
    }
}
