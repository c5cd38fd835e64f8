//! Persistence seam for the pipeline.
//!
//! [`TagStore`] mirrors the query functions in `huetag-db`. [`PgStore`]
//! forwards to them; [`crate::memory::MemoryStore`] keeps everything in
//! process for tests.

use async_trait::async_trait;
use huetag_db::{
    DbError, NewRefinement, NewTagResult, RefinementBatchRow, RefinementCounts, RefinementRow,
    TagResultRow,
};
use serde_json::Value;
use sqlx::PgPool;

#[async_trait]
pub trait TagStore: Send + Sync {
    /// Every known seed, ordered.
    async fn list_seeds(&self) -> Result<Vec<String>, DbError>;

    async fn insert_tag_result(&self, result: &NewTagResult) -> Result<i64, DbError>;

    async fn list_tag_results_for_seed(
        &self,
        seed: &str,
        prompt_version: &str,
    ) -> Result<Vec<TagResultRow>, DbError>;

    /// `0` when nothing matches.
    async fn max_run_number(&self, prompt_version: Option<&str>) -> Result<i32, DbError>;

    async fn list_completed_providers(
        &self,
        run_number: i32,
        prompt_version: &str,
    ) -> Result<Vec<(String, String)>, DbError>;

    async fn count_tag_results(&self, prompt_version: &str) -> Result<i64, DbError>;

    async fn count_seeds_with_valid_tags(&self, prompt_version: &str) -> Result<i64, DbError>;

    /// `None` when a refinement for `(seed, source_prompt_version)` already exists.
    async fn insert_refinement(&self, refinement: &NewRefinement)
        -> Result<Option<i64>, DbError>;

    async fn refinement_exists(
        &self,
        seed: &str,
        source_prompt_version: &str,
    ) -> Result<bool, DbError>;

    async fn get_latest_refinement(&self, seed: &str) -> Result<Option<RefinementRow>, DbError>;

    async fn list_seeds_pending_refinement(
        &self,
        prompt_version: &str,
        limit: i64,
    ) -> Result<Vec<String>, DbError>;

    async fn count_refinements(
        &self,
        source_prompt_version: &str,
    ) -> Result<RefinementCounts, DbError>;

    async fn insert_refinement_batch(
        &self,
        batch_id: &str,
        source_prompt_version: &str,
        correlation_map: &Value,
        request_count: i32,
    ) -> Result<(), DbError>;

    async fn get_refinement_batch(
        &self,
        batch_id: &str,
    ) -> Result<Option<RefinementBatchRow>, DbError>;

    async fn mark_refinement_batch_processed(&self, batch_id: &str) -> Result<(), DbError>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TagStore for PgStore {
    async fn list_seeds(&self) -> Result<Vec<String>, DbError> {
        huetag_db::list_seeds(&self.pool).await
    }

    async fn insert_tag_result(&self, result: &NewTagResult) -> Result<i64, DbError> {
        huetag_db::insert_tag_result(&self.pool, result).await
    }

    async fn list_tag_results_for_seed(
        &self,
        seed: &str,
        prompt_version: &str,
    ) -> Result<Vec<TagResultRow>, DbError> {
        huetag_db::list_tag_results_for_seed(&self.pool, seed, prompt_version).await
    }

    async fn max_run_number(&self, prompt_version: Option<&str>) -> Result<i32, DbError> {
        huetag_db::max_run_number(&self.pool, prompt_version).await
    }

    async fn list_completed_providers(
        &self,
        run_number: i32,
        prompt_version: &str,
    ) -> Result<Vec<(String, String)>, DbError> {
        huetag_db::list_completed_providers(&self.pool, run_number, prompt_version).await
    }

    async fn count_tag_results(&self, prompt_version: &str) -> Result<i64, DbError> {
        huetag_db::count_tag_results(&self.pool, prompt_version).await
    }

    async fn count_seeds_with_valid_tags(&self, prompt_version: &str) -> Result<i64, DbError> {
        huetag_db::count_seeds_with_valid_tags(&self.pool, prompt_version).await
    }

    async fn insert_refinement(
        &self,
        refinement: &NewRefinement,
    ) -> Result<Option<i64>, DbError> {
        huetag_db::insert_refinement(&self.pool, refinement).await
    }

    async fn refinement_exists(
        &self,
        seed: &str,
        source_prompt_version: &str,
    ) -> Result<bool, DbError> {
        huetag_db::refinement_exists(&self.pool, seed, source_prompt_version).await
    }

    async fn get_latest_refinement(&self, seed: &str) -> Result<Option<RefinementRow>, DbError> {
        huetag_db::get_latest_refinement(&self.pool, seed).await
    }

    async fn list_seeds_pending_refinement(
        &self,
        prompt_version: &str,
        limit: i64,
    ) -> Result<Vec<String>, DbError> {
        huetag_db::list_seeds_pending_refinement(&self.pool, prompt_version, limit).await
    }

    async fn count_refinements(
        &self,
        source_prompt_version: &str,
    ) -> Result<RefinementCounts, DbError> {
        huetag_db::count_refinements(&self.pool, source_prompt_version).await
    }

    async fn insert_refinement_batch(
        &self,
        batch_id: &str,
        source_prompt_version: &str,
        correlation_map: &Value,
        request_count: i32,
    ) -> Result<(), DbError> {
        huetag_db::insert_refinement_batch(
            &self.pool,
            batch_id,
            source_prompt_version,
            correlation_map,
            request_count,
        )
        .await
    }

    async fn get_refinement_batch(
        &self,
        batch_id: &str,
    ) -> Result<Option<RefinementBatchRow>, DbError> {
        huetag_db::get_refinement_batch(&self.pool, batch_id).await
    }

    async fn mark_refinement_batch_processed(&self, batch_id: &str) -> Result<(), DbError> {
        huetag_db::mark_refinement_batch_processed(&self.pool, batch_id).await
    }
}
