//! Database operations for the `refinement_batches` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A submitted refinement batch and its `correlation id -> seed` map.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct RefinementBatchRow {
    pub batch_id: String,
    pub source_prompt_version: String,
    /// JSON object mapping correlation ids to seeds.
    pub correlation_map: Value,
    pub request_count: i32,
    pub submitted_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Records a freshly submitted batch.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_refinement_batch(
    pool: &PgPool,
    batch_id: &str,
    source_prompt_version: &str,
    correlation_map: &Value,
    request_count: i32,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO refinement_batches \
             (batch_id, source_prompt_version, correlation_map, request_count) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(batch_id)
    .bind(source_prompt_version)
    .bind(correlation_map)
    .bind(request_count)
    .execute(pool)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_refinement_batch(
    pool: &PgPool,
    batch_id: &str,
) -> Result<Option<RefinementBatchRow>, DbError> {
    let row = sqlx::query_as::<_, RefinementBatchRow>(
        "SELECT batch_id, source_prompt_version, correlation_map, request_count, \
                submitted_at, processed_at \
         FROM refinement_batches \
         WHERE batch_id = $1",
    )
    .bind(batch_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Stamps `processed_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no batch has that id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_refinement_batch_processed(pool: &PgPool, batch_id: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE refinement_batches SET processed_at = NOW() WHERE batch_id = $1",
    )
    .bind(batch_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
