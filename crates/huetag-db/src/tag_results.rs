//! Database operations for the `provider_tag_results` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `provider_tag_results` table.
///
/// Exactly one of `tags` / `error` is set (enforced by a CHECK constraint).
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TagResultRow {
    pub id: i64,
    pub seed: String,
    pub provider: String,
    pub model: String,
    pub run_number: i32,
    pub prompt_version: String,
    pub tags: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Values for a new `provider_tag_results` row.
#[derive(Debug, Clone)]
pub struct NewTagResult {
    pub seed: String,
    pub provider: String,
    pub model: String,
    pub run_number: i32,
    pub prompt_version: String,
    pub tags: Option<Value>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts one provider result and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including when both or
/// neither of `tags` / `error` are set.
pub async fn insert_tag_result(pool: &PgPool, result: &NewTagResult) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO provider_tag_results \
             (seed, provider, model, run_number, prompt_version, tags, error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(&result.seed)
    .bind(&result.provider)
    .bind(&result.model)
    .bind(result.run_number)
    .bind(&result.prompt_version)
    .bind(&result.tags)
    .bind(&result.error)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// All results for a seed at one prompt version, across every run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_tag_results_for_seed(
    pool: &PgPool,
    seed: &str,
    prompt_version: &str,
) -> Result<Vec<TagResultRow>, DbError> {
    let rows = sqlx::query_as::<_, TagResultRow>(
        "SELECT id, seed, provider, model, run_number, prompt_version, tags, error, created_at \
         FROM provider_tag_results \
         WHERE seed = $1 AND prompt_version = $2 \
         ORDER BY run_number, provider, id",
    )
    .bind(seed)
    .bind(prompt_version)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Highest run number recorded, optionally restricted to one prompt version.
/// Returns `0` when nothing matches.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn max_run_number(pool: &PgPool, prompt_version: Option<&str>) -> Result<i32, DbError> {
    let max: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(run_number), 0) \
         FROM provider_tag_results \
         WHERE $1::text IS NULL OR prompt_version = $1",
    )
    .bind(prompt_version)
    .fetch_one(pool)
    .await?;

    Ok(max)
}

/// `(seed, provider)` pairs that already have a result for a run and version.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_completed_providers(
    pool: &PgPool,
    run_number: i32,
    prompt_version: &str,
) -> Result<Vec<(String, String)>, DbError> {
    let pairs = sqlx::query_as::<_, (String, String)>(
        "SELECT DISTINCT seed, provider \
         FROM provider_tag_results \
         WHERE run_number = $1 AND prompt_version = $2",
    )
    .bind(run_number)
    .bind(prompt_version)
    .fetch_all(pool)
    .await?;

    Ok(pairs)
}

/// Total result rows (success and error) stored for a prompt version.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_tag_results(pool: &PgPool, prompt_version: &str) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM provider_tag_results WHERE prompt_version = $1",
    )
    .bind(prompt_version)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Number of distinct seeds with at least one valid result at a version.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_seeds_with_valid_tags(
    pool: &PgPool,
    prompt_version: &str,
) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT seed) \
         FROM provider_tag_results \
         WHERE prompt_version = $1 AND tags IS NOT NULL",
    )
    .bind(prompt_version)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
