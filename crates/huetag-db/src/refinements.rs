//! Database operations for the `refinements` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `refinements` table. At most one per
/// `(seed, source_prompt_version)`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct RefinementRow {
    pub id: i64,
    pub seed: String,
    pub source_prompt_version: String,
    pub refinement_prompt_version: String,
    pub model: String,
    pub tags: Option<Value>,
    pub error: Option<String>,
    /// Trimmed consensus summary the refinement was built from.
    pub consensus: Value,
    pub batch_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Values for a new `refinements` row.
#[derive(Debug, Clone)]
pub struct NewRefinement {
    pub seed: String,
    pub source_prompt_version: String,
    pub refinement_prompt_version: String,
    pub model: String,
    pub tags: Option<Value>,
    pub error: Option<String>,
    pub consensus: Value,
    pub batch_id: Option<String>,
}

/// Refinement totals for one source prompt version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RefinementCounts {
    pub refined: i64,
    pub errors: i64,
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a refinement unless one already exists for
/// `(seed, source_prompt_version)`.
///
/// Returns `Some(id)` for the new row, or `None` when the unique constraint
/// rejected it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for any other reason.
pub async fn insert_refinement(
    pool: &PgPool,
    refinement: &NewRefinement,
) -> Result<Option<i64>, DbError> {
    let id: Option<i64> = sqlx::query_scalar(
        "INSERT INTO refinements \
             (seed, source_prompt_version, refinement_prompt_version, model, \
              tags, error, consensus, batch_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (seed, source_prompt_version) DO NOTHING \
         RETURNING id",
    )
    .bind(&refinement.seed)
    .bind(&refinement.source_prompt_version)
    .bind(&refinement.refinement_prompt_version)
    .bind(&refinement.model)
    .bind(&refinement.tags)
    .bind(&refinement.error)
    .bind(&refinement.consensus)
    .bind(&refinement.batch_id)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn refinement_exists(
    pool: &PgPool,
    seed: &str,
    source_prompt_version: &str,
) -> Result<bool, DbError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS ( \
             SELECT 1 FROM refinements \
             WHERE seed = $1 AND source_prompt_version = $2 \
         )",
    )
    .bind(seed)
    .bind(source_prompt_version)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Most recent refinement for a seed across all source versions.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_latest_refinement(
    pool: &PgPool,
    seed: &str,
) -> Result<Option<RefinementRow>, DbError> {
    let row = sqlx::query_as::<_, RefinementRow>(
        "SELECT id, seed, source_prompt_version, refinement_prompt_version, model, \
                tags, error, consensus, batch_id, created_at \
         FROM refinements \
         WHERE seed = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(seed)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Seeds with at least one valid tag result at `prompt_version` and no
/// refinement for that version yet, ordered by seed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_seeds_pending_refinement(
    pool: &PgPool,
    prompt_version: &str,
    limit: i64,
) -> Result<Vec<String>, DbError> {
    let seeds = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT t.seed \
         FROM provider_tag_results t \
         WHERE t.prompt_version = $1 \
           AND t.tags IS NOT NULL \
           AND NOT EXISTS ( \
               SELECT 1 FROM refinements r \
               WHERE r.seed = t.seed AND r.source_prompt_version = $1 \
           ) \
         ORDER BY t.seed \
         LIMIT $2",
    )
    .bind(prompt_version)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(seeds)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_refinements(
    pool: &PgPool,
    source_prompt_version: &str,
) -> Result<RefinementCounts, DbError> {
    let counts = sqlx::query_as::<_, RefinementCounts>(
        "SELECT COUNT(*) FILTER (WHERE tags IS NOT NULL) AS refined, \
                COUNT(*) FILTER (WHERE error IS NOT NULL) AS errors \
         FROM refinements \
         WHERE source_prompt_version = $1",
    )
    .bind(source_prompt_version)
    .fetch_one(pool)
    .await?;

    Ok(counts)
}
