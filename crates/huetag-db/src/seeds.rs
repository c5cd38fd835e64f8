//! Database operations for the `palette_seeds` table.

use sqlx::PgPool;

use crate::DbError;

/// Returns every known seed, in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_seeds(pool: &PgPool) -> Result<Vec<String>, DbError> {
    let seeds = sqlx::query_scalar::<_, String>(
        "SELECT seed FROM palette_seeds ORDER BY created_at, seed",
    )
    .fetch_all(pool)
    .await?;

    Ok(seeds)
}

/// Inserts seeds, ignoring ones that already exist. Returns the number of
/// newly inserted rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_seeds(pool: &PgPool, seeds: &[String]) -> Result<u64, DbError> {
    if seeds.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "INSERT INTO palette_seeds (seed) \
         SELECT * FROM UNNEST($1::text[]) \
         ON CONFLICT (seed) DO NOTHING",
    )
    .bind(seeds)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
