//! Live tests for huetag-db using `#[sqlx::test]`.
//!
//! Each test runs against a fresh, fully-migrated Postgres database. The
//! `migrations` path is relative to `crates/huetag-db/`.

use huetag_db::{
    count_refinements, count_seeds_with_valid_tags, count_tag_results, get_latest_refinement,
    get_refinement_batch, insert_refinement, insert_refinement_batch, insert_seeds,
    insert_tag_result, list_completed_providers, list_seeds, list_seeds_pending_refinement,
    list_tag_results_for_seed, mark_refinement_batch_processed, max_run_number,
    refinement_exists, DbError, NewRefinement, NewTagResult, RefinementCounts,
};
use serde_json::json;

const VERSION: &str = "0123456789ab";

fn tag_result(seed: &str, provider: &str, run_number: i32, ok: bool) -> NewTagResult {
    NewTagResult {
        seed: seed.to_owned(),
        provider: provider.to_owned(),
        model: format!("{provider}-model"),
        run_number,
        prompt_version: VERSION.to_owned(),
        tags: ok.then(|| json!({ "temperature": "warm" })),
        error: (!ok).then(|| "provider unavailable".to_owned()),
    }
}

fn refinement(seed: &str, ok: bool) -> NewRefinement {
    NewRefinement {
        seed: seed.to_owned(),
        source_prompt_version: VERSION.to_owned(),
        refinement_prompt_version: "ba9876543210".to_owned(),
        model: "curator".to_owned(),
        tags: ok.then(|| json!({ "temperature": "warm" })),
        error: (!ok).then(|| "unparseable output".to_owned()),
        consensus: json!({ "total_valid_responses": 1 }),
        batch_id: None,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn insert_seeds_ignores_existing(pool: sqlx::PgPool) {
    let first = insert_seeds(&pool, &["bbb".to_owned(), "aaa".to_owned()])
        .await
        .expect("first insert");
    let second = insert_seeds(&pool, &["aaa".to_owned(), "ccc".to_owned()])
        .await
        .expect("second insert");

    assert_eq!(first, 2);
    assert_eq!(second, 1);

    let seeds = list_seeds(&pool).await.expect("list seeds");
    assert_eq!(seeds.len(), 3);
    assert_eq!(&seeds[..2], ["aaa", "bbb"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn tag_results_round_trip_and_counts(pool: sqlx::PgPool) {
    for row in [
        tag_result("abc", "gpt", 1, true),
        tag_result("abc", "haiku", 1, false),
        tag_result("def", "gpt", 1, true),
        tag_result("abc", "gpt", 2, true),
    ] {
        insert_tag_result(&pool, &row).await.expect("insert result");
    }

    let rows = list_tag_results_for_seed(&pool, "abc", VERSION)
        .await
        .expect("list results");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].run_number, 1);
    assert_eq!(rows[2].run_number, 2);
    assert!(rows.iter().all(|r| r.tags.is_some() != r.error.is_some()));

    assert_eq!(max_run_number(&pool, Some(VERSION)).await.expect("max"), 2);
    assert_eq!(max_run_number(&pool, Some("ffffffffffff")).await.expect("max"), 0);
    assert_eq!(max_run_number(&pool, None).await.expect("max"), 2);

    let mut completed = list_completed_providers(&pool, 1, VERSION)
        .await
        .expect("completed");
    completed.sort();
    assert_eq!(
        completed,
        vec![
            ("abc".to_owned(), "gpt".to_owned()),
            ("abc".to_owned(), "haiku".to_owned()),
            ("def".to_owned(), "gpt".to_owned()),
        ]
    );

    assert_eq!(count_tag_results(&pool, VERSION).await.expect("count"), 4);
    assert_eq!(
        count_seeds_with_valid_tags(&pool, VERSION).await.expect("count"),
        2
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn tag_result_with_both_tags_and_error_is_rejected(pool: sqlx::PgPool) {
    let mut row = tag_result("abc", "gpt", 1, true);
    row.error = Some("also failed".to_owned());

    let result = insert_tag_result(&pool, &row).await;
    assert!(matches!(result, Err(DbError::Sqlx(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn refinement_is_unique_per_seed_and_source_version(pool: sqlx::PgPool) {
    let first = insert_refinement(&pool, &refinement("abc", true))
        .await
        .expect("first refinement");
    let duplicate = insert_refinement(&pool, &refinement("abc", false))
        .await
        .expect("duplicate refinement");

    assert!(first.is_some());
    assert!(duplicate.is_none());
    assert!(refinement_exists(&pool, "abc", VERSION).await.expect("exists"));
    assert!(!refinement_exists(&pool, "def", VERSION).await.expect("exists"));

    let latest = get_latest_refinement(&pool, "abc")
        .await
        .expect("latest")
        .expect("row present");
    assert_eq!(Some(latest.id), first);
    assert!(latest.error.is_none());

    assert!(get_latest_refinement(&pool, "zzz")
        .await
        .expect("latest")
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn pending_refinement_excludes_refined_and_invalid_seeds(pool: sqlx::PgPool) {
    for row in [
        tag_result("aaa", "gpt", 1, true),
        tag_result("bbb", "gpt", 1, true),
        tag_result("ccc", "gpt", 1, false),
        tag_result("ddd", "gpt", 1, true),
    ] {
        insert_tag_result(&pool, &row).await.expect("insert result");
    }
    insert_refinement(&pool, &refinement("aaa", true))
        .await
        .expect("refine aaa");
    insert_refinement(&pool, &refinement("ddd", false))
        .await
        .expect("refine ddd");

    let pending = list_seeds_pending_refinement(&pool, VERSION, 10)
        .await
        .expect("pending");
    assert_eq!(pending, vec!["bbb".to_owned()]);

    let counts = count_refinements(&pool, VERSION).await.expect("counts");
    assert_eq!(
        counts,
        RefinementCounts {
            refined: 1,
            errors: 1
        }
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn refinement_batch_lifecycle(pool: sqlx::PgPool) {
    let map = json!({ "idx_0": "abc", "idx_1": "def" });
    insert_refinement_batch(&pool, "msgbatch_1", VERSION, &map, 2)
        .await
        .expect("insert batch");

    let row = get_refinement_batch(&pool, "msgbatch_1")
        .await
        .expect("get batch")
        .expect("batch present");
    assert_eq!(row.correlation_map, map);
    assert_eq!(row.request_count, 2);
    assert!(row.processed_at.is_none());

    mark_refinement_batch_processed(&pool, "msgbatch_1")
        .await
        .expect("mark processed");
    let row = get_refinement_batch(&pool, "msgbatch_1")
        .await
        .expect("get batch")
        .expect("batch present");
    assert!(row.processed_at.is_some());

    let missing = mark_refinement_batch_processed(&pool, "msgbatch_404").await;
    assert!(matches!(missing, Err(DbError::NotFound)));
}
