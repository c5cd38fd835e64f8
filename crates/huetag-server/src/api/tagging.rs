use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use huetag_pipeline::{SeedResults, TaggingStatus};

use crate::middleware::RequestId;

use super::{map_pipeline_error, ApiError, ApiResponse, AppState};

pub(super) async fn status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<TaggingStatus>>, ApiError> {
    let status = state
        .service
        .tagging_status()
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(status, req_id.0))
}

/// Start a sweep in the background and return the status it starts from.
///
/// Each call spawns its own sweep and nothing serializes them. Two sweeps
/// started close together plan the same pending seeds and both write a
/// result for every provider, so callers should wait for `pending` to reach
/// zero before posting again.
pub(super) async fn sweep(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<(StatusCode, Json<ApiResponse<TaggingStatus>>), ApiError> {
    let status = state
        .service
        .tagging_status()
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    let service = Arc::clone(&state.service);
    let request_id = req_id.0.clone();
    tokio::spawn(async move {
        match service.generate_tags().await {
            Ok(report) => tracing::info!(
                request_id = %request_id,
                run = report.run_number,
                seeds = report.seeds_processed,
                results = report.results_stored,
                failures = report.failures,
                "tagging sweep finished"
            ),
            Err(e) => tracing::error!(request_id = %request_id, error = %e, "tagging sweep failed"),
        }
    });

    Ok((StatusCode::ACCEPTED, ApiResponse::new(status, req_id.0)))
}

pub(super) async fn seed_results(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(seed): Path<String>,
) -> Result<Json<ApiResponse<SeedResults>>, ApiError> {
    let results = state
        .service
        .results_for_seed(&seed)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(results, req_id.0))
}
