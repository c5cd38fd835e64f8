use axum::{
    body::Bytes,
    extract::{Path, State},
    Extension, Json,
};
use huetag_db::RefinementRow;
use huetag_pipeline::{
    BatchReconciliation, BatchSubmission, CorrelationMap, RefinementOutcome, RefinementStatus,
};
use huetag_providers::BatchStatus;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_pipeline_error, parse_optional_body, ApiError, ApiResponse, AppState};

const DEFAULT_BATCH_LIMIT: u32 = 100;
const MAX_BATCH_LIMIT: u32 = 10_000;

#[derive(Debug, Default, Deserialize)]
pub(super) struct RefineSeedBody {
    pub source_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct StartBatchBody {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ProcessBatchBody {
    pub correlation_map: Option<CorrelationMap>,
}

pub(super) fn normalize_batch_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_BATCH_LIMIT).clamp(1, MAX_BATCH_LIMIT)
}

pub(super) async fn status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<RefinementStatus>>, ApiError> {
    let status = state
        .service
        .refinement_status()
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(status, req_id.0))
}

pub(super) async fn refine_seed(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(seed): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<RefinementOutcome>>, ApiError> {
    let body: RefineSeedBody = parse_optional_body(&req_id.0, &body)?;
    let outcome = state
        .service
        .refine_single(&seed, body.source_version.as_deref())
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(outcome, req_id.0))
}

pub(super) async fn get_result(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(seed): Path<String>,
) -> Result<Json<ApiResponse<RefinementRow>>, ApiError> {
    let row = state
        .service
        .refinement_result(&seed)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(row, req_id.0))
}

pub(super) async fn start_batch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<ApiResponse<BatchSubmission>>, ApiError> {
    let body: StartBatchBody = parse_optional_body(&req_id.0, &body)?;
    let submission = state
        .service
        .start_batch_refinement(normalize_batch_limit(body.limit))
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(submission, req_id.0))
}

pub(super) async fn batch_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(batch_id): Path<String>,
) -> Result<Json<ApiResponse<BatchStatus>>, ApiError> {
    let status = state
        .service
        .batch_status(&batch_id)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(status, req_id.0))
}

pub(super) async fn process_batch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(batch_id): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<BatchReconciliation>>, ApiError> {
    let body: ProcessBatchBody = parse_optional_body(&req_id.0, &body)?;
    let report = state
        .service
        .process_batch_results(&batch_id, body.correlation_map)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(report, req_id.0))
}
