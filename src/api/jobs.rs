use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::JobToken;
use crate::core::state::AppState;
use crate::schemas::jobs::{BatchRequest, ExtractRequest, GradeSubmissionRequest};
use crate::services::text_extraction::{extract_pages, CombinedExtraction, ExtractOptions};
use crate::tasks::batch::BatchSummary;
use crate::tasks::{grading, ocr_queue};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/ocr", post(run_ocr))
        .route("/ocr/extract", post(extract))
        .route("/grading", post(run_grading))
        .route("/grading/:submission_id", post(grade_one))
}

async fn run_ocr(
    _token: JobToken,
    State(state): State<AppState>,
    payload: Option<Json<BatchRequest>>,
) -> Result<Json<BatchSummary>, ApiError> {
    let limit = batch_limit(payload, state.settings().worker().ocr_batch_size)?;
    Ok(Json(ocr_queue::process_pending_images(&state, limit).await))
}

async fn run_grading(
    _token: JobToken,
    State(state): State<AppState>,
    payload: Option<Json<BatchRequest>>,
) -> Result<Json<BatchSummary>, ApiError> {
    let limit = batch_limit(payload, state.settings().worker().grading_batch_size)?;
    Ok(Json(grading::process_pending_submissions(&state, limit).await))
}

async fn grade_one(
    _token: JobToken,
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
    payload: Option<Json<GradeSubmissionRequest>>,
) -> Json<BatchSummary> {
    let force = payload.map(|Json(request)| request.force).unwrap_or(false);
    Json(grading::process_submission(&state, &submission_id, force).await)
}

/// Runs OCR over the given pages without touching any submission.
async fn extract(
    _token: JobToken,
    State(state): State<AppState>,
    Json(payload): Json<ExtractRequest>,
) -> Result<Json<CombinedExtraction>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if !state.extractor().is_available().await {
        return Err(ApiError::ServiceUnavailable("Tesseract OCR is not available".to_string()));
    }

    let paths: Vec<PathBuf> = payload.image_paths.iter().map(PathBuf::from).collect();
    let options = ExtractOptions::from_settings(state.settings().ocr());
    Ok(Json(extract_pages(state.extractor(), &paths, &options).await))
}

fn batch_limit(payload: Option<Json<BatchRequest>>, default: i64) -> Result<i64, ApiError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    request.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(request.limit.unwrap_or(default))
}
