use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use time::OffsetDateTime;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::JobToken;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::SlotEnrollment;
use crate::schemas::attendance::{CancelEnrollmentResponse, EnrollRequest};
use crate::services::attendance::{validate_teaching_session, SessionValidationOutcome};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/teaching-sessions/:session_id/validate", post(validate_session))
        .route("/slots/:slot_id/enrollments", post(enroll))
        .route("/slots/:slot_id/enrollments/:teacher_id", delete(cancel_enrollment))
}

async fn validate_session(
    _token: JobToken,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionValidationOutcome>, ApiError> {
    let outcome = validate_teaching_session(
        state.attendance_store(),
        state.settings().attendance(),
        &session_id,
        OffsetDateTime::now_utc(),
    )
    .await?;

    Ok(Json(outcome))
}

async fn enroll(
    _token: JobToken,
    Path(slot_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<SlotEnrollment>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let enrollment = state
        .attendance_store()
        .enroll_teacher(&slot_id, &payload.teacher_id, primitive_now_utc())
        .await?;

    tracing::info!(slot_id = %slot_id, teacher_id = %payload.teacher_id, "Teacher enrolled in slot");
    Ok((StatusCode::CREATED, Json(enrollment)))
}

async fn cancel_enrollment(
    _token: JobToken,
    Path((slot_id, teacher_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<CancelEnrollmentResponse>, ApiError> {
    let cancelled = state
        .attendance_store()
        .cancel_enrollment(&slot_id, &teacher_id, primitive_now_utc())
        .await?;

    tracing::info!(
        slot_id = %slot_id,
        teacher_id = %teacher_id,
        sessions_cancelled = cancelled.sessions_cancelled,
        "Slot enrollment cancelled"
    );
    Ok(Json(CancelEnrollmentResponse {
        enrollment: cancelled.enrollment,
        sessions_cancelled: cancelled.sessions_cancelled,
    }))
}
