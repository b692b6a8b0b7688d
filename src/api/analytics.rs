use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use crate::api::errors::ApiError;
use crate::api::guards::JobToken;
use crate::core::state::AppState;
use crate::services::ai_grading::{AiGradingError, Insights};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/insights", post(insights))
}

/// Summarises exam analytics into plain-language insights for teachers.
async fn insights(
    _token: JobToken,
    State(state): State<AppState>,
    Json(analytics): Json<Value>,
) -> Result<Json<Insights>, ApiError> {
    if !analytics.is_object() {
        return Err(ApiError::BadRequest("Analytics payload must be a JSON object".to_string()));
    }

    let grader = state.grader().ok_or_else(|| {
        ApiError::ServiceUnavailable(AiGradingError::NotConfigured("GROQ_API_KEY").to_string())
    })?;

    let insights = grader.summarize(&analytics).await.map_err(|err| match err {
        AiGradingError::InvalidResponse(_) => ApiError::BadRequest(err.to_string()),
        other => ApiError::ServiceUnavailable(other.to_string()),
    })?;

    Ok(Json(insights))
}
