use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::state::AppState;

/// Caller presented the job trigger token. With no token configured every
/// caller passes; strict config refuses to start without one.
pub(crate) struct JobToken;

#[async_trait]
impl FromRequestParts<AppState> for JobToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state.settings().api().job_trigger_token.as_str();
        if expected.is_empty() {
            return Ok(JobToken);
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized("Missing job trigger token"))?;

        if !constant_time_eq(token.trim().as_bytes(), expected.as_bytes()) {
            return Err(ApiError::Unauthorized("Invalid job trigger token"));
        }

        Ok(JobToken)
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
