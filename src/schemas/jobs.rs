use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct BatchRequest {
    /// Falls back to the worker batch size when omitted.
    #[serde(default)]
    #[validate(range(min = 1, max = 500, message = "limit must be in range 1..500"))]
    pub(crate) limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GradeSubmissionRequest {
    /// Re-grades `graded` and `error` submissions, overwriting their grades.
    #[serde(default)]
    pub(crate) force: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExtractRequest {
    #[validate(length(min = 1, max = 50, message = "image_paths must contain 1..50 items"))]
    pub(crate) image_paths: Vec<String>,
}
