use sqlx::PgPool;

use crate::db::models::Submission;
use crate::db::types::{GradingMode, OcrImageStatus, SubmissionStatus};

use super::types::COLUMNS;

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS}
         FROM submissions
         WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// OCR-complete submissions of AI-graded exams, oldest submission first.
pub(crate) async fn list_gradable(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS}
         FROM submissions
         WHERE status = $1
           AND exam_id IN (SELECT id FROM exams WHERE grading_mode = $2)
         ORDER BY submitted_at, id
         LIMIT $3"
    ))
    .bind(SubmissionStatus::OcrComplete)
    .bind(GradingMode::Ai)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Ids of submissions still waiting on OCR although every page has completed
/// or failed with no attempts left.
pub(crate) async fn list_stalled_ocr(
    pool: &PgPool,
    max_attempts: i32,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT s.id
         FROM submissions s
         WHERE s.status IN ($1, $2)
           AND EXISTS (SELECT 1 FROM answer_images i WHERE i.submission_id = s.id)
           AND NOT EXISTS (
               SELECT 1
               FROM answer_images i
               WHERE i.submission_id = s.id
                 AND (i.ocr_status IN ($3, $4)
                      OR (i.ocr_status = $5 AND i.ocr_attempts < $6))
           )
         ORDER BY s.submitted_at, s.id",
    )
    .bind(SubmissionStatus::Pending)
    .bind(SubmissionStatus::OcrProcessing)
    .bind(OcrImageStatus::Pending)
    .bind(OcrImageStatus::Processing)
    .bind(OcrImageStatus::Failed)
    .bind(max_attempts)
    .fetch_all(pool)
    .await
}
