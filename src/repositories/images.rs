use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::AnswerImage;
use crate::db::types::{OcrImageStatus, SubmissionStatus};

pub(crate) const COLUMNS: &str = "\
    id, submission_id, page_order, file_path, ocr_status, extracted_text, confidence_score, \
    error_message, ocr_attempts, uploaded_at, processing_started_at, processed_at";

pub(crate) async fn list_by_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Vec<AnswerImage>, sqlx::Error> {
    sqlx::query_as::<_, AnswerImage>(&format!(
        "SELECT {COLUMNS}
         FROM answer_images
         WHERE submission_id = $1
         ORDER BY page_order"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}

/// Pending or retryable failed pages of submissions still in OCR, oldest
/// upload first. Once a submission has left OCR its failed pages stay failed.
pub(crate) async fn list_claimable(
    pool: &PgPool,
    limit: i64,
    max_attempts: i32,
) -> Result<Vec<AnswerImage>, sqlx::Error> {
    sqlx::query_as::<_, AnswerImage>(&format!(
        "SELECT {COLUMNS}
         FROM answer_images
         WHERE ocr_status IN ($1, $2)
           AND ocr_attempts < $3
           AND submission_id IN (SELECT id FROM submissions WHERE status IN ($4, $5))
         ORDER BY uploaded_at, page_order
         LIMIT $6"
    ))
    .bind(OcrImageStatus::Pending)
    .bind(OcrImageStatus::Failed)
    .bind(max_attempts)
    .bind(SubmissionStatus::Pending)
    .bind(SubmissionStatus::OcrProcessing)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Conditional claim: succeeds only while the page is still pending or failed
/// and its submission has not left OCR.
pub(crate) async fn claim_for_processing(
    pool: &PgPool,
    id: &str,
    max_attempts: i32,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE answer_images
         SET ocr_status = $1,
             ocr_attempts = ocr_attempts + 1,
             processing_started_at = $2,
             error_message = NULL
         WHERE id = $3
           AND ocr_status IN ($4, $5)
           AND ocr_attempts < $6
           AND submission_id IN (SELECT id FROM submissions WHERE status IN ($7, $8))",
    )
    .bind(OcrImageStatus::Processing)
    .bind(now)
    .bind(id)
    .bind(OcrImageStatus::Pending)
    .bind(OcrImageStatus::Failed)
    .bind(max_attempts)
    .bind(SubmissionStatus::Pending)
    .bind(SubmissionStatus::OcrProcessing)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

pub(crate) async fn mark_completed(
    pool: &PgPool,
    id: &str,
    text: &str,
    confidence: f64,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE answer_images
         SET ocr_status = $1,
             extracted_text = $2,
             confidence_score = $3,
             error_message = NULL,
             processed_at = $4
         WHERE id = $5",
    )
    .bind(OcrImageStatus::Completed)
    .bind(text)
    .bind(confidence)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn mark_failed(
    pool: &PgPool,
    id: &str,
    error: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE answer_images
         SET ocr_status = $1,
             error_message = $2,
             processed_at = $3
         WHERE id = $4",
    )
    .bind(OcrImageStatus::Failed)
    .bind(error)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn fail_stale_processing(
    pool: &PgPool,
    cutoff: PrimitiveDateTime,
    error: &str,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE answer_images
         SET ocr_status = $1,
             error_message = $2,
             processed_at = $3
         WHERE ocr_status = $4
           AND processing_started_at < $5",
    )
    .bind(OcrImageStatus::Failed)
    .bind(error)
    .bind(now)
    .bind(OcrImageStatus::Processing)
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected())
}
