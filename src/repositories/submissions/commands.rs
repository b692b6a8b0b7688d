use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::types::SubmissionStatus;

pub(crate) async fn mark_ocr_processing(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions
         SET status = $1,
             updated_at = $2
         WHERE id = $3 AND status = $4",
    )
    .bind(SubmissionStatus::OcrProcessing)
    .bind(now)
    .bind(id)
    .bind(SubmissionStatus::Pending)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

/// Moves a submission whose pages are all settled to `ocr_complete`.
/// Only one concurrent caller observes `true`.
pub(crate) async fn mark_ocr_complete(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions
         SET status = $1,
             ocr_completed_at = $2,
             error_message = NULL,
             updated_at = $2
         WHERE id = $3 AND status IN ($4, $5)",
    )
    .bind(SubmissionStatus::OcrComplete)
    .bind(now)
    .bind(id)
    .bind(SubmissionStatus::Pending)
    .bind(SubmissionStatus::OcrProcessing)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

pub(crate) async fn claim_for_grading(
    pool: &PgPool,
    id: &str,
    force: bool,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let (also_graded, also_error) = if force {
        (SubmissionStatus::Graded, SubmissionStatus::Error)
    } else {
        (SubmissionStatus::OcrComplete, SubmissionStatus::OcrComplete)
    };

    let updated = sqlx::query(
        "UPDATE submissions
         SET status = $1,
             error_message = NULL,
             updated_at = $2
         WHERE id = $3 AND status IN ($4, $5, $6)",
    )
    .bind(SubmissionStatus::Grading)
    .bind(now)
    .bind(id)
    .bind(SubmissionStatus::OcrComplete)
    .bind(also_graded)
    .bind(also_error)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

pub(crate) async fn mark_graded(
    pool: &PgPool,
    id: &str,
    total_score: f64,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions
         SET status = $1,
             total_score = $2,
             graded_at = $3,
             error_message = NULL,
             updated_at = $3
         WHERE id = $4 AND status = $5",
    )
    .bind(SubmissionStatus::Graded)
    .bind(total_score)
    .bind(now)
    .bind(id)
    .bind(SubmissionStatus::Grading)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

/// Graded submissions are never moved to `error`.
pub(crate) async fn mark_error(
    pool: &PgPool,
    id: &str,
    message: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions
         SET status = $1,
             error_message = $2,
             updated_at = $3
         WHERE id = $4 AND status <> $5",
    )
    .bind(SubmissionStatus::Error)
    .bind(message)
    .bind(now)
    .bind(id)
    .bind(SubmissionStatus::Graded)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

pub(crate) async fn release_grading_claim(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions
         SET status = $1,
             updated_at = $2
         WHERE id = $3 AND status = $4",
    )
    .bind(SubmissionStatus::OcrComplete)
    .bind(now)
    .bind(id)
    .bind(SubmissionStatus::Grading)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

pub(crate) async fn release_stale_grading(
    pool: &PgPool,
    cutoff: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions
         SET status = $1,
             updated_at = $2
         WHERE status = $3 AND updated_at < $4",
    )
    .bind(SubmissionStatus::OcrComplete)
    .bind(now)
    .bind(SubmissionStatus::Grading)
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected())
}
