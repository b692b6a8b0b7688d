use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Grade;
use crate::db::types::GradingMethod;

pub(crate) const COLUMNS: &str = "\
    id, submission_id, question_id, awarded_marks, feedback, confidence, method, graded_at";

#[derive(Debug, Clone)]
pub(crate) struct GradeUpsert {
    pub(crate) submission_id: String,
    pub(crate) question_id: String,
    pub(crate) awarded_marks: f64,
    pub(crate) feedback: String,
    pub(crate) confidence: f64,
    pub(crate) method: GradingMethod,
    pub(crate) graded_at: PrimitiveDateTime,
}

/// One grade per (submission, question); re-grading overwrites in place.
pub(crate) async fn upsert(
    pool: &PgPool,
    id: &str,
    grade: &GradeUpsert,
) -> Result<Grade, sqlx::Error> {
    sqlx::query_as::<_, Grade>(&format!(
        "INSERT INTO grades (
            id, submission_id, question_id, awarded_marks, feedback, confidence, method, graded_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        ON CONFLICT (submission_id, question_id) DO UPDATE
        SET awarded_marks = EXCLUDED.awarded_marks,
            feedback = EXCLUDED.feedback,
            confidence = EXCLUDED.confidence,
            method = EXCLUDED.method,
            graded_at = EXCLUDED.graded_at
        RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(&grade.submission_id)
    .bind(&grade.question_id)
    .bind(grade.awarded_marks)
    .bind(&grade.feedback)
    .bind(grade.confidence)
    .bind(grade.method)
    .bind(grade.graded_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn delete(
    pool: &PgPool,
    submission_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    let deleted = sqlx::query("DELETE FROM grades WHERE submission_id = $1 AND question_id = $2")
        .bind(submission_id)
        .bind(question_id)
        .execute(pool)
        .await?;

    Ok(deleted.rows_affected() == 1)
}
