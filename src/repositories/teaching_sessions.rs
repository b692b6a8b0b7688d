use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::TeachingSession;
use crate::db::types::{TeachingSessionStatus, VerdictTier};

pub(crate) const COLUMNS: &str = "\
    id, slot_id, teacher_id, start_photo_path, end_photo_path, start_latitude, start_longitude, \
    start_distance_meters, start_taken_at, end_latitude, end_longitude, end_distance_meters, \
    end_taken_at, actual_duration_minutes, expected_duration_minutes, status, verdict, \
    verdict_reasons, validated_at";

/// Everything a validation run writes back onto the session row.
#[derive(Debug, Clone)]
pub(crate) struct SessionVerdictUpdate {
    pub(crate) start_latitude: Option<f64>,
    pub(crate) start_longitude: Option<f64>,
    pub(crate) start_distance_meters: Option<f64>,
    pub(crate) start_taken_at: Option<PrimitiveDateTime>,
    pub(crate) end_latitude: Option<f64>,
    pub(crate) end_longitude: Option<f64>,
    pub(crate) end_distance_meters: Option<f64>,
    pub(crate) end_taken_at: Option<PrimitiveDateTime>,
    pub(crate) actual_duration_minutes: Option<f64>,
    pub(crate) expected_duration_minutes: Option<f64>,
    pub(crate) status: TeachingSessionStatus,
    pub(crate) verdict: VerdictTier,
    pub(crate) reasons: Vec<String>,
    pub(crate) validated_at: PrimitiveDateTime,
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<TeachingSession>, sqlx::Error> {
    sqlx::query_as::<_, TeachingSession>(&format!(
        "SELECT {COLUMNS}
         FROM teaching_sessions
         WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn record_verdict(
    pool: &PgPool,
    id: &str,
    update: &SessionVerdictUpdate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE teaching_sessions
         SET start_latitude = $1,
             start_longitude = $2,
             start_distance_meters = $3,
             start_taken_at = $4,
             end_latitude = $5,
             end_longitude = $6,
             end_distance_meters = $7,
             end_taken_at = $8,
             actual_duration_minutes = $9,
             expected_duration_minutes = $10,
             status = $11,
             verdict = $12,
             verdict_reasons = $13,
             validated_at = $14
         WHERE id = $15",
    )
    .bind(update.start_latitude)
    .bind(update.start_longitude)
    .bind(update.start_distance_meters)
    .bind(update.start_taken_at)
    .bind(update.end_latitude)
    .bind(update.end_longitude)
    .bind(update.end_distance_meters)
    .bind(update.end_taken_at)
    .bind(update.actual_duration_minutes)
    .bind(update.expected_duration_minutes)
    .bind(update.status)
    .bind(update.verdict)
    .bind(Json(&update.reasons))
    .bind(update.validated_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Cancels sessions of an enrollment that have not been approved or rejected yet.
pub(crate) async fn cancel_undecided(
    executor: impl sqlx::PgExecutor<'_>,
    slot_id: &str,
    teacher_id: &str,
) -> Result<u64, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE teaching_sessions
         SET status = $1
         WHERE slot_id = $2
           AND teacher_id = $3
           AND status IN ($4, $5)",
    )
    .bind(TeachingSessionStatus::Cancelled)
    .bind(slot_id)
    .bind(teacher_id)
    .bind(TeachingSessionStatus::Pending)
    .bind(TeachingSessionStatus::PhotoSubmitted)
    .execute(executor)
    .await?;

    Ok(updated.rows_affected())
}
