use time::PrimitiveDateTime;

use crate::db::models::SlotEnrollment;
use crate::db::types::EnrollmentStatus;

pub(crate) const COLUMNS: &str = "id, slot_id, teacher_id, status, enrolled_at, cancelled_at";

pub(crate) async fn find_active(
    executor: impl sqlx::PgExecutor<'_>,
    slot_id: &str,
    teacher_id: &str,
) -> Result<Option<SlotEnrollment>, sqlx::Error> {
    sqlx::query_as::<_, SlotEnrollment>(&format!(
        "SELECT {COLUMNS}
         FROM slot_enrollments
         WHERE slot_id = $1 AND teacher_id = $2 AND status = $3"
    ))
    .bind(slot_id)
    .bind(teacher_id)
    .bind(EnrollmentStatus::Active)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    slot_id: &str,
    teacher_id: &str,
    enrolled_at: PrimitiveDateTime,
) -> Result<SlotEnrollment, sqlx::Error> {
    sqlx::query_as::<_, SlotEnrollment>(&format!(
        "INSERT INTO slot_enrollments (id, slot_id, teacher_id, status, enrolled_at)
         VALUES ($1,$2,$3,$4,$5)
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(slot_id)
    .bind(teacher_id)
    .bind(EnrollmentStatus::Active)
    .bind(enrolled_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn cancel(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    cancelled_at: PrimitiveDateTime,
) -> Result<SlotEnrollment, sqlx::Error> {
    sqlx::query_as::<_, SlotEnrollment>(&format!(
        "UPDATE slot_enrollments
         SET status = $1,
             cancelled_at = $2
         WHERE id = $3
         RETURNING {COLUMNS}"
    ))
    .bind(EnrollmentStatus::Cancelled)
    .bind(cancelled_at)
    .bind(id)
    .fetch_one(executor)
    .await
}
