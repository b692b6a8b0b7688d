use sqlx::PgPool;

use crate::db::models::Slot;
use crate::db::types::SlotStatus;

pub(crate) const COLUMNS: &str = "\
    id, school_id, slot_date, start_time, end_time, teachers_required, teachers_enrolled, status";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Slot>, sqlx::Error> {
    sqlx::query_as::<_, Slot>(&format!(
        "SELECT {COLUMNS}
         FROM slots
         WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Row-locks the slot until the surrounding transaction ends.
pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Slot>, sqlx::Error> {
    sqlx::query_as::<_, Slot>(&format!(
        "SELECT {COLUMNS}
         FROM slots
         WHERE id = $1
         FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn update_occupancy(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    teachers_enrolled: i32,
    status: SlotStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE slots
         SET teachers_enrolled = $1,
             status = $2
         WHERE id = $3",
    )
    .bind(teachers_enrolled)
    .bind(status)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}
