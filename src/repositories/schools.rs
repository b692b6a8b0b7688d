use sqlx::PgPool;

use crate::db::models::SchoolLocation;

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<SchoolLocation>, sqlx::Error> {
    sqlx::query_as::<_, SchoolLocation>(
        "SELECT id, name, latitude, longitude, radius_meters
         FROM school_locations
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
